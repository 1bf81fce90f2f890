//! A browsing session over one or more extensions.
//!
//! The session owns the navigation stack. Stack mutations happen under a
//! single lock; invocations run outside it and their results are applied
//! only if the frame that started them is still on top.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use lumen_types::{
    Action, ActionKind, CommandMode, CommandSpec, ListItem, ListPage, Manifest, OnSuccess, Page, Payload, PayloadTransport,
    RunAction, ValueMap,
};
use lumen_util::{Config, resolve_relative_to};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::codec::decode_page;
use crate::collaborators::Collaborators;
use crate::dispatch::DispatchOutcome;
use crate::error::{Result, RuntimeError};
use crate::inputs::{Prompter, resolve_inputs};
use crate::invoker::ExtensionInvoker;
use crate::manifest::ManifestResolver;
use crate::navigation::{FrameId, FrameSource, NavigationFrame, NavigationStack};

/// A known extension and its stored settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionEntry {
    pub name: String,
    pub entrypoint: PathBuf,
    /// Stored preference values, resolved against the manifest's declarations.
    pub preferences: ValueMap,
    /// Configured payload convention; wins over the manifest.
    pub payload: Option<PayloadTransport>,
}

#[derive(Debug, Clone, Default)]
pub struct ExtensionCatalog {
    entries: Vec<ExtensionEntry>,
}

impl ExtensionCatalog {
    pub fn from_config(config: &Config) -> Self {
        let entries = config
            .extensions
            .iter()
            .map(|(name, extension)| ExtensionEntry {
                name: name.clone(),
                entrypoint: absolute(resolve_relative_to(&extension.origin, &config.base_dir)),
                preferences: extension.preferences.clone(),
                payload: extension.payload,
            })
            .collect();
        Self { entries }
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, entry: ExtensionEntry) {
        match self.entries.iter_mut().find(|existing| existing.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Registers an unconfigured extension by path, named after its file stem.
    pub fn insert_path(&mut self, path: &Path) -> String {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.insert(ExtensionEntry {
            name: name.clone(),
            entrypoint: absolute(path.to_path_buf()),
            preferences: ValueMap::new(),
            payload: None,
        });
        name
    }

    pub fn get(&self, name: &str) -> Result<&ExtensionEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| RuntimeError::UnknownExtension { name: name.to_string() })
    }

    pub fn entries(&self) -> &[ExtensionEntry] {
        &self.entries
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

/// A command with its inputs resolved and payload built, not yet invoked.
#[derive(Debug, Clone)]
pub struct PreparedCommand {
    pub extension: ExtensionEntry,
    pub command: CommandSpec,
    pub payload: Payload,
    pub transport: Option<PayloadTransport>,
}

#[derive(Debug)]
pub struct Session {
    pub(crate) catalog: ExtensionCatalog,
    pub(crate) invoker: Arc<ExtensionInvoker>,
    pub(crate) manifests: ManifestResolver,
    pub(crate) collaborators: Collaborators,
    pub(crate) cwd: PathBuf,
    stack: Mutex<NavigationStack>,
}

impl Session {
    pub fn new(catalog: ExtensionCatalog, invoker: ExtensionInvoker, collaborators: Collaborators, cwd: impl Into<PathBuf>) -> Self {
        let invoker = Arc::new(invoker);
        Self {
            catalog,
            manifests: ManifestResolver::new(invoker.clone()),
            invoker,
            collaborators,
            cwd: cwd.into(),
            stack: Mutex::new(NavigationStack::new()),
        }
    }

    pub fn catalog(&self) -> &ExtensionCatalog {
        &self.catalog
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub(crate) fn prompter(&self) -> Option<&dyn Prompter> {
        self.collaborators.prompter.as_deref()
    }

    pub(crate) fn lock_stack(&self) -> MutexGuard<'_, NavigationStack> {
        self.stack.lock().expect("navigation stack lock poisoned")
    }

    pub async fn manifest(&self, extension: &str) -> Result<Arc<Manifest>> {
        let entry = self.catalog.get(extension)?;
        self.manifests.resolve(&entry.name, &entry.entrypoint).await
    }

    pub async fn refresh_manifest(&self, extension: &str) -> Result<Arc<Manifest>> {
        let entry = self.catalog.get(extension)?;
        self.manifests.refresh(&entry.name, &entry.entrypoint).await
    }

    /// Resolves preferences and params and builds the payload for `command`.
    pub async fn prepare_command(
        &self,
        extension: &str,
        command: &str,
        supplied: &ValueMap,
        query: Option<String>,
    ) -> Result<PreparedCommand> {
        let entry = self.catalog.get(extension)?;
        let manifest = self.manifests.resolve(&entry.name, &entry.entrypoint).await?;
        let spec = manifest
            .command(command)
            .ok_or_else(|| RuntimeError::unknown_command(&entry.name, command))?;

        let preferences = resolve_inputs(&manifest.preferences, &entry.preferences, self.prompter())?;
        let params = resolve_inputs(&spec.params, supplied, self.prompter())?;
        let mut payload = Payload::new(&spec.name)
            .with_params(params)
            .with_preferences(preferences)
            .with_cwd(self.cwd.display().to_string());
        if spec.mode == CommandMode::Search {
            payload.query = Some(query.unwrap_or_default());
        }

        Ok(PreparedCommand {
            extension: entry.clone(),
            command: spec.clone(),
            payload,
            transport: entry.payload.or(manifest.payload),
        })
    }

    /// Invokes a prepared command and returns its raw stdout.
    pub(crate) async fn invoke_prepared(&self, prepared: &PreparedCommand, cancel: &CancellationToken) -> Result<Vec<u8>> {
        self.invoker
            .invoke(
                &prepared.extension.entrypoint,
                prepared.command.mode,
                &prepared.payload,
                prepared.transport,
                cancel,
            )
            .await
    }

    /// Invokes a prepared command. Page modes yield their page.
    pub async fn execute(&self, prepared: &PreparedCommand, cancel: &CancellationToken) -> Result<Option<Page>> {
        let stdout = self.invoke_prepared(prepared, cancel).await?;
        if !prepared.command.mode.is_page_mode() {
            return Ok(None);
        }
        decode_page(&stdout).map(Some)
    }

    /// Runs one command outside the navigation stack.
    pub async fn run_command(&self, extension: &str, command: &str, supplied: &ValueMap, query: Option<String>) -> Result<Option<Page>> {
        let prepared = self.prepare_command(extension, command, supplied, query).await?;
        let cancel = self.lock_stack().session_token();
        self.execute(&prepared, &cancel).await
    }

    /// Pushes the extension's root list.
    pub async fn open_root(&self, extension: &str) -> Result<DispatchOutcome> {
        let entry = self.catalog.get(extension)?;
        let manifest = self.manifests.resolve(&entry.name, &entry.entrypoint).await?;
        let page = root_page(&manifest);
        self.lock_stack().push(
            FrameSource::Root {
                extension: entry.name.clone(),
            },
            page,
        )?;
        info!(extension = %entry.name, "opened root");
        Ok(DispatchOutcome::Pushed)
    }

    /// Runs `command` and pushes its page. Commands without a page run for
    /// their effect and leave the stack alone.
    pub async fn open_command(&self, extension: &str, command: &str, supplied: &ValueMap) -> Result<DispatchOutcome> {
        let prepared = self.prepare_command(extension, command, supplied, None).await?;
        let cancel = self.lock_stack().session_token();
        let Some(page) = self.execute(&prepared, &cancel).await? else {
            return Ok(DispatchOutcome::Unchanged);
        };
        self.lock_stack().push(
            FrameSource::Command {
                extension: prepared.extension.name,
                command: prepared.command,
                payload: prepared.payload,
            },
            page,
        )?;
        Ok(DispatchOutcome::Pushed)
    }

    /// Pops the top frame; a no-op on the root.
    pub fn pop(&self) -> DispatchOutcome {
        match self.lock_stack().pop() {
            Some(frame) => {
                debug!(frame = frame.id, "popped frame");
                DispatchOutcome::Popped
            }
            None => DispatchOutcome::Unchanged,
        }
    }

    /// Ends the session and abandons outstanding invocations.
    pub fn exit(&self) {
        self.lock_stack().exit();
        debug!("session ended");
    }

    /// Re-invokes the top frame with `params` merged over its params and
    /// replaces its page in place. On failure the frame is left as it was.
    pub async fn reload(&self, params: &ValueMap) -> Result<DispatchOutcome> {
        let (id, source, cancel) = {
            let mut stack = self.lock_stack();
            let frame = top_frame(&stack)?;
            let id = stack.begin_update()?;
            (id, frame.source, frame.cancel)
        };

        let source = match source {
            FrameSource::Command {
                extension,
                command,
                payload,
            } if !params.is_empty() => {
                let merged = resolve_inputs(&command.params, &payload.merged(params).params, None)?;
                FrameSource::Command {
                    extension,
                    command,
                    payload: payload.with_params(merged),
                }
            }
            other => other,
        };

        let page = self.load_source(&source, &cancel).await?;
        Ok(self.apply_replacement(id, page, source))
    }

    /// Sends a new query to a `search` frame. Other frames are filtered
    /// locally by the caller and yield [`DispatchOutcome::Unchanged`].
    pub async fn search(&self, query: &str) -> Result<DispatchOutcome> {
        let (id, source, cancel) = {
            let mut stack = self.lock_stack();
            let frame = top_frame(&stack)?;
            let FrameSource::Command {
                extension,
                command,
                mut payload,
            } = frame.source
            else {
                return Ok(DispatchOutcome::Unchanged);
            };
            if command.mode != CommandMode::Search {
                return Ok(DispatchOutcome::Unchanged);
            }
            payload.query = Some(query.to_string());
            let id = stack.begin_update()?;
            (
                id,
                FrameSource::Command {
                    extension,
                    command,
                    payload,
                },
                frame.cancel,
            )
        };

        let page = self.load_source(&source, &cancel).await?;
        Ok(self.apply_replacement(id, page, source))
    }

    /// Content of an item's preview, or of the top detail page when `item`
    /// is `None`. Command content runs while the frame stays on the stack.
    pub async fn preview(&self, item: Option<usize>) -> Result<Option<String>> {
        let frame = self.top()?;
        let (text, command) = match (item, &frame.page) {
            (Some(index), page) => {
                let item = page
                    .items()
                    .get(index)
                    .ok_or_else(|| RuntimeError::unknown_action(format!("item {index}")))?;
                match &item.detail {
                    Some(preview) => (preview.text.clone(), preview.command.clone()),
                    None => return Ok(None),
                }
            }
            (None, Page::Detail(detail)) => (detail.text.clone(), detail.command.clone()),
            (None, Page::List(_)) => return Ok(None),
        };

        if let Some(text) = text {
            return Ok(Some(text));
        }
        let Some(command) = command else {
            return Ok(None);
        };
        let stdout = self.invoker.run_shell(&command, &self.cwd, &frame.cancel).await?;
        Ok(Some(String::from_utf8_lossy(&stdout).into_owned()))
    }

    /// Produces the page of `source` again.
    pub(crate) async fn load_source(&self, source: &FrameSource, cancel: &CancellationToken) -> Result<Page> {
        match source {
            FrameSource::Root { extension } => Ok(root_page(&*self.manifest(extension).await?)),
            FrameSource::Command {
                extension,
                command,
                payload,
            } => {
                let entry = self.catalog.get(extension)?;
                let manifest = self.manifests.resolve(&entry.name, &entry.entrypoint).await?;
                let stdout = self
                    .invoker
                    .invoke(&entry.entrypoint, command.mode, payload, entry.payload.or(manifest.payload), cancel)
                    .await?;
                decode_page(&stdout)
            }
            FrameSource::Shell { command_line, cwd, .. } => decode_page(&self.invoker.run_shell(command_line, cwd, cancel).await?),
            FrameSource::Fetch { request, .. } => {
                let body = tokio::select! {
                    body = self.collaborators.http.fetch(request) => body.map_err(|error| RuntimeError::collaborator("http", error))?,
                    _ = cancel.cancelled() => return Err(RuntimeError::cancelled(format!("fetch {}", request.url))),
                };
                decode_page(&body)
            }
        }
    }

    fn apply_replacement(&self, id: FrameId, page: Page, source: FrameSource) -> DispatchOutcome {
        if self.lock_stack().replace_top(id, page, Some(source)) {
            DispatchOutcome::Replaced
        } else {
            debug!(frame = id, "discarding stale result");
            DispatchOutcome::Discarded
        }
    }

    /// A copy of the top frame.
    pub fn top(&self) -> Result<NavigationFrame> {
        top_frame(&self.lock_stack())
    }

    pub fn top_page(&self) -> Option<Page> {
        self.lock_stack().top().map(|frame| frame.page.clone())
    }

    pub fn depth(&self) -> usize {
        self.lock_stack().depth()
    }

    pub fn has_ended(&self) -> bool {
        self.lock_stack().has_ended()
    }
}

fn top_frame(stack: &NavigationStack) -> Result<NavigationFrame> {
    if stack.has_ended() {
        return Err(RuntimeError::SessionEnded);
    }
    stack
        .top()
        .cloned()
        .ok_or_else(|| RuntimeError::unknown_action("no page is open"))
}

/// The list shown for an extension before any command runs.
pub fn root_page(manifest: &Manifest) -> Page {
    let items = manifest
        .root_items()
        .into_iter()
        .map(|entry| {
            let spec = manifest.command(&entry.command);
            let on_success = match spec {
                Some(spec) if !spec.mode.is_page_mode() => None,
                _ => Some(OnSuccess::Push),
            };
            ListItem {
                title: entry
                    .title
                    .or_else(|| spec.map(|spec| spec.display_title().to_string()))
                    .unwrap_or_else(|| entry.command.clone()),
                subtitle: spec.and_then(|spec| spec.description.clone()),
                accessories: spec.map(|spec| vec![spec.mode.as_str().to_string()]).unwrap_or_default(),
                actions: vec![Action {
                    title: Some("Run".into()),
                    key: None,
                    inputs: Vec::new(),
                    kind: ActionKind::Run(RunAction {
                        command: Some(entry.command),
                        params: entry.params,
                        on_success,
                        ..Default::default()
                    }),
                }],
                ..Default::default()
            }
        })
        .collect();

    Page::List(ListPage {
        title: Some(manifest.title.clone()),
        items,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_util::ExtensionConfig;
    use serde_json::json;

    #[test]
    fn catalog_resolves_origins_against_config_dir() {
        let mut config = Config {
            base_dir: PathBuf::from("/etc/lumen"),
            ..Config::default()
        };
        config.extensions.insert(
            "files".into(),
            ExtensionConfig {
                origin: "exts/files.sh".into(),
                preferences: ValueMap::new(),
                payload: Some(PayloadTransport::Stdin),
            },
        );

        let catalog = ExtensionCatalog::from_config(&config);
        let entry = catalog.get("files").expect("configured");
        assert_eq!(entry.entrypoint, PathBuf::from("/etc/lumen/exts/files.sh"));
        assert_eq!(entry.payload, Some(PayloadTransport::Stdin));
        assert!(matches!(catalog.get("nope"), Err(RuntimeError::UnknownExtension { .. })));
    }

    #[test]
    fn insert_path_names_entry_after_file_stem() {
        let mut catalog = ExtensionCatalog::default();
        let name = catalog.insert_path(Path::new("/opt/ext/journal.py"));
        assert_eq!(name, "journal");
        assert_eq!(catalog.entries().len(), 1);
    }

    #[test]
    fn root_page_pushes_page_commands_only() {
        let manifest: Manifest = serde_json::from_value(json!({
            "title": "Files",
            "commands": [
                {"name": "ls", "title": "List", "mode": "list", "description": "List a directory"},
                {"name": "touch", "mode": "silent"}
            ]
        }))
        .unwrap();

        let page = root_page(&manifest);
        assert_eq!(page.title(), Some("Files"));
        let items = page.items();
        assert_eq!(items[0].title, "List");
        assert_eq!(items[0].subtitle.as_deref(), Some("List a directory"));
        let ActionKind::Run(ls) = &items[0].actions[0].kind else {
            panic!("expected run");
        };
        assert_eq!(ls.on_success, Some(OnSuccess::Push));
        let ActionKind::Run(touch) = &items[1].actions[0].kind else {
            panic!("expected run");
        };
        assert_eq!(touch.on_success, None);
    }
}
