//! Execution of user-triggered actions against the top frame.
//!
//! Inputs are resolved first, so an invalid value stops the action before any
//! side effect. Invocation failures leave the stack untouched; only a
//! successful result is applied, and only if its frame is still on top.

use std::fmt;

use lumen_types::{Action, ActionKind, OnSuccess, Page, RunAction, RunTarget, ValueMap};
use lumen_util::expand_tilde;
use tracing::debug;

use crate::codec::decode_page;
use crate::error::{Result, RuntimeError};
use crate::inputs::{resolve_inputs, substitute_action};
use crate::navigation::{FrameSource, NavigationFrame};
use crate::session::Session;

/// How an operation changed the navigation stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Unchanged,
    Pushed,
    Replaced,
    Popped,
    Exited,
    /// The frame changed while the action ran; its result was dropped.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSelector {
    Index(usize),
    Key(String),
}

/// Addresses one action on the top page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTarget {
    /// Item whose actions are searched; `None` for page-level actions.
    pub item: Option<usize>,
    pub selector: ActionSelector,
}

impl ActionTarget {
    /// The primary (first) action of an item.
    pub fn primary(item: usize) -> Self {
        Self::item_action(item, 0)
    }

    pub fn item_action(item: usize, action: usize) -> Self {
        Self {
            item: Some(item),
            selector: ActionSelector::Index(action),
        }
    }

    pub fn page_action(action: usize) -> Self {
        Self {
            item: None,
            selector: ActionSelector::Index(action),
        }
    }

    pub fn key(item: Option<usize>, key: impl Into<String>) -> Self {
        Self {
            item,
            selector: ActionSelector::Key(key.into()),
        }
    }

    fn locate<'a>(&self, page: &'a Page) -> Result<&'a Action> {
        let actions = match self.item {
            Some(index) => &page.items().get(index).ok_or_else(|| RuntimeError::unknown_action(self.to_string()))?.actions,
            None => page.actions(),
        };
        let action = match &self.selector {
            ActionSelector::Index(index) => actions.get(*index),
            ActionSelector::Key(key) => actions.iter().find(|action| action.key.as_deref() == Some(key.as_str())),
        };
        action.ok_or_else(|| RuntimeError::unknown_action(self.to_string()))
    }
}

impl fmt::Display for ActionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item {
            Some(item) => write!(f, "item {item} ")?,
            None => write!(f, "page ")?,
        }
        match &self.selector {
            ActionSelector::Index(index) => write!(f, "action {index}"),
            ActionSelector::Key(key) => write!(f, "key '{key}'"),
        }
    }
}

impl Session {
    /// Executes the addressed action of the top page.
    pub async fn dispatch(&self, target: &ActionTarget, supplied: &ValueMap) -> Result<DispatchOutcome> {
        let frame = self.top()?;
        let action = target.locate(&frame.page)?.clone();
        debug!(action = action.kind_name(), frame = frame.id, %target, "dispatching action");

        let values = resolve_inputs(&action.inputs, supplied, self.prompter())?;
        match substitute_action(&action.kind, &values) {
            ActionKind::Copy(copy) => {
                self.collaborators
                    .clipboard
                    .copy(&copy.text)
                    .map_err(|error| RuntimeError::collaborator("clipboard", error))?;
                Ok(self.exit_if(copy.exit))
            }
            ActionKind::Open(open) => {
                self.collaborators
                    .opener
                    .open(&open.target, open.app.as_deref())
                    .map_err(|error| RuntimeError::collaborator("opener", error))?;
                Ok(self.exit_if(open.exit))
            }
            ActionKind::Exit => Ok(self.exit_if(true)),
            ActionKind::Reload(reload) => self.reload(&reload.params).await,
            ActionKind::Run(run) => self.dispatch_run(&frame, run).await,
            ActionKind::Edit(edit) => {
                let path = expand_tilde(&edit.path);
                self.collaborators
                    .editor
                    .edit(&path)
                    .await
                    .map_err(|error| RuntimeError::collaborator("editor", error))?;
                self.apply_directive(&frame, edit.on_success, None).await
            }
            ActionKind::Read(read) => {
                let path = expand_tilde(&read.path);
                self.collaborators
                    .reader
                    .read(&path)
                    .await
                    .map_err(|error| RuntimeError::collaborator("reader", error))?;
                Ok(DispatchOutcome::Unchanged)
            }
            ActionKind::Fetch(fetch) => {
                let directive = fetch.on_success.unwrap_or(OnSuccess::Push);
                let source = FrameSource::Fetch {
                    extension: frame.source.extension().map(str::to_string),
                    request: fetch,
                };
                let page = self.load_source(&source, &frame.cancel).await?;
                self.apply_directive(&frame, Some(directive), Some((source, page))).await
            }
        }
    }

    async fn dispatch_run(&self, frame: &NavigationFrame, run: RunAction) -> Result<DispatchOutcome> {
        let directive = run.on_success;
        let wants_page = directive == Some(OnSuccess::Push);

        match run.target() {
            Some(RunTarget::Command { extension, command }) => {
                let extension = extension
                    .or_else(|| frame.source.extension())
                    .ok_or_else(|| RuntimeError::unknown_action(format!("command '{command}' outside of an extension")))?;
                let prepared = self.prepare_command(extension, command, &run.params, None).await?;
                let mode = prepared.command.mode;
                if wants_page && !mode.is_page_mode() {
                    return Err(RuntimeError::invalid_directive(
                        "push",
                        format!("'{command}' runs in {} mode and prints no page", mode.as_str()),
                    ));
                }

                let stdout = self.invoke_prepared(&prepared, &frame.cancel).await?;
                let result = if wants_page {
                    let page = decode_page(&stdout)?;
                    let source = FrameSource::Command {
                        extension: prepared.extension.name,
                        command: prepared.command,
                        payload: prepared.payload,
                    };
                    Some((source, page))
                } else {
                    None
                };
                self.apply_directive(frame, directive, result).await
            }
            Some(RunTarget::Shell(command_line)) => {
                let stdout = self.invoker.run_shell(command_line, &self.cwd, &frame.cancel).await?;
                let result = if wants_page {
                    let page = decode_page(&stdout)?;
                    let source = FrameSource::Shell {
                        extension: frame.source.extension().map(str::to_string),
                        command_line: command_line.to_string(),
                        cwd: self.cwd.clone(),
                    };
                    Some((source, page))
                } else {
                    None
                };
                self.apply_directive(frame, directive, result).await
            }
            None => Err(RuntimeError::malformed_page("run action must set exactly one of `command` and `shell`")),
        }
    }

    /// Applies the post-action directive once the action itself succeeded.
    /// Stack directives only apply while the originating frame is on top.
    async fn apply_directive(
        &self,
        frame: &NavigationFrame,
        directive: Option<OnSuccess>,
        result: Option<(FrameSource, Page)>,
    ) -> Result<DispatchOutcome> {
        match directive {
            None => Ok(DispatchOutcome::Unchanged),
            Some(OnSuccess::Push) => {
                let Some((source, page)) = result else {
                    return Err(RuntimeError::invalid_directive("push", "the action produced no page"));
                };
                let mut stack = self.lock_stack();
                if stack.top_id() != Some(frame.id) {
                    debug!(frame = frame.id, "frame changed while the action ran; dropping page");
                    return Ok(DispatchOutcome::Discarded);
                }
                stack.push(source, page)?;
                Ok(DispatchOutcome::Pushed)
            }
            Some(OnSuccess::Pop) => {
                let mut stack = self.lock_stack();
                if stack.top_id() != Some(frame.id) {
                    debug!(frame = frame.id, "frame changed while the action ran; not popping");
                    return Ok(DispatchOutcome::Discarded);
                }
                Ok(match stack.pop() {
                    Some(_) => DispatchOutcome::Popped,
                    None => DispatchOutcome::Unchanged,
                })
            }
            Some(OnSuccess::Reload) => {
                if self.lock_stack().top_id() != Some(frame.id) {
                    debug!(frame = frame.id, "frame changed while the action ran; not reloading");
                    return Ok(DispatchOutcome::Discarded);
                }
                self.reload(&ValueMap::new()).await
            }
            Some(OnSuccess::Exit) => Ok(self.exit_if(true)),
        }
    }

    fn exit_if(&self, exit: bool) -> DispatchOutcome {
        if !exit {
            return DispatchOutcome::Unchanged;
        }
        self.exit();
        DispatchOutcome::Exited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page() -> Page {
        serde_json::from_value(json!({
            "type": "list",
            "items": [{"title": "a.txt", "actions": [
                {"type": "copy", "text": "a.txt"},
                {"type": "open", "target": "a.txt", "key": "ctrl+o"}
            ]}],
            "actions": [{"type": "reload"}]
        }))
        .unwrap()
    }

    #[test]
    fn targets_locate_item_and_page_actions() {
        let page = page();
        assert_eq!(ActionTarget::primary(0).locate(&page).unwrap().kind_name(), "copy");
        assert_eq!(ActionTarget::key(Some(0), "ctrl+o").locate(&page).unwrap().kind_name(), "open");
        assert_eq!(ActionTarget::page_action(0).locate(&page).unwrap().kind_name(), "reload");
    }

    #[test]
    fn missing_targets_are_unknown_actions() {
        let page = page();
        for target in [ActionTarget::primary(3), ActionTarget::item_action(0, 5), ActionTarget::key(None, "ctrl+x")] {
            let error = target.locate(&page).expect_err("missing");
            assert!(matches!(error, RuntimeError::UnknownAction { .. }), "{target}");
        }
        assert_eq!(ActionTarget::item_action(0, 5).to_string(), "item 0 action 5");
    }
}
