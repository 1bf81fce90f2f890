//! Host services that actions delegate to.
//!
//! The engine never touches the clipboard, the desktop, the terminal, or the
//! network itself. The binary supplies implementations; tests supply
//! recording ones.

use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use lumen_types::FetchAction;

use crate::inputs::Prompter;

pub trait Clipboard: Send + Sync {
    fn copy(&self, text: &str) -> anyhow::Result<()>;
}

/// Opens a path or URL with the platform default, or with `app` when given.
pub trait Opener: Send + Sync {
    fn open(&self, target: &str, app: Option<&str>) -> anyhow::Result<()>;
}

/// Edits a file and returns once the editor exits.
#[async_trait]
pub trait Editor: Send + Sync {
    async fn edit(&self, path: &Path) -> anyhow::Result<()>;
}

/// Shows a file read-only.
#[async_trait]
pub trait Reader: Send + Sync {
    async fn read(&self, path: &Path) -> anyhow::Result<()>;
}

/// Performs the request of a `fetch` action and returns the response body.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn fetch(&self, request: &FetchAction) -> anyhow::Result<Vec<u8>>;
}

#[derive(Clone)]
pub struct Collaborators {
    pub clipboard: Arc<dyn Clipboard>,
    pub opener: Arc<dyn Opener>,
    pub editor: Arc<dyn Editor>,
    pub reader: Arc<dyn Reader>,
    pub http: Arc<dyn HttpTransport>,
    /// Without a prompter, missing required inputs are errors.
    pub prompter: Option<Arc<dyn Prompter>>,
}

impl Collaborators {
    /// Every service fails; used for non-interactive runs.
    pub fn unavailable() -> Self {
        let unavailable = Arc::new(Unavailable);
        Self {
            clipboard: unavailable.clone(),
            opener: unavailable.clone(),
            editor: unavailable.clone(),
            reader: unavailable.clone(),
            http: unavailable,
            prompter: None,
        }
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn with_opener(mut self, opener: Arc<dyn Opener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn with_editor(mut self, editor: Arc<dyn Editor>) -> Self {
        self.editor = editor;
        self
    }

    pub fn with_reader(mut self, reader: Arc<dyn Reader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_http(mut self, http: Arc<dyn HttpTransport>) -> Self {
        self.http = http;
        self
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("prompter", &self.prompter.is_some())
            .finish_non_exhaustive()
    }
}

struct Unavailable;

impl Clipboard for Unavailable {
    fn copy(&self, _text: &str) -> anyhow::Result<()> {
        Err(anyhow!("no clipboard is available"))
    }
}

impl Opener for Unavailable {
    fn open(&self, target: &str, _app: Option<&str>) -> anyhow::Result<()> {
        Err(anyhow!("cannot open {target}: no opener is available"))
    }
}

#[async_trait]
impl Editor for Unavailable {
    async fn edit(&self, path: &Path) -> anyhow::Result<()> {
        Err(anyhow!("cannot edit {}: no editor is available", path.display()))
    }
}

#[async_trait]
impl Reader for Unavailable {
    async fn read(&self, path: &Path) -> anyhow::Result<()> {
        Err(anyhow!("cannot show {}: no reader is available", path.display()))
    }
}

#[async_trait]
impl HttpTransport for Unavailable {
    async fn fetch(&self, request: &FetchAction) -> anyhow::Result<Vec<u8>> {
        Err(anyhow!("cannot fetch {}: no HTTP transport is available", request.url))
    }
}
