//! # Lumen Engine
//!
//! The runtime between the launcher and its extensions. Extensions are
//! executables that speak JSON: run without arguments they print a manifest,
//! run with a payload they print a page (or act silently). The engine invokes
//! them, interprets what they print, and keeps the stack of pages the user
//! navigates.
//!
//! ## Usage
//!
//! ```no_run
//! use lumen_engine::{ActionTarget, Collaborators, ExtensionCatalog, ExtensionInvoker, Session};
//! use lumen_util::load_config;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = load_config()?;
//! let session = Session::new(
//!     ExtensionCatalog::from_config(&config),
//!     ExtensionInvoker::new(config.timeout()),
//!     Collaborators::unavailable(),
//!     std::env::current_dir()?,
//! );
//!
//! session.open_root("files").await?;
//! session.dispatch(&ActionTarget::primary(0), &Default::default()).await?;
//! println!("depth: {}", session.depth());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`codec`**: payload encoding, page and manifest decoding
//! - **`invoker`**: child processes, payload conventions, timeouts
//! - **`manifest`**: cached manifest resolution
//! - **`inputs`**: input validation and `${input:name}` substitution
//! - **`navigation`**: the frame stack
//! - **`session`** and **`dispatch`**: orchestration of the above

pub mod codec;
pub mod collaborators;
pub mod dispatch;
pub mod error;
pub mod inputs;
pub mod invoker;
pub mod manifest;
pub mod navigation;
pub mod session;

pub use codec::{decode_manifest, decode_page, encode_payload, page_from_value, validate_page};
pub use collaborators::{Clipboard, Collaborators, Editor, HttpTransport, Opener, Reader};
pub use dispatch::{ActionSelector, ActionTarget, DispatchOutcome};
pub use error::{Result, RuntimeError};
pub use inputs::{Prompter, resolve_inputs, substitute_template};
pub use invoker::{ExtensionInvoker, HOST_ENV, InvocationOutput};
pub use manifest::ManifestResolver;
pub use navigation::{FrameId, FrameSource, NavigationFrame, NavigationStack};
pub use session::{ExtensionCatalog, ExtensionEntry, PreparedCommand, Session, root_page};
