//! Wire types for the Lumen extension protocol.
//!
//! Extensions are plain executables that talk to the host through JSON:
//! invoked with no arguments they print a [`Manifest`]; invoked with a
//! [`Payload`] they print a [`Page`]. Every record in this crate uses
//! `camelCase` keys and ignores unknown keys so that extensions and hosts of
//! different versions keep working together.
//!
//! The types here describe the canonical schema only. Older dialects
//! (kebab-case keys, `onAction` nesting, `url`/`path` for open targets) are
//! normalized by the engine's codec before they reach these types.

pub mod action;
pub mod input;
pub mod manifest;
pub mod page;
pub mod payload;

pub use action::{
    Action, ActionKind, CopyAction, EditAction, FetchAction, OnSuccess, OpenAction, ReadAction, ReloadAction, RunAction, RunTarget,
};
pub use input::{CheckboxInput, DropdownChoice, DropdownInput, Input, InputKind, NumberInput, TextInput};
pub use manifest::{CommandMode, CommandSpec, Manifest, PayloadTransport, RootItem};
pub use page::{DetailPage, ListItem, ListPage, Page, Preview};
pub use payload::Payload;

/// Name/value map used for params and preferences.
pub type ValueMap = serde_json::Map<String, serde_json::Value>;

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}
