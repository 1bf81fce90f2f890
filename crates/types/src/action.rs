//! User-triggerable actions attached to pages and list items.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Input, ValueMap, is_false};

/// An action as declared by an extension. The `type` field selects one of the
/// closed [`ActionKind`] variants; each variant only carries its own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Keybinding that triggers the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Values collected before the action executes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Input>,
    #[serde(flatten)]
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionKind {
    Run(RunAction),
    Open(OpenAction),
    Copy(CopyAction),
    Reload(ReloadAction),
    Exit,
    Edit(EditAction),
    Read(ReadAction),
    Fetch(FetchAction),
}

/// How a successful action mutates the navigation stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnSuccess {
    Push,
    Pop,
    Reload,
    Exit,
}

/// Invoke a declared command or a literal shell command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAction {
    /// Name of a command declared in a manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Literal shell command line; may contain `${input:name}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    /// Configured extension owning `command`; defaults to the current one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: ValueMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<OnSuccess>,
}

/// Resolved target of a [`RunAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTarget<'a> {
    Command { extension: Option<&'a str>, command: &'a str },
    Shell(&'a str),
}

impl RunAction {
    /// Exactly one of `command` and `shell` must be set.
    pub fn target(&self) -> Option<RunTarget<'_>> {
        match (&self.command, &self.shell) {
            (Some(command), None) => Some(RunTarget::Command {
                extension: self.extension.as_deref(),
                command,
            }),
            (None, Some(shell)) => Some(RunTarget::Shell(shell)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAction {
    /// Path or URL.
    pub target: String,
    /// Application used instead of the platform default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub exit: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyAction {
    pub text: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub exit: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadAction {
    /// Replacement params merged over the current frame's params.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: ValueMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditAction {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<OnSuccess>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadAction {
    pub path: String,
}

/// HTTP request whose response body is interpreted as a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchAction {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<OnSuccess>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Action {
    /// Wire name of the action kind, as used in the `type` discriminator.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ActionKind::Run(_) => "run",
            ActionKind::Open(_) => "open",
            ActionKind::Copy(_) => "copy",
            ActionKind::Reload(_) => "reload",
            ActionKind::Exit => "exit",
            ActionKind::Edit(_) => "edit",
            ActionKind::Read(_) => "read",
            ActionKind::Fetch(_) => "fetch",
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or_else(|| self.kind_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_action_requires_exactly_one_target() {
        let both = RunAction {
            command: Some("ls".into()),
            shell: Some("ls -la".into()),
            ..Default::default()
        };
        assert_eq!(both.target(), None);

        let shell = RunAction {
            shell: Some("ls -la".into()),
            ..Default::default()
        };
        assert_eq!(shell.target(), Some(RunTarget::Shell("ls -la")));
    }

    #[test]
    fn decodes_fetch_with_default_method() {
        let action: Action = serde_json::from_value(json!({
            "title": "Load",
            "type": "fetch",
            "url": "https://example.com/page.json",
            "unknownKey": 1
        }))
        .expect("decode fetch");
        let ActionKind::Fetch(fetch) = &action.kind else {
            panic!("expected fetch");
        };
        assert_eq!(fetch.method, "GET");
        assert_eq!(action.display_title(), "Load");
    }

    #[test]
    fn exit_action_round_trips_without_payload() {
        let action: Action = serde_json::from_value(json!({"type": "exit", "key": "q"})).expect("decode exit");
        assert_eq!(action.kind, ActionKind::Exit);
        assert_eq!(serde_json::to_value(&action).expect("encode"), json!({"type": "exit", "key": "q"}));
    }

    #[test]
    fn unknown_action_type_is_rejected() {
        assert!(serde_json::from_value::<Action>(json!({"type": "teleport"})).is_err());
    }
}
