//! Extension manifest: what an extension prints when invoked without arguments.

use serde::{Deserialize, Serialize};

use crate::{Input, ValueMap, is_false};

/// Static description of an extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Extension-scoped inputs, sent with every payload.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferences: Vec<Input>,
    /// Declared commands. `None` means the key was absent, which is only
    /// acceptable when a root list is declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<CommandSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Vec<RootItem>>,
    /// How the extension expects to receive its payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<PayloadTransport>,
}

/// A command declared by an extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpec {
    /// Unique key used as the dispatch target.
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Hidden commands are reachable from actions but not listed in the generated root.
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default)]
    pub mode: CommandMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Input>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandMode {
    /// Interactive selection over a list of items.
    #[default]
    List,
    /// Like `List`; the host filters items locally.
    Filter,
    /// Like `List`; the extension is re-invoked with the current query.
    Search,
    /// Static or narrative content.
    Detail,
    /// Side effect only, no visible output.
    Silent,
    /// Takes over the terminal.
    Tty,
}

impl CommandMode {
    /// Page modes print a page on stdout.
    pub fn is_page_mode(self) -> bool {
        matches!(self, Self::List | Self::Filter | Self::Search | Self::Detail)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Filter => "filter",
            Self::Search => "search",
            Self::Detail => "detail",
            Self::Silent => "silent",
            Self::Tty => "tty",
        }
    }
}

/// Invocation convention used to hand the payload to an extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadTransport {
    /// `extension '<json>'`.
    #[default]
    Argument,
    /// `echo '<json>' | extension`.
    Stdin,
}

/// An entry of the root view shown when no explicit command is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub command: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: ValueMap,
}

impl Manifest {
    pub fn commands(&self) -> &[CommandSpec] {
        self.commands.as_deref().unwrap_or_default()
    }

    pub fn command(&self, name: &str) -> Option<&CommandSpec> {
        self.commands().iter().find(|command| command.name == name)
    }

    /// Entries of the root view: the declared `root`, or every visible command.
    pub fn root_items(&self) -> Vec<RootItem> {
        if let Some(root) = &self.root {
            return root.clone();
        }

        self.commands()
            .iter()
            .filter(|command| !command.hidden)
            .map(|command| RootItem {
                title: Some(command.display_title().to_string()),
                command: command.name.clone(),
                params: ValueMap::new(),
            })
            .collect()
    }

    /// Returns the first command name declared more than once.
    pub fn duplicate_command(&self) -> Option<&str> {
        let commands = self.commands();
        commands
            .iter()
            .enumerate()
            .find(|(index, command)| commands[..*index].iter().any(|earlier| earlier.name == command.name))
            .map(|(_, command)| command.name.as_str())
    }
}

impl CommandSpec {
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() { &self.name } else { &self.title }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_items_fall_back_to_visible_commands() {
        let manifest: Manifest = serde_json::from_value(json!({
            "title": "Files",
            "commands": [
                {"name": "ls", "title": "List Files", "mode": "list"},
                {"name": "rm", "title": "Delete", "mode": "silent", "hidden": true}
            ]
        }))
        .expect("decode manifest");

        let root = manifest.root_items();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].command, "ls");
        assert_eq!(root[0].title.as_deref(), Some("List Files"));
        assert_eq!(manifest.command("rm").map(|c| c.mode), Some(CommandMode::Silent));
    }

    #[test]
    fn duplicate_command_names_are_reported() {
        let manifest: Manifest = serde_json::from_value(json!({
            "title": "Dup",
            "commands": [{"name": "a"}, {"name": "b"}, {"name": "a"}]
        }))
        .expect("decode manifest");
        assert_eq!(manifest.duplicate_command(), Some("a"));
    }

    #[test]
    fn mode_defaults_to_list_and_transport_to_argument() {
        let command: CommandSpec = serde_json::from_value(json!({"name": "ls"})).expect("decode");
        assert_eq!(command.mode, CommandMode::List);
        assert!(command.mode.is_page_mode());
        assert!(!CommandMode::Tty.is_page_mode());
        assert_eq!(PayloadTransport::default(), PayloadTransport::Argument);
    }
}
