//! Input declarations.
//!
//! The same declaration shape is used for command params, manifest
//! preferences, and the values an action collects before it runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::is_false;

/// A named input, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    /// Key of the value within the params/preferences map.
    pub name: String,
    /// Human readable prompt.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Optional inputs may stay unresolved.
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(flatten)]
    pub kind: InputKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputKind {
    Text(TextInput),
    Textarea(TextInput),
    Password(TextInput),
    Checkbox(CheckboxInput),
    Number(NumberInput),
    Dropdown(DropdownInput),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckboxInput {
    /// Text shown next to the box.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropdownInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub choices: Vec<DropdownChoice>,
}

/// One selectable value of a dropdown. Accepts either a bare string or a
/// `{ "title": ..., "value": ... }` object on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawChoice")]
pub struct DropdownChoice {
    pub title: String,
    pub value: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChoice {
    Plain(String),
    Detailed {
        #[serde(default)]
        title: Option<String>,
        value: Value,
    },
}

impl From<RawChoice> for DropdownChoice {
    fn from(raw: RawChoice) -> Self {
        match raw {
            RawChoice::Plain(value) => Self {
                title: value.clone(),
                value,
            },
            RawChoice::Detailed { title, value } => {
                let value = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                Self {
                    title: title.unwrap_or_else(|| value.clone()),
                    value,
                }
            }
        }
    }
}

impl Input {
    /// Wire name of the input kind, as used in the `type` discriminator.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            InputKind::Text(_) => "text",
            InputKind::Textarea(_) => "textarea",
            InputKind::Password(_) => "password",
            InputKind::Checkbox(_) => "checkbox",
            InputKind::Number(_) => "number",
            InputKind::Dropdown(_) => "dropdown",
        }
    }

    pub fn is_required(&self) -> bool {
        !self.optional
    }

    /// Secret inputs must never be echoed or logged.
    pub fn is_secret(&self) -> bool {
        matches!(self.kind, InputKind::Password(_))
    }

    /// The declared default converted to its typed JSON value.
    pub fn default_value(&self) -> Option<Value> {
        match &self.kind {
            InputKind::Text(text) | InputKind::Textarea(text) | InputKind::Password(text) => text.default.clone().map(Value::String),
            InputKind::Checkbox(checkbox) => checkbox.default.map(Value::Bool),
            InputKind::Number(number) => number.default.map(Value::from),
            InputKind::Dropdown(dropdown) => dropdown.default.clone().map(Value::String),
        }
    }

    /// Prompt text, falling back to the input name when no title is declared.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() { &self.name } else { &self.title }
    }
}
