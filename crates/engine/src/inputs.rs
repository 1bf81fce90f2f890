//! Input resolution and `${input:name}` substitution.
//!
//! Every declared input is resolved before anything is invoked: supplied
//! values are coerced to the declared type, then defaults apply, then the
//! prompter is asked for required values that are still missing.

use lumen_types::{ActionKind, Input, InputKind, ValueMap};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, RuntimeError};

static INPUT_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{input:([^}]+)\}").expect("input placeholder regex should compile"));

static WHOLE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{input:([^}]+)\}$").expect("whole placeholder regex should compile"));

/// Asks the user for an input value.
pub trait Prompter: Send + Sync {
    /// Returns `None` when the user declines to answer.
    fn prompt(&self, input: &Input) -> anyhow::Result<Option<String>>;
}

/// Resolves `inputs` against `supplied` values.
///
/// Supplied keys that are not declared pass through unchanged so that root
/// entries and actions can forward extra params.
pub fn resolve_inputs(inputs: &[Input], supplied: &ValueMap, prompter: Option<&dyn Prompter>) -> Result<ValueMap> {
    let mut resolved = ValueMap::new();

    for input in inputs {
        if let Some(value) = supplied.get(&input.name) {
            resolved.insert(input.name.clone(), coerce_value(input, value)?);
            continue;
        }
        if let Some(default) = input.default_value() {
            resolved.insert(input.name.clone(), default);
            continue;
        }
        if input.optional {
            continue;
        }

        let Some(prompter) = prompter else {
            return Err(RuntimeError::unresolved_input(&input.name));
        };
        debug!(input = %input.name, kind = input.kind_name(), "prompting for input");
        let answer = prompter.prompt(input).map_err(|error| RuntimeError::collaborator("prompter", error))?;
        let Some(answer) = answer else {
            return Err(RuntimeError::unresolved_input(&input.name));
        };
        resolved.insert(input.name.clone(), coerce_value(input, &Value::String(answer))?);
    }

    for (key, value) in supplied {
        if !resolved.contains_key(key) && !inputs.iter().any(|input| &input.name == key) {
            resolved.insert(key.clone(), value.clone());
        }
    }
    Ok(resolved)
}

/// Converts a raw value to the type the input declares.
pub fn coerce_value(input: &Input, value: &Value) -> Result<Value> {
    let invalid = |reason: String| RuntimeError::invalid_input(&input.name, reason);

    match &input.kind {
        InputKind::Text(_) | InputKind::Textarea(_) | InputKind::Password(_) => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(number) => Ok(Value::String(number.to_string())),
            Value::Bool(flag) => Ok(Value::String(flag.to_string())),
            _ => Err(invalid("expected text".into())),
        },
        InputKind::Checkbox(_) => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(text) if text == "true" => Ok(Value::Bool(true)),
            Value::String(text) if text == "false" => Ok(Value::Bool(false)),
            _ => Err(invalid("expected true or false".into())),
        },
        InputKind::Number(number) => {
            let parsed = match value {
                Value::Number(raw) => raw.as_i64(),
                Value::String(text) => text.trim().parse::<i64>().ok(),
                _ => None,
            };
            let Some(parsed) = parsed else {
                return Err(invalid("expected an integer".into()));
            };
            if let Some(min) = number.min
                && parsed < min
            {
                return Err(invalid(format!("must be at least {min}")));
            }
            if let Some(max) = number.max
                && parsed > max
            {
                return Err(invalid(format!("must be at most {max}")));
            }
            Ok(Value::from(parsed))
        }
        InputKind::Dropdown(dropdown) => {
            let selected = match value {
                Value::String(text) => text.clone(),
                Value::Number(_) | Value::Bool(_) => value.to_string(),
                _ => return Err(invalid("expected one of the listed choices".into())),
            };
            if dropdown.choices.is_empty() {
                return Err(invalid("declares no choices".into()));
            }
            if dropdown.choices.iter().any(|choice| choice.value == selected) {
                return Ok(Value::String(selected));
            }
            let allowed: Vec<&str> = dropdown.choices.iter().map(|choice| choice.value.as_str()).collect();
            Err(invalid(format!("'{selected}' is not one of: {}", allowed.join(", "))))
        }
    }
}

/// Replaces `${input:name}` placeholders in a single left-to-right pass.
///
/// Substituted text is never re-scanned, and placeholders naming unknown
/// inputs are left as written.
pub fn substitute_template(template: &str, values: &ValueMap) -> String {
    INPUT_PLACEHOLDER
        .replace_all(template, |captures: &Captures| match values.get(captures[1].trim()) {
            Some(value) => value_text(value),
            None => captures[0].to_string(),
        })
        .into_owned()
}

/// Substitutes placeholders inside a JSON value. A string that is exactly one
/// placeholder takes the typed value of the input.
pub fn substitute_value(value: &Value, values: &ValueMap) -> Value {
    match value {
        Value::String(text) => {
            if let Some(captures) = WHOLE_PLACEHOLDER.captures(text)
                && let Some(resolved) = values.get(captures[1].trim())
            {
                return resolved.clone();
            }
            Value::String(substitute_template(text, values))
        }
        Value::Array(entries) => Value::Array(entries.iter().map(|entry| substitute_value(entry, values)).collect()),
        Value::Object(map) => Value::Object(substitute_map(map, values)),
        _ => value.clone(),
    }
}

pub fn substitute_map(map: &ValueMap, values: &ValueMap) -> ValueMap {
    map.iter()
        .map(|(key, value)| (key.clone(), substitute_value(value, values)))
        .collect()
}

/// Applies input values to every templated field of an action.
pub fn substitute_action(kind: &ActionKind, values: &ValueMap) -> ActionKind {
    if values.is_empty() {
        return kind.clone();
    }
    let text = |field: &str| substitute_template(field, values);

    let mut kind = kind.clone();
    match &mut kind {
        ActionKind::Run(run) => {
            run.shell = run.shell.as_deref().map(text);
            run.params = substitute_map(&run.params, values);
        }
        ActionKind::Open(open) => open.target = text(&open.target),
        ActionKind::Copy(copy) => copy.text = text(&copy.text),
        ActionKind::Reload(reload) => reload.params = substitute_map(&reload.params, values),
        ActionKind::Edit(edit) => edit.path = text(&edit.path),
        ActionKind::Read(read) => read.path = text(&read.path),
        ActionKind::Fetch(fetch) => {
            fetch.url = text(&fetch.url);
            for header in fetch.headers.values_mut() {
                *header = text(header);
            }
            fetch.body = fetch.body.as_ref().map(|body| substitute_value(body, values));
        }
        ActionKind::Exit => {}
    }
    kind
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
