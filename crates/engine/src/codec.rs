//! JSON encoding of payloads and decoding of manifests and pages.
//!
//! Documents are normalized before typed decoding so that extensions written
//! against the older dialect keep working:
//!
//! - `kebab-case` keys become `camelCase` (params, headers, preferences and
//!   fetch bodies are opaque maps and keep their keys);
//! - an action carrying its fields in a nested `onAction` object is flattened;
//! - inputs with `required` get the inverse `optional`, `select` becomes
//!   `dropdown` with `items` renamed to `choices`, and `label` is the title of
//!   every non-checkbox input;
//! - `shortcut` is `key`, `url`/`path` is the `target` of an open action;
//! - `markdown` is `text`, `preview` is `detail` and `showPreview` is
//!   `showDetail`. A string preview is inline text.
//!
//! A page without `type` is a list when it has `items` and a detail otherwise.

use heck::ToLowerCamelCase;
use lumen_types::{ActionKind, Manifest, Page, Payload, ValueMap};
use serde_json::Value;

use crate::error::{Result, RuntimeError};

/// Serializes a payload. Optional fields are omitted rather than sent as `null`.
pub fn encode_payload(payload: &Payload) -> Result<String> {
    serde_json::to_string(payload).map_err(RuntimeError::Encode)
}

/// Decodes a page document printed by an extension.
pub fn decode_page(bytes: &[u8]) -> Result<Page> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|error| RuntimeError::malformed_page(format!("invalid JSON: {error}")))?;
    page_from_value(value)
}

/// Decodes a page from an already parsed document.
pub fn page_from_value(value: Value) -> Result<Page> {
    let Value::Object(mut document) = value else {
        return Err(RuntimeError::malformed_page(format!("expected an object, found {}", json_kind(&value))));
    };

    normalize_page(&mut document);
    if !document.contains_key("type") {
        let inferred = if document.contains_key("items") { "list" } else { "detail" };
        document.insert("type".into(), Value::String(inferred.into()));
    }

    let page: Page =
        serde_json::from_value(Value::Object(document)).map_err(|error| RuntimeError::malformed_page(error.to_string()))?;
    validate_page(&page)?;
    Ok(page)
}

/// Structural checks serde cannot express on its own.
pub fn validate_page(page: &Page) -> Result<()> {
    if let Page::Detail(detail) = page
        && !detail.has_content()
    {
        return Err(RuntimeError::malformed_page("detail page needs `text` or `command`"));
    }

    for item in page.items() {
        if let Some(preview) = &item.detail
            && !preview.has_content()
        {
            return Err(RuntimeError::malformed_page(format!("preview of '{}' needs `text` or `command`", item.title)));
        }
    }

    for action in page.all_actions() {
        if let ActionKind::Run(run) = &action.kind
            && run.target().is_none()
        {
            return Err(RuntimeError::malformed_page(format!(
                "run action '{}' must set exactly one of `command` and `shell`",
                action.display_title()
            )));
        }
    }
    Ok(())
}

/// Decodes the manifest printed by `extension` when invoked without arguments.
pub fn decode_manifest(extension: &str, bytes: &[u8]) -> Result<Manifest> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|error| RuntimeError::manifest(extension, format!("stdout is not valid JSON: {error}")))?;
    let Value::Object(mut document) = value else {
        return Err(RuntimeError::manifest(extension, format!("expected an object, found {}", json_kind(&value))));
    };

    normalize_manifest(&mut document);
    let manifest: Manifest =
        serde_json::from_value(Value::Object(document)).map_err(|error| RuntimeError::manifest(extension, error.to_string()))?;

    if manifest.commands.is_none() && manifest.root.is_none() {
        return Err(RuntimeError::manifest(extension, "declares neither `commands` nor `root`"));
    }
    if let Some(name) = manifest.duplicate_command() {
        return Err(RuntimeError::manifest(extension, format!("command '{name}' is declared more than once")));
    }
    Ok(manifest)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn normalize_manifest(document: &mut ValueMap) {
    camel_case_keys(document);
    normalize_inputs(document.get_mut("preferences"));
    if let Some(Value::Array(commands)) = document.get_mut("commands") {
        for command in commands.iter_mut().filter_map(Value::as_object_mut) {
            camel_case_keys(command);
            normalize_inputs(command.get_mut("params"));
        }
    }
    if let Some(Value::Array(root)) = document.get_mut("root") {
        for item in root.iter_mut().filter_map(Value::as_object_mut) {
            camel_case_keys(item);
        }
    }
}

fn normalize_page(document: &mut ValueMap) {
    camel_case_keys(document);
    rename_key(document, "markdown", "text");
    rename_key(document, "showPreview", "showDetail");
    normalize_actions(document.get_mut("actions"));
    if let Some(Value::Array(items)) = document.get_mut("items") {
        for item in items.iter_mut().filter_map(Value::as_object_mut) {
            normalize_item(item);
        }
    }
}

fn normalize_item(item: &mut ValueMap) {
    camel_case_keys(item);
    rename_key(item, "preview", "detail");
    if let Some(detail) = item.get_mut("detail") {
        if detail.is_string() {
            let text = detail.take();
            *detail = Value::Object(ValueMap::from_iter([("text".to_string(), text)]));
        } else if let Value::Object(preview) = detail {
            camel_case_keys(preview);
            rename_key(preview, "markdown", "text");
        }
    }
    normalize_actions(item.get_mut("actions"));
}

fn normalize_actions(actions: Option<&mut Value>) {
    let Some(Value::Array(actions)) = actions else {
        return;
    };
    for action in actions.iter_mut().filter_map(Value::as_object_mut) {
        camel_case_keys(action);
        if !action.contains_key("type")
            && let Some(Value::Object(mut nested)) = action.remove("onAction")
        {
            camel_case_keys(&mut nested);
            for (key, value) in nested {
                action.entry(key).or_insert(value);
            }
        }
        rename_key(action, "shortcut", "key");
        if action.get("type").and_then(Value::as_str) == Some("open") {
            rename_key(action, "url", "target");
            rename_key(action, "path", "target");
        }
        normalize_inputs(action.get_mut("inputs"));
    }
}

fn normalize_inputs(inputs: Option<&mut Value>) {
    let Some(Value::Array(inputs)) = inputs else {
        return;
    };
    for input in inputs.iter_mut().filter_map(Value::as_object_mut) {
        camel_case_keys(input);
        if let Some(required) = input.remove("required") {
            let optional = !required.as_bool().unwrap_or(false);
            input.entry("optional").or_insert(Value::Bool(optional));
        }
        if input.get("type").and_then(Value::as_str) == Some("select") {
            input.insert("type".into(), Value::String("dropdown".into()));
            rename_key(input, "items", "choices");
        }
        if input.get("type").and_then(Value::as_str) != Some("checkbox") {
            rename_key(input, "label", "title");
        }
    }
}

/// Rewrites `kebab-case` keys of one record in place. Nested values are left
/// alone; existing `camelCase` keys win.
fn camel_case_keys(map: &mut ValueMap) {
    if !map.keys().any(|key| key.contains('-')) {
        return;
    }
    let original = std::mem::take(map);
    for (key, value) in original {
        let key = if key.contains('-') { key.to_lower_camel_case() } else { key };
        map.entry(key).or_insert(value);
    }
}

fn rename_key(map: &mut ValueMap, from: &str, to: &str) {
    if map.contains_key(to) {
        return;
    }
    if let Some(value) = map.remove(from) {
        map.insert(to.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_types::{InputKind, OnSuccess};
    use serde_json::json;

    #[test]
    fn payload_encoding_omits_absent_query() {
        let payload = Payload::new("ls").with_cwd("/home/me");
        let encoded = encode_payload(&payload).expect("encode");
        assert_eq!(encoded, r#"{"command":"ls","params":{},"preferences":{},"cwd":"/home/me"}"#);
    }

    #[test]
    fn payload_params_keep_insertion_order() {
        let mut params = ValueMap::new();
        params.insert("zeta".into(), json!(1));
        params.insert("alpha".into(), json!("a"));
        let encoded = encode_payload(&Payload::new("ls").with_params(params)).expect("encode");
        assert!(encoded.contains(r#""params":{"zeta":1,"alpha":"a"}"#), "{encoded}");
    }

    #[test]
    fn infers_list_from_items_and_detail_otherwise() {
        let list = decode_page(br#"{"items": [{"title": "a.txt"}]}"#).expect("list");
        assert_eq!(list.kind_name(), "list");

        let detail = decode_page(br#"{"text": "hello"}"#).expect("detail");
        assert_eq!(detail.kind_name(), "detail");
    }

    #[test]
    fn rejects_non_objects_and_unknown_types() {
        assert!(matches!(decode_page(b"[1, 2]"), Err(RuntimeError::MalformedPage { .. })));
        assert!(matches!(decode_page(b"not json"), Err(RuntimeError::MalformedPage { .. })));
        assert!(matches!(decode_page(br#"{"type": "grid", "items": []}"#), Err(RuntimeError::MalformedPage { .. })));
    }

    #[test]
    fn detail_without_content_is_malformed() {
        let error = decode_page(br#"{"type": "detail", "title": "empty"}"#).expect_err("no content");
        assert!(matches!(error, RuntimeError::MalformedPage { .. }));
    }

    #[test]
    fn run_action_with_both_targets_is_malformed() {
        let error = decode_page(
            br#"{"type": "list", "items": [{"title": "x", "actions": [{"type": "run", "command": "a", "shell": "b"}]}]}"#,
        )
        .expect_err("ambiguous run");
        assert!(error.to_string().contains("exactly one"));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let page = decode_page(br#"{"type": "list", "items": [], "theme": "dark", "version": 3}"#).expect("decode");
        assert!(page.items().is_empty());
    }

    #[test]
    fn legacy_dialect_is_normalized() {
        let page = page_from_value(json!({
            "show-preview": true,
            "items": [{
                "title": "notes.md",
                "preview": "inline text",
                "actions": [
                    {"title": "Open", "onAction": {"type": "open", "url": "https://example.com"}, "shortcut": "ctrl+o"},
                    {"type": "run", "command": "rm", "on-success": "reload", "params": {"dry-run": true},
                     "inputs": [{"name": "env", "type": "select", "label": "Env", "required": true, "items": ["dev", "prod"]}]}
                ]
            }]
        }))
        .expect("legacy page");

        let Page::List(list) = &page else {
            panic!("expected list");
        };
        assert!(list.show_detail);
        let item = &list.items[0];
        assert_eq!(item.detail.as_ref().and_then(|preview| preview.text.as_deref()), Some("inline text"));

        let open = &item.actions[0];
        assert_eq!(open.key.as_deref(), Some("ctrl+o"));
        let ActionKind::Open(target) = &open.kind else {
            panic!("expected open");
        };
        assert_eq!(target.target, "https://example.com");

        let run = &item.actions[1];
        let ActionKind::Run(run_action) = &run.kind else {
            panic!("expected run");
        };
        assert_eq!(run_action.on_success, Some(OnSuccess::Reload));
        assert!(run_action.params.contains_key("dry-run"));
        let input = &run.inputs[0];
        assert_eq!(input.title, "Env");
        assert!(!input.optional);
        let InputKind::Dropdown(dropdown) = &input.kind else {
            panic!("expected dropdown");
        };
        assert_eq!(dropdown.choices.len(), 2);
    }

    #[test]
    fn manifest_needs_commands_or_root() {
        let error = decode_manifest("files", br#"{"title": "Files"}"#).expect_err("no entry points");
        assert!(matches!(error, RuntimeError::Manifest { .. }));

        let manifest = decode_manifest("files", br#"{"title": "Files", "root": [{"command": "ls"}]}"#).expect("root only");
        assert_eq!(manifest.root_items()[0].command, "ls");
    }

    #[test]
    fn manifest_rejects_duplicate_commands_and_bad_json() {
        let duplicate = decode_manifest("files", br#"{"title": "Files", "commands": [{"name": "ls"}, {"name": "ls"}]}"#);
        assert!(matches!(duplicate, Err(RuntimeError::Manifest { .. })));
        assert!(matches!(decode_manifest("files", b"Usage: files [payload]"), Err(RuntimeError::Manifest { .. })));
    }

    #[test]
    fn manifest_legacy_inputs_are_normalized() {
        let manifest = decode_manifest(
            "journal",
            br#"{"title": "Journal", "commands": [{"name": "write-entry", "mode": "silent",
                 "params": [{"name": "msg", "type": "textarea", "label": "Message", "required": false}]}]}"#,
        )
        .expect("manifest");
        let command = manifest.command("write-entry").expect("command names are kept verbatim");
        assert!(command.params[0].optional);
        assert_eq!(command.params[0].title, "Message");
    }
}
