//! Defensive handling of model output.
//!
//! Models wrap JSON in markdown fences, prepend chatter, rename fields, and
//! return arrays where strings were asked for. Everything here is lenient on
//! input and never panics.

use serde_json::{Map, Value};

/// Remove a leading ```` ```lang ```` fence line and a trailing ```` ``` ````.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the optional language tag up to the first newline.
        text = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse a model reply into a JSON object.
///
/// Tries the fence-stripped text first, then the outermost `{...}` slice.
pub fn parse_json_object(raw: &str) -> Result<Map<String, Value>, String> {
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return Err("empty response".to_owned());
    }

    let value = match serde_json::from_str::<Value>(text) {
        Ok(v) => v,
        Err(first) => {
            let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
                return Err(first.to_string());
            };
            if end <= start {
                return Err(first.to_string());
            }
            serde_json::from_str::<Value>(&text[start..=end]).map_err(|e| e.to_string())?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(format!("expected a JSON object, got {}", kind(&other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Render any JSON value as display text.
///
/// Strings pass through, arrays are joined line by line, scalars are
/// stringified and objects are JSON-encoded.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(_) => value.to_string(),
    }
}

/// First non-null value among `aliases`.
pub fn field<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| obj.get(*key))
        .find(|v| !v.is_null())
}

/// Text of the first alias present, or an empty string.
pub fn field_text(obj: &Map<String, Value>, aliases: &[&str]) -> String {
    field(obj, aliases).map(value_text).unwrap_or_default()
}

/// List of strings from an array, or a one-item list from a bare string.
pub fn string_list(obj: &Map<String, Value>, aliases: &[&str]) -> Vec<String> {
    match field(obj, aliases) {
        Some(Value::Array(items)) => items
            .iter()
            .map(value_text)
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(other) => {
            let text = value_text(other);
            let text = text.trim();
            if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_owned()]
            }
        }
        None => Vec::new(),
    }
}
