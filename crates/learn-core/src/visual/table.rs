//! Tabular visual content (`react` visual type).

use serde_json::Value;

use super::Visual;
use crate::parse::value_text;

fn strip_json_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.strip_suffix('\n').unwrap_or(rest).trim()
}

/// Text that does not look like JSON is a description, not data.
fn prose_like(text: &str) -> bool {
    !text.is_empty() && !text.starts_with('{') && !text.starts_with('[')
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(v @ (Value::Object(_) | Value::Array(_))) => v.to_string(),
        Some(v) => value_text(v),
    }
}

fn table_from_rows(items: &[Value]) -> Option<Visual> {
    match items.first()? {
        Value::Object(first) => {
            let headers: Vec<String> = first.keys().cloned().collect();
            let rows = items
                .iter()
                .map(|item| {
                    let obj = item.as_object();
                    headers
                        .iter()
                        .map(|h| cell(obj.and_then(|o| o.get(h))))
                        .collect()
                })
                .collect();
            Some(Visual::Table { headers, rows })
        }
        // A header row followed by data rows.
        Value::Array(first) => {
            let headers: Vec<String> = first.iter().map(|v| cell(Some(v))).collect();
            let rows = items[1..]
                .iter()
                .map(|row| match row {
                    Value::Array(cells) => cells.iter().map(|v| cell(Some(v))).collect(),
                    other => vec![cell(Some(other))],
                })
                .collect();
            Some(Visual::Table { headers, rows })
        }
        _ => {
            let text = value_text(&Value::Array(items.to_vec()));
            (!text.trim().is_empty()).then_some(Visual::Text { text })
        }
    }
}

/// Render tabular content, falling back to text for prose.
pub fn render_table(content: &str) -> Visual {
    let cleaned = strip_json_fence(content.trim());
    if cleaned.is_empty() {
        return Visual::None;
    }

    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Array(items)) if !items.is_empty() => {
            table_from_rows(&items).unwrap_or(Visual::None)
        }
        Ok(_) => {
            if prose_like(cleaned) {
                Visual::Text {
                    text: content.trim().to_owned(),
                }
            } else {
                Visual::None
            }
        }
        Err(e) => {
            if prose_like(cleaned) {
                Visual::Text {
                    text: cleaned.to_owned(),
                }
            } else {
                tracing::debug!(error = %e, "table content is not valid JSON");
                Visual::Unrenderable {
                    message: "Could not render table data.".to_owned(),
                }
            }
        }
    }
}
