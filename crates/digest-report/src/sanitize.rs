//! Model response cleanup.
//!
//! Models wrap JSON in markdown fences, prepend chatter, or stop mid-array
//! when they hit the output token ceiling. `parse_report_json` handles all
//! three: fences and surrounding text are stripped, and a truncated
//! response keeps every complete object of its top-level `"items"` array.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::error::{ReportError, Result};

const ERROR_PREVIEW_CHARS: usize = 500;

fn fence_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^```(?:json)?\s*\n?").expect("Invalid regex pattern"))
}

fn fence_close() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n?```\s*$").expect("Invalid regex pattern"))
}

/// Strips markdown fences and keeps the outermost `{ ... }` span.
pub fn sanitize_json_response(raw: &str) -> String {
    let text = raw.trim();
    let text = fence_open().replace(text, "");
    let text = fence_close().replace(&text, "");

    let mut text = text.as_ref();
    if let (Some(first), Some(last)) = (text.find('{'), text.rfind('}')) {
        if last > first {
            text = &text[first..=last];
        }
    }
    text.trim().to_string()
}

/// Recovers every complete object from the top-level `"items"` array.
///
/// Returns `None` when the field is absent or no object survives.
pub fn salvage_items(text: &str) -> Option<Vec<Value>> {
    let field = text.find("\"items\"")?;
    let open = field + text[field..].find('[')?;

    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut object_start = None;

    for (offset, ch) in text[open + 1..].char_indices() {
        let pos = open + 1 + offset;

        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    object_start = Some(pos);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(start) = object_start.take() {
                        match serde_json::from_str::<Value>(&text[start..=pos]) {
                            Ok(item) => items.push(item),
                            Err(e) => warn!(error = %e, "skipping unparseable item during salvage"),
                        }
                    }
                }
            }
            ']' if depth == 0 => break,
            _ => {}
        }
    }

    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Parses a model response into report data, salvaging truncated output.
///
/// The result is always a JSON object; a salvaged response becomes
/// `{"items": [...]}`.
pub fn parse_report_json(raw: &str) -> Result<Map<String, Value>> {
    let cleaned = sanitize_json_response(raw);

    let parse_error = match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(other) => {
            return Err(ReportError::Parse(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            )))
        }
        Err(e) => e,
    };

    warn!(error = %parse_error, chars = cleaned.len(), "model response is not valid JSON, attempting salvage");

    match salvage_items(&cleaned) {
        Some(items) => {
            info!(recovered = items.len(), "salvaged items from truncated response");
            let mut map = Map::new();
            map.insert("items".to_string(), json!(items));
            Ok(map)
        }
        None => {
            let preview: String = cleaned.chars().take(ERROR_PREVIEW_CHARS).collect();
            Err(ReportError::Parse(format!("{}; response starts with: {}", parse_error, preview)))
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_fences() {
        let raw = "```json\n{\"items\": []}\n```";
        assert_eq!(sanitize_json_response(raw), "{\"items\": []}");

        let raw = "```JSON\n{\"a\": 1}```  ";
        assert_eq!(sanitize_json_response(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_sanitize_extracts_object_from_chatter() {
        let raw = "Here is your digest:\n{\"items\": [{\"t\": 1}]}\nHope it helps!";
        assert_eq!(sanitize_json_response(raw), "{\"items\": [{\"t\": 1}]}");
    }

    #[test]
    fn test_sanitize_leaves_text_without_braces() {
        assert_eq!(sanitize_json_response("  nothing here "), "nothing here");
    }

    #[test]
    fn test_parse_valid_object() {
        let map = parse_report_json("```json\n{\"title\": \"x\", \"items\": [1]}\n```").unwrap();
        assert_eq!(map["title"], "x");
    }

    #[test]
    fn test_salvage_truncated_array() {
        let raw = r#"{"title": "Digest", "items": [
            {"headline": "one", "body": "has } brace and \"quote\""},
            {"headline": "two", "nested": {"k": [1, 2]}},
            {"headline": "thr"#;

        let map = parse_report_json(raw).unwrap();
        let items = map["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["body"], "has } brace and \"quote\"");
        assert_eq!(items[1]["nested"]["k"][1], 2);
        assert!(map.get("title").is_none());
    }

    #[test]
    fn test_salvage_stops_at_array_end() {
        let text = r#"{"items": [{"a": 1}], "other": [{"b": 2}]"#;
        let items = salvage_items(text).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_salvage_nothing_recoverable() {
        let err = parse_report_json(r#"{"items": [{"a": "#).unwrap_err();
        assert!(matches!(err, ReportError::Parse(_)));

        assert!(salvage_items(r#"{"rows": [{"a": 1}"#).is_none());
    }

    #[test]
    fn test_non_object_rejected() {
        let err = parse_report_json("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("an array"));
    }
}
