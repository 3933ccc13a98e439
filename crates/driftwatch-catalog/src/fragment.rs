//! Tool fragments and payload parsing.

use serde_json::{Map, Value};

use crate::normalize::Direction;

/// One tool call or result found inside a record.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolFragment {
    pub direction: Direction,
    pub tool_name: Option<String>,
    pub payload: Option<Value>,
    pub shape: &'static str,
    /// Field names of the container the fragment was found in.
    pub fields: Vec<String>,
    pub field_path: &'static str,
}

impl ToolFragment {
    pub fn input(
        tool_name: Option<&str>,
        payload: Option<&Value>,
        shape: &'static str,
        container: &Map<String, Value>,
        field_path: &'static str,
    ) -> Self {
        Self::new(Direction::Input, tool_name, payload.cloned(), shape, container, field_path)
    }

    pub fn output(
        tool_name: Option<&str>,
        payload: Option<&Value>,
        shape: &'static str,
        container: &Map<String, Value>,
        field_path: &'static str,
    ) -> Self {
        Self::new(Direction::Output, tool_name, payload.cloned(), shape, container, field_path)
    }

    pub fn new(
        direction: Direction,
        tool_name: Option<&str>,
        payload: Option<Value>,
        shape: &'static str,
        container: &Map<String, Value>,
        field_path: &'static str,
    ) -> Self {
        Self {
            direction,
            tool_name: tool_name.map(str::to_string),
            payload: payload.filter(|value| !value.is_null()),
            shape,
            fields: container.keys().cloned().collect(),
            field_path,
        }
    }
}

/// A payload as raw text, parsed JSON when it is JSON, and its top-level keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPayload {
    pub raw: Option<String>,
    pub parsed: Option<Value>,
    pub error: Option<String>,
    pub fields: Vec<String>,
}

impl ParsedPayload {
    /// Structured payloads are already parsed. String payloads are parsed
    /// only when they look like a JSON object or array.
    pub fn from_value(payload: Option<&Value>) -> Self {
        match payload {
            None | Some(Value::Null) => Self::default(),
            Some(Value::String(text)) => Self::from_text(text),
            Some(value @ (Value::Object(_) | Value::Array(_))) => Self {
                raw: serde_json::to_string(value).ok(),
                parsed: Some(value.clone()),
                error: None,
                fields: object_keys(value),
            },
            Some(scalar) => Self {
                raw: Some(scalar.to_string()),
                ..Self::default()
            },
        }
    }

    pub fn from_text(text: &str) -> Self {
        let mut payload = Self {
            raw: Some(text.to_string()),
            ..Self::default()
        };
        let candidate = text.trim();
        if candidate.starts_with('{') || candidate.starts_with('[') {
            match serde_json::from_str::<Value>(candidate) {
                Ok(value) => {
                    payload.fields = object_keys(&value);
                    payload.parsed = Some(value);
                }
                Err(error) => payload.error = Some(format!("json_decode_error: {error}")),
            }
        }
        payload
    }
}

fn object_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(obj) => obj.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

/// Null, `false`, zero, and empty strings, arrays and objects are "absent"
/// for the purpose of picking between alternative field names.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

/// First truthy value among `keys`.
pub fn first_truthy<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| is_truthy(value))
}

/// First truthy string value among `keys`.
pub fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    first_truthy(obj, keys).and_then(Value::as_str)
}

/// Lower-cased string value of `key`, or empty.
pub fn lower_str(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_payloads_parse_only_when_json_like() {
        let plain = ParsedPayload::from_value(Some(&json!("ls -la")));
        assert_eq!(plain.raw.as_deref(), Some("ls -la"));
        assert!(plain.parsed.is_none() && plain.error.is_none());

        let embedded = ParsedPayload::from_value(Some(&json!(" {\"command\": \"ls\"} ")));
        assert_eq!(embedded.fields, vec!["command".to_string()]);

        let broken = ParsedPayload::from_value(Some(&json!("{nope")));
        assert!(broken.parsed.is_none());
        assert!(
            broken
                .error
                .as_deref()
                .is_some_and(|e| e.starts_with("json_decode_error"))
        );
    }

    #[test]
    fn structured_payloads_serialize_with_sorted_keys() {
        let payload = ParsedPayload::from_value(Some(&json!({"b": 1, "a": 2})));
        assert_eq!(payload.raw.as_deref(), Some(r#"{"a":2,"b":1}"#));
        assert_eq!(payload.fields, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn truthiness_skips_empty_alternatives() {
        let obj = json!({"name": "", "tool": "Bash", "n": 0});
        let obj = obj.as_object().expect("object literal");
        assert_eq!(first_str(obj, &["name", "tool"]), Some("Bash"));
        assert_eq!(first_truthy(obj, &["n"]), None);
    }
}
