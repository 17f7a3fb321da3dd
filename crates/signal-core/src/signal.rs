//! Signal: one unit of event data delivered by the host, carrying an arbitrary key/value payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::block::BlockError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signal(Map<String, Value>);

impl Signal {
    /// Build a signal from a JSON value. Only objects carry a payload; anything else is rejected.
    pub fn from_value(value: Value) -> Result<Self, BlockError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(BlockError::Other(format!(
                "signal payload must be a JSON object, got {}",
                value_kind(&other)
            ))),
        }
    }

    /// Dotted-path lookup (`user.emails.0`). Numeric segments index into arrays.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_rejects_non_objects() {
        let err = Signal::from_value(json!(["a"])).unwrap_err();
        assert!(err.to_string().contains("array"));
        assert!(Signal::from_value(json!({})).unwrap().is_empty());
    }

    #[test]
    fn get_walks_nested_objects_and_arrays() {
        let signal = Signal::from_value(json!({
            "sub": "S",
            "user": {"emails": ["a@x.com", "b@x.com"]}
        }))
        .unwrap();
        assert_eq!(signal.get("sub"), Some(&json!("S")));
        assert_eq!(signal.get("user.emails.1"), Some(&json!("b@x.com")));
        assert_eq!(signal.get("user.emails.9"), None);
        assert_eq!(signal.get("user.name"), None);
        assert_eq!(signal.get("sub.inner"), None);
    }

    #[test]
    fn deserializes_transparently_from_object() {
        let signal: Signal = serde_json::from_str(r#"{"body":"B"}"#).unwrap();
        assert_eq!(signal.get("body"), Some(&json!("B")));
        assert_eq!(signal.as_value(), json!({"body": "B"}));
    }
}
