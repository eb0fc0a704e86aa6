use serde_json::{Map, Value};

/// One upstream article entry, exactly as the feed sent it.
///
/// Any field may be missing, null, or of an unexpected type. Entries that are
/// not JSON objects at all are kept as empty records so one bad element never
/// discards the rest of the list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawArticle(Map<String, Value>);

impl RawArticle {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            other => {
                tracing::debug!(kind = %value_kind(&other), "Feed entry is not an object");
                Self::default()
            }
        }
    }

    /// Field as text. Strings are returned as-is, numbers and booleans are
    /// stringified; null, arrays and objects count as absent.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RawArticle {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
