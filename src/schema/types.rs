//! Schema types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

impl JsonType {
    /// Type of a JSON value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => JsonType::String,
            Value::Number(_) => JsonType::Number,
            Value::Bool(_) => JsonType::Boolean,
            Value::Object(_) => JsonType::Object,
            Value::Array(_) => JsonType::Array,
            Value::Null => JsonType::Null,
        }
    }

    /// Whether values of this type can identify a record
    pub fn is_scalar(self) -> bool {
        matches!(self, JsonType::String | JsonType::Number | JsonType::Boolean)
    }
}

impl std::fmt::Display for JsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JsonType::String => "string",
            JsonType::Number => "number",
            JsonType::Boolean => "boolean",
            JsonType::Object => "object",
            JsonType::Array => "array",
            JsonType::Null => "null",
        };
        f.write_str(name)
    }
}

/// A primary key path: a sequence of keys naming a nested field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPath {
    /// `"parent.page_id"`
    Dotted(String),
    /// `["parent", "page_id"]`
    Segments(Vec<String>),
}

impl KeyPath {
    /// The path as individual keys
    pub fn segments(&self) -> Vec<String> {
        match self {
            KeyPath::Dotted(path) => path.split('.').map(ToString::to_string).collect(),
            KeyPath::Segments(parts) => parts.clone(),
        }
    }
}

impl From<&str> for KeyPath {
    fn from(path: &str) -> Self {
        KeyPath::Dotted(path.to_string())
    }
}
