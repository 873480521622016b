//! Decoder implementations
//!
//! Each decoder handles a specific response format.

use super::types::RecordDecoder;
use crate::error::{Error, Result};
use crate::http::Response;
use crate::types::{lookup_path, Record};
use serde_json::Value;

// ============================================================================
// JSON Decoder
// ============================================================================

/// JSON decoder with optional record path extraction
#[derive(Debug, Clone, Default)]
pub struct JsonDecoder {
    /// Dot path to the records array
    record_path: Option<String>,
}

impl JsonDecoder {
    /// Create a new JSON decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a JSON decoder with a record path
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            record_path: Some(path.into()),
        }
    }

    /// Extract records from a JSON value using the configured path
    fn extract_records(&self, value: Value) -> Result<Vec<Record>> {
        let path = self.record_path.as_deref().unwrap_or("$");
        let target = match lookup_path(&value, path) {
            Some(v) => v.clone(),
            None => return Ok(Vec::new()),
        };

        match target {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| into_record(item, path, Some(i)))
                .collect(),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![into_record(other, path, None)?]),
        }
    }
}

impl RecordDecoder for JsonDecoder {
    fn decode(&self, response: &Response) -> Result<Vec<Record>> {
        let value = match &response.json {
            Some(value) => value.clone(),
            None => serde_json::from_slice(&response.body)
                .map_err(|e| Error::decode(format!("Failed to parse JSON: {e}")))?,
        };
        self.extract_records(value)
    }
}

// ============================================================================
// JSONL Decoder
// ============================================================================

/// JSON Lines decoder (one JSON object per line)
#[derive(Debug, Clone, Default)]
pub struct JsonlDecoder;

impl JsonlDecoder {
    /// Create a new JSONL decoder
    pub fn new() -> Self {
        Self
    }
}

impl RecordDecoder for JsonlDecoder {
    fn decode(&self, response: &Response) -> Result<Vec<Record>> {
        let body = std::str::from_utf8(&response.body)
            .map_err(|e| Error::decode(format!("Body is not UTF-8: {e}")))?;

        let mut records = Vec::new();
        for (line_num, line) in body.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(line).map_err(|e| {
                Error::decode(format!("Failed to parse JSONL at line {}: {e}", line_num + 1))
            })?;
            records.push(into_record(value, "$", Some(line_num))?);
        }

        Ok(records)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Records must be JSON objects
fn into_record(value: Value, path: &str, index: Option<usize>) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::RecordExtraction {
            path: path.to_string(),
            message: match index {
                Some(i) => format!("item {i} is not an object: {other}"),
                None => format!("value is not an object: {other}"),
            },
        }),
    }
}
