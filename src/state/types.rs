//! State types for tracking sync progress
//!
//! [`State`] is serialized to JSON and persisted between runs.
//! [`StreamState`] is the in-memory view of one stream during a run.

use super::cursor::CursorValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete persisted state
///
/// Layout: `{ "streams": { <name>: { "cursor_field": .., "cursor_value": .. } } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream checkpoints
    #[serde(default)]
    pub streams: BTreeMap<String, StreamCheckpoint>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the checkpoint for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamCheckpoint> {
        self.streams.get(stream)
    }

    /// Get the cursor value for a stream
    pub fn get_cursor(&self, stream: &str) -> Option<&CursorValue> {
        self.streams.get(stream)?.cursor_value.as_ref()
    }

    /// Set the checkpoint for a stream
    pub fn set_stream(&mut self, stream: &str, checkpoint: StreamCheckpoint) {
        self.streams.insert(stream.to_string(), checkpoint);
    }
}

/// Persisted checkpoint of one stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamCheckpoint {
    /// Field the checkpoint was taken from
    #[serde(default)]
    pub cursor_field: Option<String>,
    /// Checkpoint value
    #[serde(default)]
    pub cursor_value: Option<CursorValue>,
}

impl StreamCheckpoint {
    /// Create a checkpoint
    pub fn new(cursor_field: Option<String>, cursor_value: Option<CursorValue>) -> Self {
        Self {
            cursor_field,
            cursor_value,
        }
    }
}

/// In-memory state of one stream during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamState {
    /// State to report: the input checkpoint until finished, then the advanced one
    pub cursor_value: Option<CursorValue>,
    /// Whether the stream terminated normally
    pub is_finished: bool,
    /// Largest cursor value observed in this run
    pub high_watermark: Option<CursorValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_default() {
        let state = State::new();
        assert!(state.streams.is_empty());
        assert!(state.get_cursor("pages").is_none());
    }

    #[test]
    fn test_state_layout() {
        let mut state = State::new();
        state.set_stream(
            "pages",
            StreamCheckpoint::new(
                Some("last_edited_time".to_string()),
                Some(CursorValue::parse("2022-10-10")),
            ),
        );

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            json!({
                "streams": {
                    "pages": {
                        "cursor_field": "last_edited_time",
                        "cursor_value": "2022-10-10T00:00:00Z"
                    }
                }
            })
        );

        let restored: State = serde_json::from_value(value).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_state_tolerates_missing_fields() {
        let state: State = serde_json::from_str(r#"{"streams": {"users": {}}}"#).unwrap();
        assert!(state.get_stream("users").is_some());
        assert!(state.get_cursor("users").is_none());

        let empty: State = serde_json::from_str("{}").unwrap();
        assert!(empty.streams.is_empty());
    }
}
