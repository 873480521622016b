//! Engine types
//!
//! Message types and configuration for the sync engine.

use crate::error::{Error, ErrorKind};
use crate::state::CursorValue;
use crate::types::{LogLevel, Record};
use serde::{Deserialize, Serialize};

/// A message emitted during sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Message {
    /// One record
    Record {
        /// Stream name
        stream: String,
        /// Record fields, in server order
        data: Record,
    },
    /// Checkpoint reached at stream completion
    State {
        /// Stream name
        stream: String,
        /// Field the checkpoint tracks
        cursor_field: Option<String>,
        /// Checkpoint value
        cursor_value: Option<CursorValue>,
    },
    /// Advisory log message
    Log {
        /// Log level
        level: LogLevel,
        /// Log message
        message: String,
    },
    /// Terminal failure of one stream
    Error {
        /// Stream name
        stream: String,
        /// Error class
        kind: ErrorKind,
        /// Human-readable description
        message: String,
    },
}

impl Message {
    /// Create a record message
    pub fn record(stream: impl Into<String>, data: Record) -> Self {
        Self::Record {
            stream: stream.into(),
            data,
        }
    }

    /// Create a state message
    pub fn state(
        stream: impl Into<String>,
        cursor_field: Option<String>,
        cursor_value: Option<CursorValue>,
    ) -> Self {
        Self::State {
            stream: stream.into(),
            cursor_field,
            cursor_value,
        }
    }

    /// Create a log message
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    /// Create an info log
    pub fn info(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Info, message)
    }

    /// Create a warning log
    pub fn warn(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Warn, message)
    }

    /// Create an error message for a failed stream
    pub fn error(stream: impl Into<String>, error: &Error) -> Self {
        Self::Error {
            stream: stream.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Check if this is a log message
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }

    /// Check if this is an error message
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Stream the message belongs to, if any
    pub fn stream(&self) -> Option<&str> {
        match self {
            Self::Record { stream, .. } | Self::State { stream, .. } | Self::Error { stream, .. } => {
                Some(stream)
            }
            Self::Log { .. } => None,
        }
    }

    /// Serialize as a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Configuration for sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Validate primary keys of every emitted record
    pub validate_primary_keys: bool,
    /// Ignore persisted state and read every stream in full
    pub full_refresh: bool,
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable primary key validation
    #[must_use]
    pub fn with_primary_key_validation(mut self, enabled: bool) -> Self {
        self.validate_primary_keys = enabled;
        self
    }

    /// Force full refresh reads
    #[must_use]
    pub fn with_full_refresh(mut self, full_refresh: bool) -> Self {
        self.full_refresh = full_refresh;
        self
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Total records emitted
    pub records_synced: usize,
    /// Successful responses received
    pub pages_fetched: u64,
    /// Streams that completed
    pub streams_synced: usize,
    /// Streams skipped after a rejected cursor
    pub streams_skipped: usize,
    /// Streams that failed
    pub errors: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record
    pub fn add_record(&mut self) {
        self.records_synced += 1;
    }

    /// Add pages
    pub fn add_pages(&mut self, pages: u64) {
        self.pages_fetched += pages;
    }

    /// Add a completed stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Add a skipped stream
    pub fn add_skipped(&mut self) {
        self.streams_skipped += 1;
    }

    /// Add a failed stream
    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// Counters of one stream read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Records emitted
    pub records: usize,
    /// Slices read
    pub slices: usize,
    /// Child slices skipped because their parent had not changed
    pub slices_skipped: usize,
    /// Records dropped as structural
    pub non_content: usize,
    /// Records dropped as older than the checkpoint
    pub stale: usize,
}
