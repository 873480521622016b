//! Incremental cursor values and per-stream progression
//!
//! A [`CursorTracker`] walks through
//!
//! ```text
//!     [init] --load checkpoint--> [active]
//!     [active] --record observed--> [active]    (high-watermark only)
//!     [active] --slices exhausted--> [finished] (state advances)
//!     [active] --fatal error--> [failed]        (state unchanged)
//! ```
//!
//! While active, the state it reports is always the checkpoint the stream
//! started from. An interrupted run therefore resumes from the same place and
//! re-reads anything it had not acknowledged.

use super::types::StreamState;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

// ============================================================================
// CursorValue
// ============================================================================

/// An incremental checkpoint value taken from a record's cursor field
///
/// Timestamps compare chronologically whatever their textual form, so
/// `2022-10-10` and `2022-10-10T00:00:00.000Z` are equal. Anything that does
/// not parse as a timestamp is kept verbatim and compares as text, after all
/// timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CursorValue {
    /// A point in time, normalised to UTC
    Timestamp(DateTime<Utc>),
    /// Opaque text
    Text(String),
}

impl CursorValue {
    /// Parse a cursor value from text
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        parse_timestamp(trimmed).map_or_else(|| Self::Text(raw.to_string()), Self::Timestamp)
    }

    /// Read a cursor value out of a JSON field (`null` means "no value")
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self::parse(s)),
            Value::Number(n) => Some(Self::Text(n.to_string())),
            _ => None,
        }
    }

    /// Midnight UTC on 1970-01-01
    pub fn epoch() -> Self {
        Self::Timestamp(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// As a JSON string
    pub fn to_json(&self) -> Value {
        Value::String(self.to_string())
    }

    /// The larger of two optional values
    pub fn max_of(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl Ord for CursorValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Timestamp(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Timestamp(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for CursorValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CursorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for CursorValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CursorValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

// ============================================================================
// CursorTracker
// ============================================================================

/// Lifecycle phase of a stream's cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPhase {
    /// Checkpoint not loaded yet
    Init,
    /// Records are flowing
    Active,
    /// Stream terminated normally
    Finished,
    /// Stream terminated with an error
    Failed,
}

/// Per-stream checkpoint and high-watermark bookkeeping
#[derive(Debug, Clone)]
pub struct CursorTracker {
    cursor_field: Option<String>,
    checkpoint: Option<CursorValue>,
    high_watermark: Option<CursorValue>,
    phase: CursorPhase,
}

impl CursorTracker {
    /// Create a tracker for a stream with the given cursor field
    pub fn new(cursor_field: Option<String>) -> Self {
        Self {
            cursor_field,
            checkpoint: None,
            high_watermark: None,
            phase: CursorPhase::Init,
        }
    }

    /// Load the input checkpoint and start the stream
    pub fn load(&mut self, checkpoint: Option<CursorValue>) {
        debug!(
            "Cursor {:?} starting from {}",
            self.cursor_field,
            checkpoint
                .as_ref()
                .map_or_else(|| "nothing".to_string(), ToString::to_string)
        );
        self.checkpoint = checkpoint;
        self.high_watermark = None;
        self.phase = CursorPhase::Active;
    }

    /// The cursor field this tracker follows
    pub fn cursor_field(&self) -> Option<&str> {
        self.cursor_field.as_deref()
    }

    /// The checkpoint the stream started from
    pub fn checkpoint(&self) -> Option<&CursorValue> {
        self.checkpoint.as_ref()
    }

    /// Largest value observed so far
    pub fn high_watermark(&self) -> Option<&CursorValue> {
        self.high_watermark.as_ref()
    }

    /// Current phase
    pub fn phase(&self) -> CursorPhase {
        self.phase
    }

    /// Record a value seen on an emitted record
    pub fn observe(&mut self, value: &CursorValue) {
        if self.phase != CursorPhase::Active {
            return;
        }
        if self.high_watermark.as_ref().map_or(true, |hw| value > hw) {
            self.high_watermark = Some(value.clone());
        }
    }

    /// State to report after seeing a record
    ///
    /// Tracks the record's value internally but hands back `current`
    /// untouched until the stream has finished.
    pub fn get_updated_state(
        &mut self,
        current: Option<&CursorValue>,
        record_value: Option<&CursorValue>,
    ) -> Option<CursorValue> {
        if let Some(value) = record_value {
            self.observe(value);
        }
        match self.phase {
            CursorPhase::Finished => {
                CursorValue::max_of(current.cloned(), self.high_watermark.clone())
            }
            _ => current.cloned(),
        }
    }

    /// Terminate normally and return the advanced checkpoint
    pub fn finish(&mut self) -> Option<CursorValue> {
        self.phase = CursorPhase::Finished;
        CursorValue::max_of(self.checkpoint.clone(), self.high_watermark.clone())
    }

    /// Terminate with an error and return the unchanged checkpoint
    pub fn fail(&mut self) -> Option<CursorValue> {
        self.phase = CursorPhase::Failed;
        self.checkpoint.clone()
    }

    /// Snapshot of `(cursor_value, is_finished, high_watermark)`
    pub fn snapshot(&self) -> StreamState {
        let is_finished = self.phase == CursorPhase::Finished;
        let cursor_value = if is_finished {
            CursorValue::max_of(self.checkpoint.clone(), self.high_watermark.clone())
        } else {
            self.checkpoint.clone()
        };
        StreamState {
            cursor_value,
            is_finished,
            high_watermark: self.high_watermark.clone(),
        }
    }
}
