//! State management module
//!
//! Handles cursor tracking, record filtering, and checkpoint persistence.
//! State is persisted between sync runs to enable incremental syncs.
//!
//! # Overview
//!
//! The state module provides:
//! - `CursorValue` - Comparable checkpoint values (timestamps or text)
//! - `CursorTracker` - Per-stream checkpoint/high-watermark state machine
//! - `RecordFilter` - Drops stale and structural records before emission
//! - `StateManager` - File-based state persistence

mod cursor;
mod filter;
mod manager;
mod types;

pub use cursor::{CursorPhase, CursorTracker, CursorValue};
pub use filter::{FilterDecision, NonContentPredicate, RecordFilter, TypeFieldPredicate};
pub use manager::StateManager;
pub use types::{State, StreamCheckpoint, StreamState};

#[cfg(test)]
mod cursor_tests;
