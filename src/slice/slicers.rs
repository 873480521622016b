//! Slicer implementations

use super::types::{RecordSource, Slice, StreamSlicer};
use crate::error::Result;
use crate::state::CursorValue;
use crate::types::{record_field, scalar_to_string};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, warn};

// ============================================================================
// Single Slicer
// ============================================================================

/// Root streams: exactly one slice carrying the lower bound
#[derive(Debug, Clone)]
pub struct SingleSlicer {
    slice: Option<Slice>,
}

impl SingleSlicer {
    /// Create a slicer yielding one slice
    pub fn new(lower_bound: Option<CursorValue>) -> Self {
        Self {
            slice: Some(Slice::root(lower_bound)),
        }
    }
}

#[async_trait]
impl StreamSlicer for SingleSlicer {
    async fn next_slice(&mut self) -> Option<Result<Slice>> {
        self.slice.take().map(Ok)
    }
}

// ============================================================================
// Parent Slicer
// ============================================================================

/// Child streams: one slice per distinct parent record
///
/// Parent records are pulled one at a time, so a paginated parent is never
/// held in memory. Only the ids of parents already sliced are kept, one
/// string per distinct parent for the life of the stream.
pub struct ParentSlicer {
    stream: String,
    parent: Box<dyn RecordSource>,
    id_field: String,
    cursor_field: Option<String>,
    lower_bound: Option<CursorValue>,
    seen: HashSet<String>,
    done: bool,
}

impl ParentSlicer {
    /// Create a slicer over a parent record source
    pub fn new(
        stream: impl Into<String>,
        parent: Box<dyn RecordSource>,
        id_field: impl Into<String>,
        cursor_field: Option<String>,
        lower_bound: Option<CursorValue>,
    ) -> Self {
        Self {
            stream: stream.into(),
            parent,
            id_field: id_field.into(),
            cursor_field,
            lower_bound,
            seen: HashSet::new(),
            done: false,
        }
    }

    /// Number of distinct parents seen so far
    pub fn parents_seen(&self) -> usize {
        self.seen.len()
    }
}

#[async_trait]
impl StreamSlicer for ParentSlicer {
    async fn next_slice(&mut self) -> Option<Result<Slice>> {
        if self.done {
            return None;
        }

        loop {
            let record = match self.parent.next_record().await {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    self.done = true;
                    warn!("Parent of stream {} failed: {e}", self.stream);
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    debug!(
                        "Stream {} sliced over {} parents",
                        self.stream,
                        self.parents_seen()
                    );
                    return None;
                }
            };

            let Some(id) = record_field(&record, &self.id_field).and_then(scalar_to_string) else {
                warn!(
                    "Skipping parent record without '{}' for stream {}",
                    self.id_field, self.stream
                );
                continue;
            };
            if !self.seen.insert(id.clone()) {
                continue;
            }

            let parent_cursor = self
                .cursor_field
                .as_deref()
                .and_then(|field| record_field(&record, field))
                .and_then(CursorValue::from_json);

            return Some(Ok(Slice::child(id, parent_cursor, self.lower_bound.clone())));
        }
    }
}

impl std::fmt::Debug for ParentSlicer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParentSlicer")
            .field("stream", &self.stream)
            .field("id_field", &self.id_field)
            .field("cursor_field", &self.cursor_field)
            .field("parents_seen", &self.parents_seen())
            .finish_non_exhaustive()
    }
}
