//! Record filtering for incremental streams
//!
//! A record is compared with the checkpoint through its *effective* cursor
//! value: the parent's cursor for child streams, the record's own cursor
//! field otherwise. Children of an unchanged parent are therefore dropped
//! wholesale, and children of a changed parent are all kept.

use super::cursor::CursorValue;
use crate::slice::Slice;
use crate::types::{record_field, Record};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Decides whether a record is structural rather than content
pub trait NonContentPredicate: Send + Sync + std::fmt::Debug {
    /// True when the record must never be emitted
    fn is_non_content(&self, record: &Record) -> bool;
}

/// Non-content when a string field takes one of a set of values
///
/// Notion block streams use `type ∈ {child_page, child_database}`: those
/// blocks only point at pages and databases that are read as streams of
/// their own.
#[derive(Debug, Clone)]
pub struct TypeFieldPredicate {
    field: String,
    values: BTreeSet<String>,
}

impl TypeFieldPredicate {
    /// Create a predicate over `field`
    pub fn new<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl NonContentPredicate for TypeFieldPredicate {
    fn is_non_content(&self, record: &Record) -> bool {
        matches!(record_field(record, &self.field), Some(Value::String(s)) if self.values.contains(s))
    }
}

/// Outcome of filtering one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    /// Emit, carrying the effective cursor value (if any) for the high-watermark
    Emit(Option<CursorValue>),
    /// Structural record
    NonContent,
    /// Effective cursor value is strictly below the checkpoint
    Stale,
}

/// Applies the record-filter contract for one stream
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    cursor_field: Option<String>,
    checkpoint: Option<CursorValue>,
    incremental: bool,
    inherits_parent_cursor: bool,
    non_content: Option<Arc<dyn NonContentPredicate>>,
}

impl RecordFilter {
    /// Filter that only drops non-content records
    pub fn full_refresh() -> Self {
        Self::default()
    }

    /// Incremental filter against a checkpoint
    pub fn incremental(cursor_field: Option<String>, checkpoint: Option<CursorValue>) -> Self {
        Self {
            cursor_field,
            checkpoint,
            incremental: true,
            ..Default::default()
        }
    }

    /// Compare through the parent's cursor value instead of the record's
    #[must_use]
    pub fn inheriting_parent_cursor(mut self, inherit: bool) -> Self {
        self.inherits_parent_cursor = inherit;
        self
    }

    /// Set the non-content predicate
    #[must_use]
    pub fn with_non_content(mut self, predicate: Option<Arc<dyn NonContentPredicate>>) -> Self {
        self.non_content = predicate;
        self
    }

    /// The checkpoint records are compared with
    pub fn checkpoint(&self) -> Option<&CursorValue> {
        self.checkpoint.as_ref()
    }

    /// Whether a record is structural
    pub fn is_non_content(&self, record: &Record) -> bool {
        self.non_content
            .as_ref()
            .is_some_and(|p| p.is_non_content(record))
    }

    /// Value compared with the checkpoint for this record
    pub fn effective_cursor(&self, record: &Record, slice: &Slice) -> Option<CursorValue> {
        if self.inherits_parent_cursor {
            return slice.parent_cursor_value.clone();
        }
        self.cursor_field
            .as_deref()
            .and_then(|field| record_field(record, field))
            .and_then(CursorValue::from_json)
    }

    /// Whether a whole child slice can be skipped before fetching it
    pub fn should_skip_slice(&self, slice: &Slice) -> bool {
        if !self.incremental || !self.inherits_parent_cursor {
            return false;
        }
        match (&slice.parent_cursor_value, &self.checkpoint) {
            (Some(parent), Some(checkpoint)) => parent < checkpoint,
            _ => false,
        }
    }

    /// Decide what to do with one record
    pub fn decide(&self, record: &Record, slice: &Slice) -> FilterDecision {
        if self.is_non_content(record) {
            return FilterDecision::NonContent;
        }

        let effective = self.effective_cursor(record, slice);
        if self.incremental {
            if let (Some(value), Some(checkpoint)) = (&effective, &self.checkpoint) {
                if value < checkpoint {
                    return FilterDecision::Stale;
                }
            }
        }
        FilterDecision::Emit(effective)
    }
}
