//! Slice types and traits
//!
//! A slice is one unit of work handed to the page iterator: which parent to
//! read children of, and the incremental lower bound.

use crate::error::Result;
use crate::state::CursorValue;
use crate::types::Record;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// One unit of work for the page iterator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slice {
    /// Identifier of the parent record (child streams only)
    pub parent_id: Option<String>,
    /// Cursor value of the parent record (child streams only)
    pub parent_cursor_value: Option<CursorValue>,
    /// Incremental lower bound from state
    pub lower_bound: Option<CursorValue>,
    /// Extra values exposed to request templates
    pub extra_params: BTreeMap<String, Value>,
}

impl Slice {
    /// Slice of a root stream
    pub fn root(lower_bound: Option<CursorValue>) -> Self {
        Self {
            lower_bound,
            ..Default::default()
        }
    }

    /// Slice for the children of one parent record
    pub fn child(
        parent_id: impl Into<String>,
        parent_cursor_value: Option<CursorValue>,
        lower_bound: Option<CursorValue>,
    ) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            parent_cursor_value,
            lower_bound,
            extra_params: BTreeMap::new(),
        }
    }

    /// Add a template value
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    /// Whether this slice belongs to a child stream
    pub fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Values available to templates as `{{ slice.* }}`
    pub fn to_template_value(&self) -> Value {
        let mut value = json!({
            "parent_id": self.parent_id,
            "parent_cursor_value": self.parent_cursor_value.as_ref().map(ToString::to_string),
            "lower_bound": self.lower_bound.as_ref().map(ToString::to_string),
        });
        if let Some(map) = value.as_object_mut() {
            for (key, extra) in &self.extra_params {
                map.insert(key.clone(), extra.clone());
            }
        }
        value
    }
}

/// Lazily produced records, e.g. a parent stream being read
#[async_trait]
pub trait RecordSource: Send {
    /// Next record, or `None` once exhausted
    async fn next_record(&mut self) -> Option<Result<Record>>;
}

/// Lazily produced slices of one stream
#[async_trait]
pub trait StreamSlicer: Send {
    /// Next slice, or `None` once exhausted
    async fn next_slice(&mut self) -> Option<Result<Slice>>;
}
