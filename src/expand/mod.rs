//! Depth-first expansion of record trees
//!
//! Some endpoints return records that carry further fetchable children
//! (Notion blocks with `has_children = true`). [`RecordExpander`] walks such
//! trees with an explicit stack of lazy child pagers, so depth is bounded by
//! the data and never by the call stack.
//!
//! Siblings are always emitted in server order. The traversal order decides
//! whether a node comes before its subtree (pre-order) or after it
//! (post-order).

mod expander;

pub use expander::{ChildSource, ExpandConfig, RecordExpander};
