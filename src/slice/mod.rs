//! Stream slicing
//!
//! Root streams get a single slice; child streams get one slice per parent
//! record, carrying the parent's id and cursor value.

mod slicers;
mod types;

pub use slicers::{ParentSlicer, SingleSlicer};
pub use types::{RecordSource, Slice, StreamSlicer};
