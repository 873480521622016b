//! Output module
//!
//! Writes sync messages as JSON lines to stdout or a file.
//!
//! # Overview
//!
//! - `MessageWriter` - Serializes messages one per line
//! - `OutputFormat` - Compact JSON lines or pretty-printed JSON

mod writer;

pub use writer::{MessageWriter, OutputFormat};
