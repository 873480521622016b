//! Response decoder module
//!
//! Supports: JSON, JSONL
//!
//! Each decoder turns one page into records, keeping the server's order of
//! both records and fields.

mod decoders;
mod types;

pub use decoders::{JsonDecoder, JsonlDecoder};
pub use types::RecordDecoder;

#[cfg(test)]
mod tests;
