//! Decoder types and traits
//!
//! Defines the core decoder abstractions.

use crate::error::Result;
use crate::http::Response;
use crate::types::Record;

/// Trait for decoding response bodies into records
pub trait RecordDecoder: Send + Sync + std::fmt::Debug {
    /// Decode one page into records, in server order
    fn decode(&self, response: &Response) -> Result<Vec<Record>>;
}
