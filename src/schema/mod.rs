//! Record schema checks
//!
//! Only primary keys are validated; records are otherwise passed through
//! untouched.

mod primary_key;
mod types;

pub use primary_key::PrimaryKeyValidator;
pub use types::{JsonType, KeyPath};

#[cfg(test)]
mod tests;
