//! Primary key validation
//!
//! Every declared key path must resolve to null (or be absent) or to a
//! scalar. Objects and arrays cannot identify a record. A composite key also
//! needs at least one non-null component.

use super::types::{JsonType, KeyPath};
use crate::error::{Error, Result};
use crate::types::Record;
use serde_json::Value;

/// Validates the primary key of each record of one stream
#[derive(Debug, Clone)]
pub struct PrimaryKeyValidator {
    stream: String,
    paths: Vec<Vec<String>>,
}

impl PrimaryKeyValidator {
    /// Create a validator for the given key paths
    pub fn new(stream: impl Into<String>, paths: &[KeyPath]) -> Self {
        Self {
            stream: stream.into(),
            paths: paths.iter().map(KeyPath::segments).collect(),
        }
    }

    /// Whether any key is declared
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Check one record, failing with [`Error::SchemaViolation`]
    pub fn validate(&self, record: &Record) -> Result<()> {
        if self.paths.is_empty() {
            return Ok(());
        }

        let mut non_null = 0;
        for path in &self.paths {
            let kind = resolve(record, path).map_or(JsonType::Null, JsonType::of);
            match kind {
                JsonType::Null => {}
                kind if kind.is_scalar() => non_null += 1,
                kind => {
                    return Err(Error::schema_violation(
                        &self.stream,
                        format!(
                            "primary key '{}' is {kind}, expected a scalar",
                            path.join(".")
                        ),
                    ));
                }
            }
        }

        if non_null == 0 {
            return Err(Error::schema_violation(
                &self.stream,
                format!(
                    "primary key ({}) is entirely null",
                    self.paths
                        .iter()
                        .map(|p| p.join("."))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ));
        }
        Ok(())
    }
}

/// Walk a key path; anything that is not an object along the way counts as absent
fn resolve<'a>(record: &'a Record, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = record.get(first)?;
    for key in rest {
        current = current.as_object()?.get(key)?;
    }
    Some(current)
}
