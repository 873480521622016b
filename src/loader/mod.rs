//! YAML Loader module
//!
//! Parse catalog definitions from YAML files.
//!
//! # Overview
//!
//! The loader module provides:
//! - `ConnectorDefinition` - Declarative source specification
//! - `StreamDefinition` - Stream configuration
//! - YAML parsing with validation and dependency ordering

mod parser;
mod types;

pub use parser::{dependency_order, load_connector, load_connector_from_str};
pub use types::{
    AuthDefinition, AuthLocation, CheckDefinition, ConnectorDefinition, DecoderDefinition,
    ExpandDefinition, NonContentDefinition, PaginationDefinition, ParentDefinition,
    RequestDefinition, StreamDefinition,
};
