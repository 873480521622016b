//! CLI module
//!
//! Command-line interface for running the extractor.
//!
//! # Commands
//!
//! - `check` - Test connection and credentials
//! - `discover` - Describe the catalog's streams
//! - `read` - Extract records from streams
//! - `list` - List built-in catalogs

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
