//! # notion-extract
//!
//! Incremental pagination and backoff engine for cursor-paginated REST APIs,
//! shipped with a catalog for the Notion public API.
//!
//! ## Features
//!
//! - **Retry & Backoff**: Exponential backoff for transient failures, `Retry-After`
//!   aware rate limiting with a per-stream budget, bounded retries of rejected cursors
//! - **Lazy Pagination**: Cursor and link-header strategies, one page in memory at a time
//! - **Incremental Sync**: Per-stream checkpoints that only advance when a stream completes
//! - **Parent/Child Streams**: Child slices skipped when the parent has not changed
//! - **Tree Expansion**: Depth-first traversal of nested records, pre- or post-order
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use notion_extract::{load_connector, SourceConfig, StateManager, SyncEngine};
//!
//! #[tokio::main]
//! async fn main() -> notion_extract::Result<()> {
//!     let catalog = load_connector("notion")?;
//!     let config = SourceConfig::from_file("config.yaml")?;
//!     let state = StateManager::from_file("state.json")?;
//!
//!     let engine = SyncEngine::new(catalog, config, state)?;
//!     let mut run = engine.read(&["pages", "blocks"])?;
//!     while let Some(message) = run.next_message().await {
//!         println!("{}", message.to_json_line()?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      SyncEngine / SyncRun                       │
//! │   ordered streams → RECORD* STATE LOG | ERROR, per stream       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │  Slicer  │  Expander │  Page Iterator│   State   │  Retry/HTTP │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Single   │ Pre-order │ Cursor        │ Checkpoint│ Backoff     │
//! │ Parent   │ Post-order│ Link Header   │ Filter    │ Rate Limit  │
//! │          │           │               │ PK check  │ Cancellation│
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Authentication
pub mod auth;

/// HTTP executor, retry and rate limiting
pub mod http;

/// Pagination strategies and lazy page iteration
pub mod pagination;

/// Response decoders (JSON, JSONL)
pub mod decode;

/// Cursor state, record filtering and checkpoint persistence
pub mod state;

/// Stream slicing (single and parent/child)
pub mod slice;

/// Depth-first expansion of nested records
pub mod expand;

/// Primary key validation
pub mod schema;

/// Main execution engine
pub mod engine;

/// Source configuration
pub mod config;

/// YAML loader for stream catalogs
pub mod loader;

/// Template interpolation
pub mod template;

/// Built-in catalog definitions
pub mod connectors;

/// JSON lines output
pub mod output;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, ErrorKind, Result};
pub use types::*;

// Re-export commonly used types
pub use config::SourceConfig;
pub use engine::{Message, SyncConfig, SyncEngine, SyncRun, SyncStats};
pub use loader::{load_connector, load_connector_from_str, ConnectorDefinition};
pub use state::{CursorValue, StateManager};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
