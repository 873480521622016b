//! Loader types
//!
//! Declarative catalog definition types for YAML parsing.

use crate::pagination::TokenLocation;
use crate::schema::KeyPath;
use crate::types::TraversalOrder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Connector Definition
// ============================================================================

/// Top-level connector definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConnectorDefinition {
    /// Connector name
    pub name: String,
    /// Connector version
    #[serde(default = "default_version")]
    pub version: String,
    /// Base URL used when the source config does not override it
    #[serde(default)]
    pub base_url: Option<String>,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthDefinition,
    /// Connection check configuration
    #[serde(default)]
    pub check: Option<CheckDefinition>,
    /// Stream definitions
    pub streams: Vec<StreamDefinition>,
    /// Headers sent on every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ConnectorDefinition {
    /// Look up a stream by name
    pub fn get_stream(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Stream names in definition order
    pub fn stream_names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Connection check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CheckDefinition {
    /// URL path for check endpoint
    pub path: String,
    /// HTTP method
    #[serde(default = "default_method")]
    pub method: String,
    /// Query parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

// ============================================================================
// Auth Definition
// ============================================================================

/// Authentication definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthDefinition {
    /// Value placed in a header or query parameter
    ApiKey {
        /// Header or query param name
        key: String,
        /// Value (usually a template like `{{ config.access_token }}`)
        value: String,
        /// Location: header or query
        #[serde(default)]
        location: AuthLocation,
    },
    /// `Authorization: Bearer <token>`
    Bearer {
        /// Token value (template)
        token: String,
    },
    /// No authentication
    #[default]
    None,
}

/// Where an API key goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthLocation {
    /// Request header
    #[default]
    Header,
    /// Query parameter
    Query,
}

// ============================================================================
// Stream Definition
// ============================================================================

/// Stream definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamDefinition {
    /// Stream name
    pub name: String,
    /// Request configuration
    pub request: RequestDefinition,
    /// Response decoder
    #[serde(default)]
    pub decoder: DecoderDefinition,
    /// Pagination configuration
    #[serde(default)]
    pub pagination: PaginationDefinition,
    /// Parent stream; one slice per parent record
    #[serde(default)]
    pub parent: Option<ParentDefinition>,
    /// Depth-first expansion of nested children
    #[serde(default)]
    pub expand: Option<ExpandDefinition>,
    /// Records that are structure rather than content
    #[serde(default)]
    pub non_content: Option<NonContentDefinition>,
    /// Primary key paths
    #[serde(default)]
    pub primary_key: Vec<KeyPath>,
    /// Cursor field for incremental sync
    #[serde(default)]
    pub cursor_field: Option<String>,
    /// Whether the stream can be read incrementally
    #[serde(default)]
    pub incremental: bool,
}

impl StreamDefinition {
    /// Whether incremental reads are possible
    pub fn supports_incremental(&self) -> bool {
        self.incremental && self.cursor_field.is_some()
    }
}

// ============================================================================
// Request Definition
// ============================================================================

/// Request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RequestDefinition {
    /// HTTP method
    #[serde(default = "default_method")]
    pub method: String,
    /// URL path (can contain templates)
    pub path: String,
    /// Query parameters (values can contain templates)
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// JSON body (string values can contain templates)
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    /// Stream-specific headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".to_string()
}

// ============================================================================
// Decoder Definition
// ============================================================================

/// Response decoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecoderDefinition {
    /// JSON decoder
    Json {
        /// Path to the records array
        #[serde(default)]
        records_path: Option<String>,
    },
    /// JSONL (newline-delimited JSON) decoder
    Jsonl,
}

impl Default for DecoderDefinition {
    fn default() -> Self {
        Self::Json { records_path: None }
    }
}

// ============================================================================
// Pagination Definition
// ============================================================================

/// Pagination configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationDefinition {
    /// No pagination
    #[default]
    None,
    /// Cursor-based pagination
    Cursor {
        /// Cursor parameter name
        cursor_param: String,
        /// Path to next cursor in response
        cursor_path: String,
        /// Path to a boolean "more pages" flag
        #[serde(default)]
        has_more_path: Option<String>,
        /// Where the cursor and page size go
        #[serde(default)]
        location: TokenLocation,
        /// Page size parameter name
        #[serde(default)]
        page_size_param: Option<String>,
    },
    /// Link header pagination (RFC 5988)
    LinkHeader {
        /// Relation to follow (usually "next")
        #[serde(default = "default_link_rel")]
        rel: String,
    },
}

fn default_link_rel() -> String {
    "next".to_string()
}

// ============================================================================
// Parent, Expansion and Filtering
// ============================================================================

/// Parent stream relation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ParentDefinition {
    /// Parent stream name
    pub stream: String,
    /// Field of the parent record holding its identifier
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Field of the parent record holding its cursor value
    #[serde(default)]
    pub cursor_field: Option<String>,
    /// Copy the parent's cursor value into each child record under this name
    #[serde(default)]
    pub inject_as: Option<String>,
}

/// Depth-first expansion of records with children
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExpandDefinition {
    /// Node before (pre) or after (post) its subtree
    #[serde(default)]
    pub order: TraversalOrder,
    /// Field holding the node identifier
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Boolean field telling whether a node has children
    #[serde(default = "default_has_children_field")]
    pub has_children_field: String,
}

/// Structural records, matched on a field's value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NonContentDefinition {
    /// Field to inspect
    #[serde(default = "default_type_field")]
    pub field: String,
    /// Values marking a record as structural
    pub values: Vec<String>,
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_has_children_field() -> String {
    "has_children".to_string()
}

fn default_type_field() -> String {
    "type".to_string()
}
