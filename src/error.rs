//! Error types for notion-extract
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//! Every variant maps onto an [`ErrorKind`], which decides how far up the
//! pipeline a failure travels before something recovers from it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for notion-extract
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Transport Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // HTTP Status Errors
    // ============================================================================
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Authentication failed with HTTP {status}: {body}")]
    AuthFailed { status: u16, body: String },

    #[error("Rate limit budget of {budget_seconds}s exhausted")]
    RateLimitBudgetExhausted { budget_seconds: u64 },

    #[error("Max retries ({max_retries}) exceeded, last error: {last_error}")]
    MaxRetriesExceeded { max_retries: u32, last_error: String },

    #[error("Pagination cursor rejected by server: {message}")]
    InvalidCursor { message: String },

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("Failed to extract records from path '{path}': {message}")]
    RecordExtraction { path: String, message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("Schema violation in stream '{stream}': {message}")]
    SchemaViolation { stream: String, message: String },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    // ============================================================================
    // Catalog Errors
    // ============================================================================
    #[error("Stream '{stream}' not found in catalog")]
    StreamNotFound { stream: String },

    #[error("Slice error for stream '{stream}': {message}")]
    Slice { stream: String, message: String },

    // ============================================================================
    // Template Errors
    // ============================================================================
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Undefined variable in template: {variable}")]
    UndefinedVariable { variable: String },

    // ============================================================================
    // Lifecycle
    // ============================================================================
    #[error("Sync cancelled")]
    Cancelled,

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

/// Conceptual error classes used for recovery decisions and `ERROR` messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Retried with exponential backoff; surfaces only once retries run out
    Transient,
    /// Retried per server hint; surfaces only once the budget runs out
    RateLimited,
    /// The stream is skipped, other streams continue
    InvalidCursor,
    /// The whole sync aborts
    AuthFailed,
    /// Primary key or record shape violation; the stream fails
    SchemaViolation,
    /// Non-retryable HTTP status; the stream fails
    FatalHttp,
    /// Shutdown was requested
    Cancelled,
    /// Bad configuration or catalog
    Config,
    /// Anything else (decode, template, state persistence)
    Internal,
}

impl ErrorKind {
    /// Whether this kind stops the entire sync rather than a single stream
    pub fn aborts_sync(self) -> bool {
        matches!(self, Self::AuthFailed | Self::Cancelled)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Transient => "transient",
            Self::RateLimited => "rate_limited",
            Self::InvalidCursor => "invalid_cursor",
            Self::AuthFailed => "auth_failed",
            Self::SchemaViolation => "schema_violation",
            Self::FatalHttp => "fatal_http",
            Self::Cancelled => "cancelled",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create an undefined variable error
    pub fn undefined_var(variable: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a slice error
    pub fn slice(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Slice {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create a schema violation error
    pub fn schema_violation(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(_) | Error::Timeout { .. } | Error::MaxRetriesExceeded { .. } => {
                ErrorKind::Transient
            }
            Error::RateLimitBudgetExhausted { .. } => ErrorKind::RateLimited,
            Error::InvalidCursor { .. } => ErrorKind::InvalidCursor,
            Error::AuthFailed { .. } => ErrorKind::AuthFailed,
            Error::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            Error::HttpStatus { .. } => ErrorKind::FatalHttp,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Config { .. }
            | Error::MissingConfigField { .. }
            | Error::InvalidConfigValue { .. }
            | Error::YamlParse(_)
            | Error::InvalidUrl(_)
            | Error::StreamNotFound { .. } => ErrorKind::Config,
            _ => ErrorKind::Internal,
        }
    }

    /// Check if this error is retryable by the backoff policy
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::Timeout { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for notion-extract
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
