//! Source configuration
//!
//! The user-supplied configuration of a sync: credentials, the incremental
//! start date, page sizes and the retry/backoff knobs. Loaded from a JSON or
//! YAML file and validated before anything is fetched.

use crate::error::{Error, Result};
use crate::http::{RateLimiterConfig, RetryConfig};
use crate::state::CursorValue;
use crate::types::{BackoffType, JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Largest page size the Notion API accepts
pub const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// Page Size
// ============================================================================

/// Page size, either for every stream or per stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageSize {
    /// Same size for every stream
    Uniform(u32),
    /// Stream name to size; unlisted streams use the maximum
    PerStream(BTreeMap<String, u32>),
}

impl Default for PageSize {
    fn default() -> Self {
        Self::Uniform(MAX_PAGE_SIZE)
    }
}

impl PageSize {
    /// Page size for one stream
    pub fn for_stream(&self, stream: &str) -> u32 {
        match self {
            Self::Uniform(size) => *size,
            Self::PerStream(sizes) => sizes.get(stream).copied().unwrap_or(MAX_PAGE_SIZE),
        }
    }

    fn validate(&self) -> Result<()> {
        let sizes: Vec<(&str, u32)> = match self {
            Self::Uniform(size) => vec![("page_size", *size)],
            Self::PerStream(sizes) => sizes.iter().map(|(k, v)| (k.as_str(), *v)).collect(),
        };
        for (name, size) in sizes {
            if !(1..=MAX_PAGE_SIZE).contains(&size) {
                return Err(Error::invalid_value(
                    "page_size",
                    format!("{name}: {size} is outside 1..={MAX_PAGE_SIZE}"),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Source Config
// ============================================================================

/// Configuration of one sync
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Credential sent verbatim in the `Authorization` header
    #[serde(default)]
    pub access_token: String,
    /// Lower bound for the first incremental run; epoch when absent
    #[serde(default)]
    pub start_date: Option<String>,
    /// Page size override
    #[serde(default)]
    pub page_size: PageSize,
    /// Retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Minimum sleep on a rate-limited response
    #[serde(default = "default_rate_limit_floor")]
    pub rate_limit_floor_seconds: u64,
    /// API base URL; the catalog's base URL when absent
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-request deadline
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// First transient backoff delay
    #[serde(default = "default_backoff_base")]
    pub backoff_base_seconds: u64,
    /// Cap on transient backoff delays
    #[serde(default = "default_backoff_max")]
    pub backoff_max_seconds: u64,
    /// Retries for a rejected pagination cursor
    #[serde(default = "default_invalid_cursor_retries")]
    pub invalid_cursor_retries: u32,
    /// Constant delay between invalid-cursor retries
    #[serde(default = "default_invalid_cursor_backoff")]
    pub invalid_cursor_backoff_seconds: u64,
    /// Total rate-limit sleep allowed per stream
    #[serde(default = "default_rate_limit_budget")]
    pub rate_limit_budget_seconds: u64,
    /// Client-side throttle; 0 disables it
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    /// Anything else, available to templates as `{{ config.* }}`
    #[serde(flatten)]
    pub extra: JsonObject,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("access_token", &"***")
            .field("start_date", &self.start_date)
            .field("page_size", &self.page_size)
            .field("max_retries", &self.max_retries)
            .field("rate_limit_floor_seconds", &self.rate_limit_floor_seconds)
            .field("base_url", &self.base_url)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("backoff_base_seconds", &self.backoff_base_seconds)
            .field("backoff_max_seconds", &self.backoff_max_seconds)
            .field("invalid_cursor_retries", &self.invalid_cursor_retries)
            .field(
                "invalid_cursor_backoff_seconds",
                &self.invalid_cursor_backoff_seconds,
            )
            .field("rate_limit_budget_seconds", &self.rate_limit_budget_seconds)
            .field("requests_per_second", &self.requests_per_second)
            // values may hold credentials too
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_rate_limit_floor() -> u64 {
    1
}

fn default_request_timeout() -> u64 {
    60
}

fn default_backoff_base() -> u64 {
    5
}

fn default_backoff_max() -> u64 {
    300
}

fn default_invalid_cursor_retries() -> u32 {
    7
}

fn default_invalid_cursor_backoff() -> u64 {
    5
}

fn default_rate_limit_budget() -> u64 {
    600
}

fn default_requests_per_second() -> u32 {
    3
}

impl SourceConfig {
    /// Config with a token and defaults everywhere else
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            start_date: None,
            page_size: PageSize::default(),
            max_retries: default_max_retries(),
            rate_limit_floor_seconds: default_rate_limit_floor(),
            base_url: None,
            request_timeout_seconds: default_request_timeout(),
            backoff_base_seconds: default_backoff_base(),
            backoff_max_seconds: default_backoff_max(),
            invalid_cursor_retries: default_invalid_cursor_retries(),
            invalid_cursor_backoff_seconds: default_invalid_cursor_backoff(),
            rate_limit_budget_seconds: default_rate_limit_budget(),
            requests_per_second: default_requests_per_second(),
            extra: JsonObject::new(),
        }
    }

    /// Parse and validate a JSON value
    pub fn from_value(value: JsonValue) -> Result<Self> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON or YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config '{}': {e}", path.display()))
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            let config: Self = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Set the start date
    #[must_use]
    pub fn with_start_date(mut self, start_date: impl Into<String>) -> Self {
        self.start_date = Some(start_date.into());
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Check required fields and ranges
    pub fn validate(&self) -> Result<()> {
        if self.access_token.trim().is_empty() {
            return Err(Error::missing_field("access_token"));
        }
        if let Some(ref url) = self.base_url {
            url::Url::parse(url)
                .map_err(|e| Error::invalid_value("base_url", format!("'{url}': {e}")))?;
        }
        if let Some(ref start) = self.start_date {
            if !matches!(CursorValue::parse(start), CursorValue::Timestamp(_)) {
                return Err(Error::invalid_value(
                    "start_date",
                    format!("'{start}' is not an ISO-8601 date or timestamp"),
                ));
            }
        }
        self.page_size.validate()?;
        if self.request_timeout_seconds == 0 {
            return Err(Error::invalid_value(
                "request_timeout_seconds",
                "must be greater than zero",
            ));
        }
        if self.backoff_max_seconds < self.backoff_base_seconds {
            return Err(Error::invalid_value(
                "backoff_max_seconds",
                "must not be below backoff_base_seconds",
            ));
        }
        Ok(())
    }

    /// Lower bound used when a stream has no persisted checkpoint
    pub fn start_checkpoint(&self) -> CursorValue {
        self.start_date
            .as_deref()
            .map_or_else(CursorValue::epoch, CursorValue::parse)
    }

    /// Page size for one stream
    pub fn page_size_for(&self, stream: &str) -> u32 {
        self.page_size.for_stream(stream)
    }

    /// Retry policy settings
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(self.max_retries)
            .with_backoff(
                BackoffType::Exponential,
                Duration::from_secs(self.backoff_base_seconds),
                Duration::from_secs(self.backoff_max_seconds),
            )
            .with_invalid_cursor(
                self.invalid_cursor_retries,
                Duration::from_secs(self.invalid_cursor_backoff_seconds),
            )
            .with_rate_limit(
                Duration::from_secs(self.rate_limit_floor_seconds),
                Duration::from_secs(self.rate_limit_budget_seconds),
            )
            .with_request_timeout(Duration::from_secs(self.request_timeout_seconds))
    }

    /// Client-side throttle, if enabled
    pub fn rate_limiter_config(&self) -> Option<RateLimiterConfig> {
        RateLimiterConfig::per_second(self.requests_per_second)
    }

    /// Values exposed to templates as `{{ config.* }}`
    pub fn to_template_value(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or_default()
    }
}
