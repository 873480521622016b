//! HTTP request executor
//!
//! Issues exactly one request per call and reports what happened:
//! - Status, headers and body are returned for every HTTP response, 2xx or not
//! - Transport failures surface as [`Error::Http`], deadlines as [`Error::Timeout`]
//! - No retries, no sleeping beyond the optional client-side throttle

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::types::{Request, Response};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Something that can execute a single request
///
/// Implemented by [`HttpClient`] for real traffic and by scripted transports
/// in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one request, honouring the given deadline
    async fn execute(&self, request: &Request, deadline: Duration) -> Result<Response>;
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: Option<String>,
    /// Default request timeout
    pub timeout: Duration,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(60),
            rate_limit: Some(RateLimiterConfig::default()),
            default_headers: HashMap::new(),
            user_agent: format!("notion-extract/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the default request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP client owning the connection pool
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Build full URL from path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }

    /// Send the request and read the full body
    async fn send(&self, request: &Request) -> Result<Response> {
        let full_url = url::Url::parse(&self.build_url(&request.url))?;
        let mut req = self.client.request(request.method.into(), full_url);

        for (key, value) in &self.config.default_headers {
            if request.header_value(key).is_none() {
                req = req.header(key.as_str(), value.as_str());
            }
        }
        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(ref body) = request.body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!(
            "{} {} -> {} ({} bytes)",
            request.method,
            request.url,
            status,
            body.len()
        );
        Ok(Response::from_parts(status, headers, body))
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn execute(&self, request: &Request, deadline: Duration) -> Result<Response> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        match tokio::time::timeout(deadline, self.send(request)).await {
            Ok(result) => result.map_err(|e| match e {
                Error::Http(inner) if inner.is_timeout() => Error::Timeout {
                    timeout_ms: deadline.as_millis() as u64,
                },
                other => other,
            }),
            Err(_) => Err(Error::Timeout {
                timeout_ms: deadline.as_millis() as u64,
            }),
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}
