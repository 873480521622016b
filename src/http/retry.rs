//! Retry and backoff policy
//!
//! Wraps a [`Transport`] and turns its raw outcomes into either a successful
//! response or a classified error. The classification table:
//!
//! | Class          | Trigger                                   | Action                                   |
//! |----------------|-------------------------------------------|------------------------------------------|
//! | Success        | 2xx                                       | return                                   |
//! | InvalidCursor  | 400 `validation_error` on `start_cursor`  | constant backoff, N retries, then skip   |
//! | RateLimited    | 429                                       | sleep `max(retry-after, floor)`, budget  |
//! | Transient      | 500/502/503/504, transport, timeout       | exponential backoff, `max_retries`       |
//! | Auth           | 401/403                                   | fail immediately                         |
//! | Fatal          | any other status                          | fail immediately                         |
//!
//! The exponential counter lives for one failure run: it starts at zero for
//! every call and is reset by any success, so a healthy request between two
//! outages means the second outage backs off from the base delay again.

use super::client::Transport;
use super::types::{Request, Response};
use crate::error::{is_retryable_status, Error, Result};
use crate::types::BackoffType;
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Message pattern the server uses when a pagination cursor has gone stale
static INVALID_CURSOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"start_cursor provided is invalid").expect("valid regex"));

/// Tunables for the retry policy
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retries for transient failures
    pub max_retries: u32,
    /// Backoff shape for transient failures
    pub backoff_type: BackoffType,
    /// First transient delay
    pub initial_backoff: Duration,
    /// Growth factor for exponential backoff
    pub backoff_factor: u32,
    /// Cap for any single transient delay
    pub max_backoff: Duration,
    /// Retries for an invalid-cursor response before the stream is skipped
    pub invalid_cursor_retries: u32,
    /// Constant delay between invalid-cursor retries
    pub invalid_cursor_backoff: Duration,
    /// Minimum sleep after a 429
    pub rate_limit_floor: Duration,
    /// Total 429 sleep allowed within one stream
    pub rate_limit_budget: Duration,
    /// Per-request deadline handed to the transport
    pub request_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_type: BackoffType::Exponential,
            initial_backoff: Duration::from_secs(5),
            backoff_factor: 2,
            max_backoff: Duration::from_secs(300),
            invalid_cursor_retries: 7,
            invalid_cursor_backoff: Duration::from_secs(5),
            rate_limit_floor: Duration::from_secs(1),
            rate_limit_budget: Duration::from_secs(600),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Create a retry config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max transient retries
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set transient backoff shape
    #[must_use]
    pub fn with_backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.backoff_type = backoff_type;
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Set invalid-cursor retry behaviour
    #[must_use]
    pub fn with_invalid_cursor(mut self, retries: u32, delay: Duration) -> Self {
        self.invalid_cursor_retries = retries;
        self.invalid_cursor_backoff = delay;
        self
    }

    /// Set rate-limit floor and per-stream budget
    #[must_use]
    pub fn with_rate_limit(mut self, floor: Duration, budget: Duration) -> Self {
        self.rate_limit_floor = floor;
        self.rate_limit_budget = budget;
        self
    }

    /// Set the per-request deadline
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Classification of one transport outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 2xx
    Success,
    /// 400 validation error about the pagination cursor
    InvalidCursor,
    /// 429 with the server's hint, if any
    RateLimited {
        /// Parsed `retry-after` header
        retry_after: Option<Duration>,
    },
    /// Server hiccup or transport failure
    Transient,
    /// 401 or 403
    Auth,
    /// Anything else that is not retried
    Fatal,
}

/// Classify a transport outcome
pub fn classify(outcome: &Result<Response>) -> ErrorClass {
    match outcome {
        Ok(response) => classify_response(response),
        Err(e) if e.is_retryable() => ErrorClass::Transient,
        Err(_) => ErrorClass::Fatal,
    }
}

/// Classify an HTTP response by status and body
pub fn classify_response(response: &Response) -> ErrorClass {
    match response.status {
        200..=299 => ErrorClass::Success,
        429 => ErrorClass::RateLimited {
            retry_after: response.retry_after(),
        },
        401 | 403 => ErrorClass::Auth,
        400 if is_invalid_cursor(response) => ErrorClass::InvalidCursor,
        status if is_retryable_status(status) => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}

/// Check for `{"code": "validation_error", "message": "start_cursor provided is invalid: …"}`
pub fn is_invalid_cursor(response: &Response) -> bool {
    response.json_str("code") == Some("validation_error")
        && response
            .json_str("message")
            .is_some_and(|m| INVALID_CURSOR_REGEX.is_match(m))
}

/// Delay generator for one failure run
#[derive(Debug, Clone)]
pub struct Backoff {
    backoff_type: BackoffType,
    initial: Duration,
    factor: u32,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    /// Create a backoff starting at attempt zero
    pub fn new(backoff_type: BackoffType, initial: Duration, factor: u32, max: Duration) -> Self {
        Self {
            backoff_type,
            initial,
            factor,
            max,
            attempt: 0,
        }
    }

    /// Exponential backoff described by a retry config
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.backoff_type,
            config.initial_backoff,
            config.backoff_factor,
            config.max_backoff,
        )
    }

    /// Number of delays handed out since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Delay for a given attempt index, without advancing
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => Some(self.initial),
            BackoffType::Linear => self.initial.checked_mul(attempt.saturating_add(1)),
            BackoffType::Exponential => self
                .initial
                .checked_mul(self.factor.max(1).saturating_pow(attempt)),
        };

        delay.map_or(self.max, |d| d.min(self.max))
    }

    /// Hand out the next delay and advance
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Start over from the base delay
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Retrying wrapper around a transport
pub struct RetryPolicy {
    transport: Arc<dyn Transport>,
    config: RetryConfig,
    cancel: CancellationToken,
    rate_limited_ms: AtomicU64,
    responses: AtomicU64,
}

impl RetryPolicy {
    /// Create a policy with its own cancellation token
    pub fn new(transport: Arc<dyn Transport>, config: RetryConfig) -> Self {
        Self {
            transport,
            config,
            cancel: CancellationToken::new(),
            rate_limited_ms: AtomicU64::new(0),
            responses: AtomicU64::new(0),
        }
    }

    /// Use a shared cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Get the policy configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Get the cancellation token
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Reset the per-stream rate-limit budget
    pub fn begin_stream(&self) {
        self.rate_limited_ms.store(0, Ordering::Relaxed);
    }

    /// Time spent sleeping on 429s since the last [`begin_stream`](Self::begin_stream)
    pub fn rate_limited_for(&self) -> Duration {
        Duration::from_millis(self.rate_limited_ms.load(Ordering::Relaxed))
    }

    /// Successful responses returned so far
    pub fn responses(&self) -> u64 {
        self.responses.load(Ordering::Relaxed)
    }

    /// Execute a request until it succeeds or fails for good
    pub async fn call(&self, request: &Request) -> Result<Response> {
        let mut backoff = Backoff::from_config(&self.config);
        let mut invalid_cursor_retries = 0u32;

        loop {
            let outcome = self.attempt(request).await;
            if matches!(outcome, Err(Error::Cancelled)) {
                return outcome;
            }

            match classify(&outcome) {
                ErrorClass::Success => {
                    backoff.reset();
                    self.responses.fetch_add(1, Ordering::Relaxed);
                    return outcome;
                }
                ErrorClass::Transient => {
                    let reason = describe(&outcome);
                    if backoff.attempts() >= self.config.max_retries {
                        warn!(
                            "Giving up on {} {} after {} retries: {reason}",
                            request.method, request.url, self.config.max_retries
                        );
                        return Err(Error::MaxRetriesExceeded {
                            max_retries: self.config.max_retries,
                            last_error: reason,
                        });
                    }
                    let delay = backoff.next_delay();
                    debug!(
                        "Transient failure on {} {} ({reason}), retry {}/{} in {:?}",
                        request.method,
                        request.url,
                        backoff.attempts(),
                        self.config.max_retries,
                        delay
                    );
                    self.sleep(delay).await?;
                }
                ErrorClass::RateLimited { retry_after } => {
                    let floor = self.config.rate_limit_floor;
                    let delay = retry_after.map_or(floor, |hint| hint.max(floor));
                    let spent = self.rate_limited_for();
                    let within_budget = spent
                        .checked_add(delay)
                        .is_some_and(|total| total <= self.config.rate_limit_budget);
                    if !within_budget {
                        warn!(
                            "Rate limit budget exhausted on {} after {:?}",
                            request.url, spent
                        );
                        return Err(Error::RateLimitBudgetExhausted {
                            budget_seconds: self.config.rate_limit_budget.as_secs(),
                        });
                    }
                    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    self.rate_limited_ms.fetch_add(millis, Ordering::Relaxed);
                    info!("Rate limited (429) on {}, waiting {:?}", request.url, delay);
                    self.sleep(delay).await?;
                }
                ErrorClass::InvalidCursor => {
                    let message = outcome
                        .as_ref()
                        .ok()
                        .and_then(|r| r.json_str("message"))
                        .unwrap_or("start_cursor provided is invalid")
                        .to_string();
                    if invalid_cursor_retries >= self.config.invalid_cursor_retries {
                        return Err(Error::InvalidCursor { message });
                    }
                    invalid_cursor_retries += 1;
                    warn!(
                        "Invalid cursor on {} ({message}), retry {}/{}",
                        request.url, invalid_cursor_retries, self.config.invalid_cursor_retries
                    );
                    self.sleep(self.config.invalid_cursor_backoff).await?;
                }
                ErrorClass::Auth => {
                    let response = outcome?;
                    return Err(Error::AuthFailed {
                        status: response.status,
                        body: response.text(),
                    });
                }
                ErrorClass::Fatal => {
                    let response = outcome?;
                    return Err(Error::http_status(response.status, response.text()));
                }
            }
        }
    }

    /// One transport call, abandoned as soon as shutdown is requested
    async fn attempt(&self, request: &Request) -> Result<Response> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            result = self.transport.execute(request, self.config.request_timeout) => result,
        }
    }

    /// Sleep that ends early with [`Error::Cancelled`] on shutdown
    async fn sleep(&self, delay: Duration) -> Result<()> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Short description of a failed outcome for logs and errors
fn describe(outcome: &Result<Response>) -> String {
    match outcome {
        Ok(response) => format!("HTTP {}", response.status),
        Err(e) => e.to_string(),
    }
}
