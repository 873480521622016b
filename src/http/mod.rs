//! HTTP transport and retry policy
//!
//! Two layers:
//!
//! - **Executor** ([`HttpClient`]): sends one request, returns status, headers
//!   and body verbatim. Non-2xx is data, not an error.
//! - **Retry policy** ([`RetryPolicy`]): classifies each outcome and decides
//!   whether to sleep and try again, fail the stream, or abort the sync.
//!
//! The policy talks to the executor through the [`Transport`] trait so tests
//! can script responses and observe the delays between attempts.

mod client;
mod rate_limit;
mod retry;
mod types;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, Transport};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use retry::{
    classify, classify_response, is_invalid_cursor, Backoff, ErrorClass, RetryConfig,
    RetryPolicy,
};
pub use types::{Request, Response};
