//! Client-side request throttle
//!
//! Uses the governor crate for token bucket rate limiting. This keeps the
//! client under the server's average request rate so that 429 responses stay
//! the exception; it does not replace the retry policy's 429 handling.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of requests per second
    pub requests_per_second: u32,
    /// Burst size (max tokens in bucket)
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    /// Notion documents an average of three requests per second per integration
    fn default() -> Self {
        Self {
            requests_per_second: 3,
            burst_size: 3,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }

    /// Config allowing `rps` requests per second with an equal burst,
    /// or `None` when `rps` is zero (throttle disabled)
    pub fn per_second(rps: u32) -> Option<Self> {
        (rps > 0).then(|| Self::new(rps, rps))
    }
}

/// Token bucket rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: Arc::new(Governor::direct(quota)),
        }
    }

    /// Wait until a request can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to acquire a permit, returning immediately
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Wait with a timeout
    pub async fn wait_with_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.limiter.until_ready())
            .await
            .is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}

#[cfg(test)]
mod rate_limit_tests {
    use super::*;

    #[test]
    fn test_rate_limiter_config_default() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.requests_per_second, 3);
        assert_eq!(config.burst_size, 3);
    }

    #[test]
    fn test_rate_limiter_config_per_second() {
        let config = RateLimiterConfig::per_second(10).unwrap();
        assert_eq!(config.requests_per_second, 10);
        assert_eq!(config.burst_size, 10);
        assert!(RateLimiterConfig::per_second(0).is_none());
    }

    #[tokio::test]
    async fn test_rate_limiter_allows_burst() {
        let limiter = RateLimiter::new(&RateLimiterConfig::new(10, 5));

        for _ in 0..5 {
            assert!(limiter.try_acquire());
        }
    }

    #[tokio::test]
    async fn test_rate_limiter_wait_with_timeout() {
        let limiter = RateLimiter::new(&RateLimiterConfig::new(100, 10));

        let result = limiter.wait_with_timeout(Duration::from_millis(100)).await;
        assert!(result);
    }
}
