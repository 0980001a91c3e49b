//! In-memory keyed rate limiter using the governor crate.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota};

use quill_core::ports::{RateLimitError, RateLimitResult, RateLimiter};

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// Read `COMMENT_RATE_LIMIT_MAX` and `COMMENT_RATE_LIMIT_WINDOW_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_requests: std::env::var("COMMENT_RATE_LIMIT_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_requests),
            window: std::env::var("COMMENT_RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.window),
        }
    }

    fn quota(&self) -> Result<Quota, RateLimitError> {
        let burst = NonZeroU32::new(self.max_requests)
            .ok_or_else(|| RateLimitError::InvalidConfig("max_requests must be > 0".into()))?;

        Quota::with_period(self.window / self.max_requests)
            .map(|q| q.allow_burst(burst))
            .ok_or_else(|| RateLimitError::InvalidConfig("window must be > 0".into()))
    }
}

/// Per-key limiter using the GCRA algorithm: a burst of `max_requests`,
/// refilled evenly over `window`.
///
/// Limits are per-process, not shared across instances.
pub struct InMemoryRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    clock: DefaultClock,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Result<Self, RateLimitError> {
        let quota = config.quota()?;
        tracing::debug!(
            max_requests = config.max_requests,
            window_secs = config.window.as_secs(),
            "Rate limiter configured"
        );

        Ok(Self {
            limiter: DefaultKeyedRateLimiter::keyed(quota),
            clock: DefaultClock::default(),
        })
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &str) -> Result<RateLimitResult, RateLimitError> {
        let result = match self.limiter.check_key(&key.to_string()) {
            Ok(()) => RateLimitResult {
                allowed: true,
                retry_after: Duration::ZERO,
            },
            Err(not_until) => RateLimitResult {
                allowed: false,
                retry_after: not_until.wait_time_from(self.clock.now()),
            },
        };

        // Drop keys whose state has fully recovered.
        self.limiter.retain_recent();

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32) -> InMemoryRateLimiter {
        InMemoryRateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_blocks_after_burst() {
        let limiter = limiter(2);

        assert!(limiter.check("10.0.0.1").await.unwrap().allowed);
        assert!(limiter.check("10.0.0.1").await.unwrap().allowed);

        let blocked = limiter.check("10.0.0.1").await.unwrap();
        assert!(!blocked.allowed);
        assert!(blocked.retry_after > Duration::ZERO);
        assert!(blocked.retry_after <= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = limiter(1);

        assert!(limiter.check("10.0.0.1").await.unwrap().allowed);
        assert!(!limiter.check("10.0.0.1").await.unwrap().allowed);
        assert!(limiter.check("10.0.0.2").await.unwrap().allowed);
    }

    #[test]
    fn test_rejects_zero_quota() {
        let zero_max = InMemoryRateLimiter::new(RateLimitConfig {
            max_requests: 0,
            window: Duration::from_secs(60),
        });
        assert!(matches!(zero_max, Err(RateLimitError::InvalidConfig(_))));

        let zero_window = InMemoryRateLimiter::new(RateLimitConfig {
            max_requests: 3,
            window: Duration::ZERO,
        });
        assert!(matches!(zero_window, Err(RateLimitError::InvalidConfig(_))));
    }
}
