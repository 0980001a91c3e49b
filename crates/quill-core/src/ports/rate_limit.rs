//! Rate limiting port.

use async_trait::async_trait;
use std::time::Duration;

/// Throttles actions per client key (e.g. comment submissions per IP).
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Record one attempt for `key` and report whether it may proceed.
    async fn check(&self, key: &str) -> Result<RateLimitResult, RateLimitError>;
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// How long the caller should wait before retrying when not allowed.
    pub retry_after: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Invalid rate limit configuration: {0}")]
    InvalidConfig(String),
}
