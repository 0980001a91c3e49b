//! Application configuration loaded from environment variables.

use std::env;

use quill_infra::{DatabaseConfig, JwtConfig};

#[cfg(feature = "rate-limit")]
use quill_infra::RateLimitConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` when `DATABASE_URL` is unset: the server runs on in-memory storage.
    pub database: Option<DatabaseConfig>,
    /// Apply pending schema migrations before serving.
    pub run_migrations: bool,
    pub jwt: JwtConfig,
    /// Identify clients by `Forwarded`/`X-Forwarded-For`. Only safe behind a
    /// proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
    #[cfg(feature = "rate-limit")]
    pub comment_rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database = env::var("DATABASE_URL").ok().map(|url| DatabaseConfig {
            url,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        });

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database,
            run_migrations: env::var("RUN_MIGRATIONS")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            jwt: JwtConfig::from_env(),
            trust_proxy_headers: env::var("TRUST_PROXY_HEADERS")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            #[cfg(feature = "rate-limit")]
            comment_rate_limit: RateLimitConfig::from_env(),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
