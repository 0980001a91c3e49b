//! # Quill Infrastructure
//!
//! Concrete implementations of the ports defined in `quill-core`.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - In-memory repositories only
//! - `postgres` - PostgreSQL repositories via SeaORM
//! - `rate-limit` - Keyed rate limiting via governor

pub mod auth;
pub mod database;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

pub use auth::{Argon2PasswordService, JwtConfig, JwtTokenService};
pub use database::{DatabaseConfig, InMemoryDatabase};

#[cfg(feature = "postgres")]
pub use database::DatabaseConnections;

#[cfg(feature = "rate-limit")]
pub use rate_limit::{InMemoryRateLimiter, RateLimitConfig};
