//! Application state - shared across all handlers.

use std::sync::Arc;

use quill_core::ports::{
    CommentRepository, PasswordService, PostRepository, ProfileRepository, RateLimiter,
    TokenService, UserRepository,
};
use quill_infra::{Argon2PasswordService, InMemoryDatabase, JwtConfig, JwtTokenService};

use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub tokens: Arc<dyn TokenService>,
    pub passwords: Arc<dyn PasswordService>,
    /// Throttles comment submission per client; `None` disables throttling.
    pub comment_limiter: Option<Arc<dyn RateLimiter>>,
    /// Key throttling on proxy headers instead of the socket peer.
    pub trust_proxy_headers: bool,
    /// Which storage backend is serving requests, reported by the health check.
    pub storage: &'static str,
}

/// The four repositories, backed by one store.
struct Repositories {
    users: Arc<dyn UserRepository>,
    profiles: Arc<dyn ProfileRepository>,
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    storage: &'static str,
}

impl Repositories {
    fn in_memory() -> Self {
        let db = InMemoryDatabase::new();
        Self {
            users: Arc::new(db.users()),
            profiles: Arc::new(db.profiles()),
            posts: Arc::new(db.posts()),
            comments: Arc::new(db.comments()),
            storage: "memory",
        }
    }

    #[cfg(feature = "postgres")]
    async fn connect(config: &AppConfig) -> Self {
        use migration::{Migrator, MigratorTrait};
        use quill_infra::DatabaseConnections;
        use quill_infra::database::{
            PostgresCommentRepository, PostgresPostRepository, PostgresProfileRepository,
            PostgresUserRepository,
        };

        let Some(db_config) = config.database.as_ref() else {
            tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
            return Self::in_memory();
        };

        let connections = match DatabaseConnections::init(db_config).await {
            Ok(connections) => connections,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Failed to connect to database. Using in-memory fallback."
                );
                return Self::in_memory();
            }
        };

        if config.run_migrations {
            match Migrator::up(&connections.main, None).await {
                Ok(()) => tracing::info!("Database migrations applied"),
                Err(e) => tracing::error!(error = %e, "Failed to apply database migrations"),
            }
        }

        let db = connections.main;
        Self {
            users: Arc::new(PostgresUserRepository::new(db.clone())),
            profiles: Arc::new(PostgresProfileRepository::new(db.clone())),
            posts: Arc::new(PostgresPostRepository::new(db.clone())),
            comments: Arc::new(PostgresCommentRepository::new(db)),
            storage: "postgres",
        }
    }

    #[cfg(not(feature = "postgres"))]
    async fn connect(_config: &AppConfig) -> Self {
        tracing::info!("Running without postgres feature - using in-memory repositories");
        Self::in_memory()
    }
}

#[cfg(feature = "rate-limit")]
fn comment_limiter(config: &AppConfig) -> Option<Arc<dyn RateLimiter>> {
    use quill_infra::InMemoryRateLimiter;

    match InMemoryRateLimiter::new(config.comment_rate_limit.clone()) {
        Ok(limiter) => Some(Arc::new(limiter)),
        Err(e) => {
            tracing::error!(error = %e, "Comment rate limiting disabled");
            None
        }
    }
}

#[cfg(not(feature = "rate-limit"))]
fn comment_limiter(_config: &AppConfig) -> Option<Arc<dyn RateLimiter>> {
    None
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> Self {
        let repos = Repositories::connect(config).await;
        let mut state = Self::assemble(repos, config.jwt.clone(), comment_limiter(config));
        state.trust_proxy_headers = config.trust_proxy_headers;

        tracing::info!(storage = state.storage, "Application state initialized");
        state
    }

    /// State over fresh in-memory storage.
    pub fn in_memory(jwt: JwtConfig, comment_limiter: Option<Arc<dyn RateLimiter>>) -> Self {
        Self::assemble(Repositories::in_memory(), jwt, comment_limiter)
    }

    fn assemble(
        repos: Repositories,
        jwt: JwtConfig,
        comment_limiter: Option<Arc<dyn RateLimiter>>,
    ) -> Self {
        Self {
            users: repos.users,
            profiles: repos.profiles,
            posts: repos.posts,
            comments: repos.comments,
            tokens: Arc::new(JwtTokenService::new(jwt)),
            passwords: Arc::new(Argon2PasswordService::new()),
            comment_limiter,
            trust_proxy_headers: false,
            storage: repos.storage,
        }
    }
}
