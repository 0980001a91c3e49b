//! HTTP handlers and route configuration.

mod auth;
mod comments;
mod health;
mod posts;
mod profile;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use actix_web::web;
use serde::Deserialize;
use uuid::Uuid;

use quill_core::domain::User;

use crate::middleware::error::{AppResult, json_config};
use crate::middleware::rate_limit::RateLimitMiddleware;
use crate::state::AppState;

/// Prefix of canonical post URLs handed to clients.
pub(crate) const POSTS_URL_PREFIX: &str = "/api/posts";

/// `?page=` as sent by the client.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn number(&self) -> Option<u64> {
        page_number(self.page.as_deref())
    }
}

/// Non-integers mean the first page. Integers below 1 are out of range and,
/// like pages past the end, land on the last page.
pub(crate) fn page_number(raw: Option<&str>) -> Option<u64> {
    let number: i64 = raw?.trim().parse().ok()?;
    Some(u64::try_from(number).unwrap_or(0))
}

/// Load the users behind `ids` in one query, keyed by id.
pub(crate) async fn users_by_id(
    state: &AppState,
    ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<HashMap<Uuid, User>> {
    let mut ids: Vec<Uuid> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();

    let users = state.users.find_by_ids(&ids).await?;
    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config()).service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            // Auth routes
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(auth::signup))
                    .route("/login", web::post().to(auth::login))
                    .route("/me", web::get().to(auth::me)),
            )
            .service(
                web::resource("/profile")
                    .route(web::get().to(profile::show))
                    .route(web::put().to(profile::update)),
            )
            .service(
                web::scope("/posts")
                    .service(
                        web::resource("")
                            .route(web::get().to(posts::list))
                            .route(web::post().to(posts::create)),
                    )
                    // Registered before `/{id}` so "mine" is not taken for an id
                    .route("/mine", web::get().to(posts::mine))
                    .route("/{year}/{month}/{day}/{slug}", web::get().to(posts::detail))
                    .service(
                        web::resource("/{year}/{month}/{day}/{slug}/comments")
                            .wrap(RateLimitMiddleware)
                            .route(web::post().to(comments::submit)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(posts::update))
                            .route(web::delete().to(posts::delete)),
                    ),
            )
            .service(
                web::scope("/comments")
                    .route("/approve", web::post().to(comments::approve))
                    .route("/{id}", web::patch().to(comments::moderate)),
            ),
    );
}
