//! Account handlers: sign up, log in, current identity.

use actix_web::{HttpResponse, web};
use serde::Serialize;
use validator::Validate;

use quill_core::domain::User;
use quill_core::ports::BaseRepository;
use quill_shared::ApiResponse;
use quill_shared::dto::{AuthResponse, UserResponse};
use quill_shared::forms::{LoginForm, SignupForm};

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn issue_token(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let token = state
        .tokens
        .generate_token(user.id, &user.username, user.roles())?;

    Ok(AuthResponse::bearer(
        token,
        state.tokens.expiration_seconds().max(0) as u64,
    ))
}

/// POST /api/auth/signup
pub async fn signup(
    state: web::Data<AppState>,
    body: web::Json<SignupForm>,
) -> AppResult<HttpResponse> {
    let form = body.into_inner();
    form.validate()?;

    if state.users.find_by_username(&form.username).await?.is_some() {
        return Err(AppError::Conflict(
            "A user with that username already exists.".to_string(),
        ));
    }
    if state.users.find_by_email(&form.email).await?.is_some() {
        return Err(AppError::Conflict(
            "A user with that email already exists.".to_string(),
        ));
    }

    let password_hash = state.passwords.hash(&form.password)?;
    let user = state
        .users
        .save(User::new(form.username, form.email, password_hash))
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User signed up");

    let auth = issue_token(&state, &user)?;
    Ok(HttpResponse::Created().json(ApiResponse::ok_with_message(
        auth,
        "Account created successfully! Welcome to the blog!",
    )))
}

/// POST /api/auth/login
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginForm>,
) -> AppResult<HttpResponse> {
    let form = body.into_inner();
    form.validate()?;

    let user = state
        .users
        .find_by_username(&form.username)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !state.passwords.verify(&form.password, &user.password_hash)? {
        tracing::debug!(username = %form.username, "Login rejected");
        return Err(AppError::Unauthorized);
    }

    Ok(HttpResponse::Ok().json(issue_token(&state, &user)?))
}

#[derive(Serialize)]
struct MeResponse {
    #[serde(flatten)]
    user: UserResponse,
    roles: Vec<String>,
}

/// GET /api/auth/me - Protected route
pub async fn me(identity: Identity, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    // The token may outlive the account
    let user = state
        .users
        .find_by_id(identity.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(HttpResponse::Ok().json(MeResponse {
        user: user.into(),
        roles: identity.roles,
    }))
}
