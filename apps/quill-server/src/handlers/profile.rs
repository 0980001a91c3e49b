//! Profile handlers.

use actix_web::{HttpResponse, web};
use validator::Validate;

use quill_core::domain::{Profile, User};
use quill_core::ports::BaseRepository;
use quill_shared::ApiResponse;
use quill_shared::dto::ProfileResponse;
use quill_shared::forms::ProfileForm;

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

async fn current_user(state: &AppState, identity: &Identity) -> AppResult<User> {
    state
        .users
        .find_by_id(identity.user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// GET /api/profile - creates the profile on first access.
pub async fn show(identity: Identity, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let user = current_user(&state, &identity).await?;
    let profile = state.profiles.get_or_create(user.id).await?;

    Ok(HttpResponse::Ok().json(ProfileResponse::new(user, profile)))
}

/// PUT /api/profile - updates the user and profile rows together.
pub async fn update(
    identity: Identity,
    state: web::Data<AppState>,
    body: web::Json<ProfileForm>,
) -> AppResult<HttpResponse> {
    let form = body.into_inner();
    form.validate()?;

    let mut user = current_user(&state, &identity).await?;

    if let Some(other) = state.users.find_by_email(&form.email).await? {
        if other.id != user.id {
            return Err(AppError::Conflict(
                "A user with that email already exists.".to_string(),
            ));
        }
    }

    // A missing profile row is inserted in the same transaction as the user update
    let mut profile = state
        .profiles
        .find_by_user_id(user.id)
        .await?
        .unwrap_or_else(|| Profile::new(user.id));

    user.rename(form.first_name, form.last_name, form.email);
    profile.edit(form.bio, form.avatar_url);

    let (user, profile) = state.users.save_with_profile(user, profile).await?;
    tracing::info!(user_id = %user.id, "Profile updated");

    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(
        ProfileResponse::new(user, profile),
        "Your profile was updated successfully!",
    )))
}
