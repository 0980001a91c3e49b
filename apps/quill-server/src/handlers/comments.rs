//! Comment handlers: submission by readers, moderation by staff.

use actix_web::{HttpResponse, web};
use uuid::Uuid;
use validator::Validate;

use quill_core::domain::Comment;
use quill_core::ports::BaseRepository;
use quill_shared::ApiResponse;
use quill_shared::dto::{
    ApproveCommentsRequest, CommentResponse, ModerateCommentRequest, ModerationResponse,
};
use quill_shared::forms::CommentForm;

use super::posts::{DatePath, published_post};
use crate::middleware::auth::{Identity, OptionalIdentity};
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// Moderation is reserved to staff; the flag is read from storage, not the token.
async fn require_staff(state: &AppState, identity: &Identity) -> AppResult<()> {
    let user = state
        .users
        .find_by_id(identity.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    user.ensure_staff().map_err(|e| {
        tracing::warn!(user_id = %user.id, "Denied comment moderation");
        e.into()
    })
}

/// POST /api/posts/{year}/{month}/{day}/{slug}/comments
pub async fn submit(
    identity: OptionalIdentity,
    state: web::Data<AppState>,
    path: web::Path<DatePath>,
    body: web::Json<CommentForm>,
) -> AppResult<HttpResponse> {
    let post = published_post(&state, &path).await?;

    let OptionalIdentity(identity) = identity;
    let form = body.into_inner().for_requester(identity.is_some());
    form.validate()?;

    let comment = match &identity {
        Some(identity) => Comment::by_user(post.id, identity.user_id, form.text),
        None => Comment::by_guest(post.id, form.guest_name, form.guest_email, form.text),
    };
    let comment = state.comments.save(comment).await?;

    tracing::info!(
        comment_id = %comment.id,
        post_id = %post.id,
        guest = identity.is_none(),
        "Comment added"
    );

    let username = identity.as_ref().map(|i| i.username.as_str());
    Ok(HttpResponse::Created().json(ApiResponse::ok_with_message(
        CommentResponse::new(comment, username),
        "Your comment has been added successfully!",
    )))
}

/// PATCH /api/comments/{id} - staff only.
pub async fn moderate(
    identity: Identity,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<ModerateCommentRequest>,
) -> AppResult<HttpResponse> {
    require_staff(&state, &identity).await?;

    let id = path.into_inner();
    if state.comments.find_by_id(id).await?.is_none() {
        return Err(AppError::NotFound(format!("Comment with id {id} not found")));
    }

    let updated = state.comments.set_active(&[id], body.active).await?;
    tracing::info!(comment_id = %id, active = body.active, moderator = %identity.username, "Comment moderated");

    Ok(HttpResponse::Ok().json(ModerationResponse { updated }))
}

/// POST /api/comments/approve - staff only; activates every listed comment.
pub async fn approve(
    identity: Identity,
    state: web::Data<AppState>,
    body: web::Json<ApproveCommentsRequest>,
) -> AppResult<HttpResponse> {
    require_staff(&state, &identity).await?;

    let updated = state.comments.set_active(&body.ids, true).await?;
    tracing::info!(requested = body.ids.len(), updated, moderator = %identity.username, "Comments approved");

    Ok(HttpResponse::Ok().json(ModerationResponse { updated }))
}
