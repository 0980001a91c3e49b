//! Post handlers: public listing and detail, authoring, the author's own posts.

use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use quill_core::domain::{PageRequest, Post};
use quill_core::ports::BaseRepository;
use quill_shared::ApiResponse;
use quill_shared::dto::{
    AuthorSummary, CommentResponse, PageResponse, PostDetailResponse, PostResponse,
};
use quill_shared::forms::PostForm;

use super::{POSTS_URL_PREFIX, PageQuery, page_number, users_by_id};
use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// Posts per page on the public listing.
const LIST_PAGE_SIZE: u64 = 5;

/// Posts per page on the author's own listing.
const MINE_PAGE_SIZE: u64 = 10;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub page: Option<String>,
}

/// `/{year}/{month}/{day}/{slug}` path segments.
#[derive(Debug, Deserialize)]
pub struct DatePath {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub slug: String,
}

impl DatePath {
    /// `None` for an impossible calendar date; the lookup then goes by slug alone.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

fn author_of(identity: &Identity) -> AuthorSummary {
    AuthorSummary {
        id: identity.user_id,
        username: identity.username.clone(),
    }
}

/// Published post addressed by date and slug, or 404.
pub(crate) async fn published_post(state: &AppState, path: &DatePath) -> AppResult<Post> {
    state
        .posts
        .find_published(path.date(), &path.slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No published post '{}'", path.slug)))
}

/// Load a post for modification by `identity`; fails before any change when
/// the requester is not the author.
async fn owned_post(state: &AppState, identity: &Identity, id: Uuid) -> AppResult<Post> {
    let post = state
        .posts
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post with id {id} not found")))?;

    if let Err(e) = post.ensure_authored_by(identity.user_id) {
        tracing::warn!(post_id = %id, user_id = %identity.user_id, "Denied post modification");
        return Err(e.into());
    }

    Ok(post)
}

/// GET /api/posts?search=&page=
pub async fn list(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let search = query.search.unwrap_or_default();
    let request = PageRequest::new(page_number(query.page.as_deref()), LIST_PAGE_SIZE);

    let page = state
        .posts
        .list_published(Some(search.as_str()), request)
        .await?;

    let authors = users_by_id(&state, page.items.iter().map(|p| p.author_id)).await?;
    let page = page.map(|post| {
        let author = authors
            .get(&post.author_id)
            .map(AuthorSummary::from)
            .unwrap_or_else(|| AuthorSummary {
                id: post.author_id,
                username: String::new(),
            });
        PostResponse::new(post, author, POSTS_URL_PREFIX)
    });

    Ok(HttpResponse::Ok().json(PageResponse::from(page).with_search(search.trim())))
}

/// GET /api/posts/{year}/{month}/{day}/{slug}
pub async fn detail(
    state: web::Data<AppState>,
    path: web::Path<DatePath>,
) -> AppResult<HttpResponse> {
    let post = published_post(&state, &path).await?;
    let comments = state.comments.find_active_by_post(post.id).await?;

    let users = users_by_id(
        &state,
        comments
            .iter()
            .filter_map(|c| c.author_id)
            .chain(std::iter::once(post.author_id)),
    )
    .await?;

    let author = users
        .get(&post.author_id)
        .map(AuthorSummary::from)
        .ok_or_else(|| AppError::Internal(format!("Author of post {} is missing", post.id)))?;

    let comments = comments
        .into_iter()
        .map(|comment| {
            let username = comment
                .author_id
                .and_then(|id| users.get(&id))
                .map(|u| u.username.as_str());
            CommentResponse::new(comment, username)
        })
        .collect();

    Ok(HttpResponse::Ok().json(PostDetailResponse {
        post: PostResponse::new(post, author, POSTS_URL_PREFIX),
        comments,
    }))
}

/// POST /api/posts
pub async fn create(
    identity: Identity,
    state: web::Data<AppState>,
    body: web::Json<PostForm>,
) -> AppResult<HttpResponse> {
    let form = body.into_inner();
    form.validate()?;

    let post = Post::new(identity.user_id, form.title, form.content, form.status);
    let post = state.posts.insert_with_unique_slug(post).await?;
    tracing::info!(post_id = %post.id, slug = %post.slug, "Post created");

    Ok(HttpResponse::Created().json(ApiResponse::ok_with_message(
        PostResponse::new(post, author_of(&identity), POSTS_URL_PREFIX),
        "Your post has been created successfully!",
    )))
}

/// PUT /api/posts/{id} - author only.
pub async fn update(
    identity: Identity,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<PostForm>,
) -> AppResult<HttpResponse> {
    let mut post = owned_post(&state, &identity, path.into_inner()).await?;

    let form = body.into_inner();
    form.validate()?;

    post.edit(form.title, form.content, form.status);
    let post = state.posts.save(post).await?;
    tracing::info!(post_id = %post.id, "Post updated");

    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(
        PostResponse::new(post, author_of(&identity), POSTS_URL_PREFIX),
        "Your post has been updated successfully!",
    )))
}

/// DELETE /api/posts/{id} - author only.
pub async fn delete(
    identity: Identity,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let post = owned_post(&state, &identity, path.into_inner()).await?;

    state.posts.delete(post.id).await?;
    tracing::info!(post_id = %post.id, "Post deleted");

    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(
        post.id,
        "Your post has been deleted successfully!",
    )))
}

/// GET /api/posts/mine?page= - drafts included.
pub async fn mine(
    identity: Identity,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let request = PageRequest::new(query.number(), MINE_PAGE_SIZE);
    let page = state.posts.find_by_author(identity.user_id, request).await?;

    let author = author_of(&identity);
    let page = page.map(|post| PostResponse::new(post, author.clone(), POSTS_URL_PREFIX));

    Ok(HttpResponse::Ok().json(PageResponse::from(page)))
}
