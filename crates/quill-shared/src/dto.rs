//! Data Transfer Objects - response payloads and small request bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quill_core::domain::{Comment, Page, Post, PostStatus, Profile, User};

/// Response containing an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

impl AuthResponse {
    pub fn bearer(access_token: String, expires_in: u64) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

/// A user's account information, as shown to themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_staff: user.is_staff,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileResponse {
    pub fn new(user: User, profile: Profile) -> Self {
        Self {
            user: user.into(),
            bio: profile.bio,
            avatar_url: profile.avatar_url,
            updated_at: profile.updated_at,
        }
    }
}

/// Public view of a post's author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    /// Canonical date-addressed location of the post.
    pub url: String,
    pub author: AuthorSummary,
    pub content: String,
    pub status: PostStatus,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostResponse {
    pub fn new(post: Post, author: AuthorSummary, url_prefix: &str) -> Self {
        Self {
            url: format!("{url_prefix}/{}", post.date_path()),
            id: post.id,
            title: post.title,
            slug: post.slug,
            author,
            content: post.content,
            status: post.status,
            published_at: post.published_at,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub author_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl CommentResponse {
    pub fn new(comment: Comment, author_username: Option<&str>) -> Self {
        Self {
            author_name: comment.display_name(author_username).to_string(),
            id: comment.id,
            text: comment.text,
            created_at: comment.created_at,
        }
    }
}

/// Post detail page: the post and its visible comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetailResponse {
    pub post: PostResponse,
    pub comments: Vec<CommentResponse>,
}

/// A page of results with navigation hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
    /// Echo of the search query, empty when none was given.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub search: String,
}

impl<T> From<Page<T>> for PageResponse<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            has_next: page.has_next(),
            has_previous: page.has_previous(),
            items: page.items,
            page: page.page,
            per_page: page.per_page,
            total_items: page.total_items,
            total_pages: page.total_pages,
            search: String::new(),
        }
    }
}

impl<T> PageResponse<T> {
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }
}

/// Moderation toggle for a single comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerateCommentRequest {
    pub active: bool,
}

/// Bulk approval of comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveCommentsRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationResponse {
    pub updated: u64,
}
