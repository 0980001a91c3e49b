use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::slug::slugify;
use crate::error::DomainError;

/// Publication state of a post. Only published posts are publicly visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    #[default]
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            other => Err(DomainError::Validation(format!(
                "unknown post status '{other}'"
            ))),
        }
    }
}

/// Post entity - a blog article addressed by publication date and slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub status: PostStatus,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new post published "now", with the slug derived from the title.
    pub fn new(author_id: Uuid, title: String, content: String, status: PostStatus) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            author_id,
            slug: slugify(&title),
            title,
            content,
            status,
            published_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    /// Calendar day (UTC) the post is addressed under.
    pub fn published_date(&self) -> NaiveDate {
        self.published_at.date_naive()
    }

    /// `year/month/day/slug` path segment used in post URLs.
    pub fn date_path(&self) -> String {
        let d = self.published_date();
        format!("{}/{}/{}/{}", d.year(), d.month(), d.day(), self.slug)
    }

    /// Case-insensitive substring match over title and content.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle) || self.content.to_lowercase().contains(&needle)
    }

    /// Only the author may edit or delete a post.
    pub fn ensure_authored_by(&self, user_id: Uuid) -> Result<(), DomainError> {
        if self.author_id == user_id {
            Ok(())
        } else {
            Err(DomainError::Forbidden("only the author may modify this post"))
        }
    }

    /// Apply an edit. The slug stays stable so existing links keep working.
    pub fn edit(&mut self, title: String, content: String, status: PostStatus) {
        self.title = title;
        self.content = content;
        self.status = status;
        self.updated_at = Utc::now();
    }
}
