use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Comment entity - left on a post by a user or an anonymous guest.
///
/// Inactive comments are hidden from readers until a moderator activates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub text: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Comment written by an authenticated user.
    pub fn by_user(post_id: Uuid, author_id: Uuid, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            post_id,
            author_id: Some(author_id),
            guest_name: None,
            guest_email: None,
            text,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Comment attributed to a guest name/email pair.
    pub fn by_guest(
        post_id: Uuid,
        guest_name: Option<String>,
        guest_email: Option<String>,
        text: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            post_id,
            author_id: None,
            guest_name,
            guest_email,
            text,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Name shown next to the comment: the author's username, else the guest name.
    pub fn display_name<'a>(&'a self, author_username: Option<&'a str>) -> &'a str {
        author_username
            .or(self.guest_name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or("Anonymous")
    }
}
