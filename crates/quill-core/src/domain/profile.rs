use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Profile entity - one-to-one extension of a user, created on first access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Create an empty profile for a user.
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            bio: String::new(),
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn edit(&mut self, bio: String, avatar_url: Option<String>) {
        self.bio = bio;
        self.avatar_url = avatar_url;
        self.updated_at = Utc::now();
    }
}
