use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Role every authenticated account carries.
pub const ROLE_USER: &str = "user";

/// Role granted to staff accounts; allows comment moderation.
pub const ROLE_MODERATOR: &str = "moderator";

/// User entity - an account that can author posts and comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with generated ID and timestamps.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            first_name: String::new(),
            last_name: String::new(),
            is_staff: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Roles embedded in access tokens issued for this user.
    pub fn roles(&self) -> Vec<String> {
        let mut roles = vec![ROLE_USER.to_string()];
        if self.is_staff {
            roles.push(ROLE_MODERATOR.to_string());
        }
        roles
    }

    /// Overwrite the editable account fields.
    pub fn rename(&mut self, first_name: String, last_name: String, email: String) {
        self.first_name = first_name;
        self.last_name = last_name;
        self.email = email;
        self.updated_at = Utc::now();
    }

    pub fn ensure_staff(&self) -> Result<(), DomainError> {
        if self.is_staff {
            Ok(())
        } else {
            Err(DomainError::Forbidden("moderator role required"))
        }
    }
}
