use crate::domain::IdentityPayload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Approves and edits any blog
    Admin,
    /// Writes drafts
    Author,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    /// Users created before roles existed have none; they are treated as unprivileged.
    #[serde(default)]
    pub role: Option<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, password_hash: String, role: Option<Role>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            password_hash,
            role,
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    /// The identity carried in sessions, caches and tokens for this user.
    pub fn identity(&self) -> IdentityPayload {
        IdentityPayload::new(self.id.clone(), self.username.clone())
    }
}
