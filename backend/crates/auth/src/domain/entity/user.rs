//! User Entity
//!
//! Identity, credential hash and the auth state version (ASV). The ASV is
//! embedded in every access token; bumping it invalidates all of them.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{UserId, email::Email, user_password::UserPassword};

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: UserId,
    /// Normalized, unique
    pub email: Email,
    pub password: UserPassword,
    pub full_name: Option<String>,
    /// Starts at 0, only ever incremented
    pub auth_state_version: i64,
    pub auth_state_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: Email, password: UserPassword, full_name: Option<String>) -> Self {
        let now = Utc::now();
        let full_name = full_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        Self {
            user_id: UserId::new(),
            email,
            password,
            full_name,
            auth_state_version: 0,
            auth_state_changed_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}
