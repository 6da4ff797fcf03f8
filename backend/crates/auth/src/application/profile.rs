//! Profile Use Case
//!
//! Read and edit the caller's own account details.

use std::sync::Arc;

use crate::domain::entity::user::User;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::UserId;
use crate::error::{AuthError, AuthResult};

pub const MAX_FULL_NAME_LEN: usize = 200;

pub struct ProfileUseCase<R>
where
    R: UserRepository,
{
    repo: Arc<R>,
}

impl<R> ProfileUseCase<R>
where
    R: UserRepository,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn get(&self, user_id: &UserId) -> AuthResult<User> {
        self.repo
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound("User"))
    }

    /// `None` leaves the name untouched; a blank name clears it
    pub async fn update(&self, user_id: &UserId, full_name: Option<String>) -> AuthResult<User> {
        let Some(full_name) = full_name else {
            return self.get(user_id).await;
        };

        let full_name = full_name.trim();
        if full_name.chars().count() > MAX_FULL_NAME_LEN {
            return Err(AuthError::Validation(format!(
                "Full name must be at most {MAX_FULL_NAME_LEN} characters"
            )));
        }

        let full_name = (!full_name.is_empty()).then_some(full_name);
        self.repo.update_full_name(user_id, full_name).await?;
        tracing::info!(user_id = %user_id, "Profile updated");

        self.get(user_id).await
    }
}
