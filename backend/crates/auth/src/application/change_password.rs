//! Change Password Use Case
//!
//! Replaces the password hash after checking the current one. The new hash,
//! the session revocation and the ASV bump land together or not at all.

use std::sync::Arc;

use chrono::Utc;

use crate::application::config::AuthConfig;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{
    UserId,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

pub struct ChangePasswordUseCase<R>
where
    R: UserRepository,
{
    repo: Arc<R>,
    config: Arc<AuthConfig>,
}

impl<R> ChangePasswordUseCase<R>
where
    R: UserRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>) -> Self {
        Self { repo, config }
    }

    /// Returns the number of sessions revoked
    pub async fn execute(&self, user_id: &UserId, input: ChangePasswordInput) -> AuthResult<u64> {
        let user = self
            .repo
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredential)?;

        let current =
            RawPassword::new(input.current_password).map_err(|_| AuthError::InvalidCredential)?;
        if !user.password.verify(&current, self.config.pepper()) {
            tracing::warn!(user_id = %user_id, "Password change with wrong current password");
            return Err(AuthError::InvalidCredential);
        }

        let new_password = RawPassword::new(input.new_password)?;
        let hashed = UserPassword::from_raw(&new_password, self.config.pepper())?;
        let (revoked, asv) = self
            .repo
            .reset_auth_state(user_id, Some(&hashed), Utc::now())
            .await?;

        tracing::info!(
            user_id = %user_id,
            asv = asv,
            sessions_revoked = revoked,
            "Password changed"
        );
        Ok(revoked)
    }
}
