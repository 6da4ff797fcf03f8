//! Sign Out Use Case
//!
//! Single-session logout by refresh token, and logout everywhere.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::repository::{SessionRepository, UserRepository};
use crate::domain::value_object::{UserId, refresh_token::RefreshToken};
use crate::error::AuthResult;

/// Sign out use case
pub struct SignOutUseCase<R>
where
    R: UserRepository + SessionRepository,
{
    repo: Arc<R>,
}

impl<R> SignOutUseCase<R>
where
    R: UserRepository + SessionRepository,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Idempotent. A malformed token or unknown session is a silent success;
    /// a found session is revoked even when the secret is stale.
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        let Ok(token) = RefreshToken::parse(refresh_token) else {
            return Ok(());
        };
        let session_id = token.session_id();

        let Some(session) = self.repo.find_session(&session_id).await? else {
            return Ok(());
        };
        if !token.secret().matches(&session.rotation_secret_hash) {
            tracing::warn!(
                session_id = %session_id,
                user_id = %session.user_id,
                "Logout with stale refresh secret"
            );
        }

        if self.repo.revoke_session(&session_id, Utc::now()).await? {
            tracing::info!(user_id = %session.user_id, session_id = %session_id, "User signed out");
        }
        Ok(())
    }

    /// Revokes every active session and bumps the ASV in one store
    /// operation, so no access token issued before it still verifies.
    /// Returns the number of sessions revoked.
    pub async fn logout_all(&self, user_id: &UserId) -> AuthResult<u64> {
        let (revoked, asv) = self.repo.reset_auth_state(user_id, None, Utc::now()).await?;

        tracing::info!(
            user_id = %user_id,
            asv = asv,
            sessions_revoked = revoked,
            "User signed out everywhere"
        );
        Ok(revoked)
    }
}
