//! Session Management Use Case
//!
//! Lets an authenticated user see and revoke their own sessions.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::entity::auth_session::AuthSession;
use crate::domain::repository::SessionRepository;
use crate::domain::value_object::{SessionId, UserId};
use crate::error::{AuthError, AuthResult};

pub struct ManageSessionsUseCase<R>
where
    R: SessionRepository,
{
    repo: Arc<R>,
}

impl<R> ManageSessionsUseCase<R>
where
    R: SessionRepository,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Newest first, all statuses
    pub async fn list(&self, user_id: &UserId) -> AuthResult<Vec<AuthSession>> {
        self.repo.find_sessions_by_user(user_id).await
    }

    /// `NotFound` for sessions owned by someone else, so ids cannot be enumerated
    pub async fn revoke(&self, user_id: &UserId, session_id: &SessionId) -> AuthResult<()> {
        let session = self
            .repo
            .find_session(session_id)
            .await?
            .filter(|s| &s.user_id == user_id)
            .ok_or(AuthError::NotFound("Session"))?;

        if self.repo.revoke_session(&session.session_id, Utc::now()).await? {
            tracing::info!(user_id = %user_id, session_id = %session_id, "Session revoked by owner");
        }
        Ok(())
    }
}
