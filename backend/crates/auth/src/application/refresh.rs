//! Refresh Use Case
//!
//! Exchanges a refresh token for a new pair. The session keeps its id; the
//! secret is replaced with a compare-and-swap so exactly one of several
//! concurrent refreshes of the same secret can win.

use std::sync::Arc;

use chrono::Utc;
use platform::client::ClientInfo;

use crate::application::config::AuthConfig;
use crate::application::session_issuer::SessionIssuer;
use crate::application::token::{TokenPair, TokenService};
use crate::domain::entity::auth_session::SessionRotation;
use crate::domain::repository::{
    ApplicationRepository, GrantRepository, SessionRepository, UserRepository,
};
use crate::domain::value_object::refresh_token::{RefreshToken, RotationSecret};
use crate::error::{AuthError, AuthResult};

pub struct RefreshUseCase<R>
where
    R: UserRepository + SessionRepository + GrantRepository + ApplicationRepository,
{
    repo: Arc<R>,
    tokens: Arc<TokenService>,
    issuer: SessionIssuer<R>,
    config: Arc<AuthConfig>,
}

impl<R> RefreshUseCase<R>
where
    R: UserRepository + SessionRepository + GrantRepository + ApplicationRepository,
{
    pub fn new(repo: Arc<R>, tokens: Arc<TokenService>, config: Arc<AuthConfig>) -> Self {
        Self {
            issuer: SessionIssuer::new(repo.clone(), tokens.clone(), config.clone()),
            repo,
            tokens,
            config,
        }
    }

    pub async fn execute(&self, refresh_token: &str, client: &ClientInfo) -> AuthResult<TokenPair> {
        let token = RefreshToken::parse(refresh_token)?;
        let session_id = token.session_id();

        let Some(session) = self.repo.find_session(&session_id).await? else {
            tracing::debug!(session_id = %session_id, "Refresh for unknown session");
            return Err(AuthError::InvalidCredential);
        };

        if !session.is_active() {
            tracing::debug!(session_id = %session_id, status = %session.status, "Refresh for inactive session");
            return Err(AuthError::InvalidCredential);
        }

        let now = Utc::now();
        if session.is_expired_at(now) {
            self.repo.mark_session_expired(&session_id).await?;
            tracing::debug!(session_id = %session_id, "Refresh for expired session");
            return Err(AuthError::InvalidCredential);
        }

        if !token.secret().matches(&session.rotation_secret_hash) {
            tracing::warn!(
                session_id = %session_id,
                user_id = %session.user_id,
                "Refresh secret mismatch, possible token reuse"
            );
            if self.config.revoke_session_on_refresh_reuse {
                self.repo.revoke_session(&session_id, now).await?;
            }
            return Err(AuthError::InvalidCredential);
        }

        // Read before rotating, so a logout-all landing in between leaves
        // this token on the superseded ASV
        let user = self
            .repo
            .find_user_by_id(&session.user_id)
            .await?
            .ok_or(AuthError::InvalidCredential)?;

        let secret = RotationSecret::generate();
        let rotation = SessionRotation {
            session_id,
            expected_hash: session.rotation_secret_hash.clone(),
            new_hash: secret.hash(),
            expires_at: now + self.config.refresh_token_ttl_chrono(),
            ip_address: client.ip_string().or(session.ip_address.clone()),
            user_agent: client.user_agent.clone().or(session.user_agent.clone()),
            rotated_at: now,
        };

        if !self.repo.rotate_session(&rotation).await? {
            // Another refresh with the same secret got there first
            tracing::warn!(session_id = %session_id, "Concurrent refresh lost rotation race");
            return Err(AuthError::InvalidCredential);
        }

        let application = match session.application_id {
            Some(application_id) => self.repo.find_application_by_id(&application_id).await?,
            None => None,
        };
        let access_token = self
            .issuer
            .access_token_for(&user, &session_id, application.as_ref())
            .await?;

        tracing::info!(user_id = %user.user_id, session_id = %session_id, "Session refreshed");

        Ok(TokenPair {
            access_token,
            refresh_token: RefreshToken::new(session_id, secret).encode(),
            expires_in: self.tokens.access_ttl_secs(),
        })
    }
}
