//! Session Issuer
//!
//! The one path that turns an authenticated user into a token pair: pick
//! the application context, open a refresh session, resolve authority and
//! sign an access token stamped with the current ASV.

use std::sync::Arc;

use platform::client::ClientInfo;

use crate::application::config::AuthConfig;
use crate::application::resolve_permissions::PermissionResolver;
use crate::application::token::{TokenPair, TokenService};
use crate::domain::entity::{application::Application, auth_session::AuthSession, user::User};
use crate::domain::repository::{ApplicationRepository, GrantRepository, SessionRepository};
use crate::domain::value_object::{
    SessionId,
    app_code::AppCode,
    refresh_token::{RefreshToken, RotationSecret},
};
use crate::error::AuthResult;

pub struct SessionIssuer<R>
where
    R: SessionRepository + GrantRepository + ApplicationRepository,
{
    repo: Arc<R>,
    tokens: Arc<TokenService>,
    resolver: PermissionResolver<R>,
    config: Arc<AuthConfig>,
}

impl<R> SessionIssuer<R>
where
    R: SessionRepository + GrantRepository + ApplicationRepository,
{
    pub fn new(repo: Arc<R>, tokens: Arc<TokenService>, config: Arc<AuthConfig>) -> Self {
        Self {
            resolver: PermissionResolver::new(repo.clone()),
            repo,
            tokens,
            config,
        }
    }

    /// Unknown or blank codes yield no application context rather than an
    /// error
    pub async fn find_application(&self, requested: Option<&str>) -> AuthResult<Option<Application>> {
        let Some(code) = AppCode::normalize(requested, &self.config.default_app_code) else {
            return Ok(None);
        };

        let application = self.repo.find_application_by_code(code.as_str()).await?;
        if application.is_none() {
            tracing::debug!(app_code = %code, "Login for unknown application");
        }
        Ok(application)
    }

    pub async fn open_session(
        &self,
        user: &User,
        client: &ClientInfo,
        requested_app: Option<&str>,
    ) -> AuthResult<TokenPair> {
        let application = self.find_application(requested_app).await?;

        let secret = RotationSecret::generate();
        let session = AuthSession::new(
            user.user_id,
            secret.hash(),
            client,
            application.as_ref().map(|a| a.application_id),
            self.config.refresh_token_ttl_chrono(),
        );
        self.repo.insert_session(&session).await?;

        let access_token = self
            .access_token_for(user, &session.session_id, application.as_ref())
            .await?;

        tracing::info!(
            user_id = %user.user_id,
            session_id = %session.session_id,
            app = application.as_ref().map(|a| a.code.as_str()).unwrap_or("-"),
            "Session opened"
        );

        Ok(TokenPair {
            access_token,
            refresh_token: RefreshToken::new(session.session_id, secret).encode(),
            expires_in: self.tokens.access_ttl_secs(),
        })
    }

    /// Resolves authority as of now; role changes show up here without an
    /// ASV bump
    pub async fn access_token_for(
        &self,
        user: &User,
        session_id: &SessionId,
        application: Option<&Application>,
    ) -> AuthResult<String> {
        let app_code = application.and_then(|a| AppCode::normalize(Some(&a.code), ""));
        let authority = self.resolver.resolve(&user.user_id, app_code.as_ref()).await?;
        self.tokens
            .issue_access_token(user, session_id, &authority, app_code.as_ref())
    }
}
