//! Sign In Use Case
//!
//! Password login and the TOTP step-up that completes it.

use std::sync::Arc;

use platform::client::ClientInfo;

use crate::application::config::AuthConfig;
use crate::application::session_issuer::SessionIssuer;
use crate::application::token::{TokenPair, TokenService};
use crate::application::totp_setup::TotpUseCase;
use crate::domain::entity::user::User;
use crate::domain::repository::{
    ApplicationRepository, GrantRepository, SecuritySettingRepository, SessionRepository,
    TotpCredentialRepository, UserRepository,
};
use crate::domain::value_object::{email::Email, user_password::RawPassword};
use crate::error::{AuthError, AuthResult};

/// Sign in input
pub struct SignInInput {
    pub email: String,
    pub password: String,
    /// Application context; blank means the configured default
    pub app_code: Option<String>,
}

/// Second step input
pub struct TotpSignInInput {
    /// Step-up token from the first step
    pub login_token: String,
    pub code: String,
    pub app_code: Option<String>,
}

/// Sign in output
#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated(TokenPair),
    /// No session was opened; complete with `login_with_totp`
    MfaRequired { login_token: String },
}

/// Sign in use case
pub struct SignInUseCase<R>
where
    R: UserRepository
        + SessionRepository
        + SecuritySettingRepository
        + TotpCredentialRepository
        + GrantRepository
        + ApplicationRepository,
{
    repo: Arc<R>,
    tokens: Arc<TokenService>,
    issuer: SessionIssuer<R>,
    totp: TotpUseCase<R>,
    config: Arc<AuthConfig>,
}

impl<R> SignInUseCase<R>
where
    R: UserRepository
        + SessionRepository
        + SecuritySettingRepository
        + TotpCredentialRepository
        + GrantRepository
        + ApplicationRepository,
{
    pub fn new(repo: Arc<R>, tokens: Arc<TokenService>, config: Arc<AuthConfig>) -> Self {
        Self {
            issuer: SessionIssuer::new(repo.clone(), tokens.clone(), config.clone()),
            totp: TotpUseCase::new(repo.clone(), config.clone()),
            repo,
            tokens,
            config,
        }
    }

    pub async fn login(&self, input: SignInInput, client: &ClientInfo) -> AuthResult<LoginOutcome> {
        let user = self.verify_password(&input.email, input.password).await?;

        if self.totp.requires_step_up(&user.user_id).await? {
            let login_token = self.tokens.issue_step_up_token(&user.user_id)?;
            tracing::info!(user_id = %user.user_id, "Password accepted, TOTP required");
            return Ok(LoginOutcome::MfaRequired { login_token });
        }

        let pair = self
            .issuer
            .open_session(&user, client, input.app_code.as_deref())
            .await?;

        tracing::info!(user_id = %user.user_id, "User signed in");
        Ok(LoginOutcome::Authenticated(pair))
    }

    pub async fn login_with_totp(
        &self,
        input: TotpSignInInput,
        client: &ClientInfo,
    ) -> AuthResult<TokenPair> {
        if !self.config.totp.enabled {
            return Err(AuthError::FeatureDisabled);
        }

        let user_id = self.tokens.verify_step_up_token(&input.login_token)?;
        let user = self
            .repo
            .find_user_by_id(&user_id)
            .await?
            .ok_or(AuthError::InvalidCredential)?;

        // MFA may have been turned off between the two steps
        if !self.totp.requires_step_up(&user.user_id).await? {
            return Err(AuthError::InvalidState(
                "Two-factor authentication is not required for this account".to_string(),
            ));
        }

        self.totp.verify_login_code(&user.user_id, &input.code).await?;

        let pair = self
            .issuer
            .open_session(&user, client, input.app_code.as_deref())
            .await?;

        tracing::info!(user_id = %user.user_id, "User signed in with TOTP");
        Ok(pair)
    }

    /// Unknown email, malformed email and wrong password are indistinguishable
    async fn verify_password(&self, email: &str, password: String) -> AuthResult<User> {
        let email = Email::new(email).map_err(|_| AuthError::InvalidCredential)?;

        let Some(user) = self.repo.find_user_by_email(&email).await? else {
            tracing::debug!("Login for unknown email");
            return Err(AuthError::InvalidCredential);
        };

        let raw_password = RawPassword::new(password).map_err(|_| AuthError::InvalidCredential)?;
        if !user.password.verify(&raw_password, self.config.pepper()) {
            tracing::warn!(user_id = %user.user_id, "Invalid password");
            return Err(AuthError::InvalidCredential);
        }

        Ok(user)
    }
}
