//! TOTP Use Case
//!
//! Enrollment, confirmation and removal of the TOTP second factor, plus the
//! code check used by the step-up login. Every state change that alters the
//! security posture bumps the user's ASV.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::domain::entity::{
    security_setting::UserSecuritySetting, totp_credential::TotpCredential,
};
use crate::domain::repository::{
    SecuritySettingRepository, TotpCredentialRepository, UserRepository,
};
use crate::domain::value_object::{TotpCredentialId, UserId};
use crate::error::{AuthError, AuthResult};

/// Enrollment output
#[derive(Debug, Clone)]
pub struct TotpEnrollment {
    pub credential_id: TotpCredentialId,
    /// Base32, for manual entry
    pub secret: String,
    /// otpauth:// URL
    pub otpauth_uri: String,
}

pub struct TotpUseCase<R>
where
    R: UserRepository + SecuritySettingRepository + TotpCredentialRepository,
{
    repo: Arc<R>,
    config: Arc<AuthConfig>,
}

impl<R> TotpUseCase<R>
where
    R: UserRepository + SecuritySettingRepository + TotpCredentialRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>) -> Self {
        Self { repo, config }
    }

    fn ensure_enabled(&self) -> AuthResult<()> {
        if self.config.totp.enabled {
            Ok(())
        } else {
            Err(AuthError::FeatureDisabled)
        }
    }

    /// Whether a password login for this user must go through step-up
    pub async fn requires_step_up(&self, user_id: &UserId) -> AuthResult<bool> {
        if !self.config.totp.enabled {
            return Ok(false);
        }
        Ok(self
            .repo
            .find_security_setting(user_id)
            .await?
            .is_some_and(|setting| setting.mfa_totp_enabled))
    }

    /// Reuses a pending credential so repeated calls before confirmation
    /// return the same secret
    pub async fn enroll(&self, user_id: &UserId) -> AuthResult<TotpEnrollment> {
        self.ensure_enabled()?;

        let user = self
            .repo
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound("User"))?;

        let credential = match self.repo.find_active_totp_credential(user_id).await? {
            Some(existing) => Self::pending(existing)?,
            None => {
                let credential = TotpCredential::new(
                    *user_id,
                    self.config.totp.issuer.clone(),
                    user.email.as_str(),
                );
                match self.repo.insert_totp_credential(&credential).await {
                    Ok(()) => {
                        tracing::info!(
                            user_id = %user_id,
                            credential_id = %credential.credential_id,
                            "TOTP enrollment started"
                        );
                        credential
                    }
                    // A concurrent enroll inserted first; hand out its secret
                    Err(AuthError::Conflict(_)) => {
                        let winner = self
                            .repo
                            .find_active_totp_credential(user_id)
                            .await?
                            .ok_or_else(|| {
                                AuthError::Conflict("TOTP enrollment changed, retry".to_string())
                            })?;
                        Self::pending(winner)?
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let otpauth_uri = credential.secret.otpauth_uri(
            &self.config.totp.policy(),
            &credential.issuer,
            &credential.account_name,
        )?;

        Ok(TotpEnrollment {
            credential_id: credential.credential_id,
            secret: credential.secret.as_base32().to_string(),
            otpauth_uri,
        })
    }

    pub async fn confirm(
        &self,
        user_id: &UserId,
        credential_id: &TotpCredentialId,
        code: &str,
    ) -> AuthResult<()> {
        self.ensure_enabled()?;

        let mut credential = self
            .repo
            .find_totp_credential(credential_id)
            .await?
            .ok_or(AuthError::NotFound("TOTP credential"))?;

        if credential.user_id != *user_id {
            tracing::warn!(
                user_id = %user_id,
                credential_id = %credential_id,
                "TOTP confirm for a credential owned by another user"
            );
            return Err(AuthError::Forbidden(
                "Credential belongs to another user".to_string(),
            ));
        }
        if !credential.active {
            return Err(AuthError::InvalidState(
                "TOTP credential is no longer active".to_string(),
            ));
        }
        if credential.is_verified() {
            return Err(AuthError::InvalidState("TOTP is already enabled".to_string()));
        }

        if !credential.secret.verify(code, &self.config.totp.policy())? {
            tracing::debug!(user_id = %user_id, "TOTP confirmation code mismatch");
            return Err(AuthError::InvalidCredential);
        }

        credential.mark_verified();
        self.repo.update_totp_credential(&credential).await?;

        let mut setting = self.setting_for(user_id).await?;
        setting.set_mfa_totp(true);
        self.repo.upsert_security_setting(&setting).await?;

        let asv = self.repo.bump_auth_state_version(user_id).await?;

        tracing::info!(user_id = %user_id, asv = asv, "TOTP enabled");
        Ok(())
    }

    pub async fn disable(&self, user_id: &UserId, reason: Option<&str>) -> AuthResult<()> {
        self.ensure_enabled()?;

        let mut setting = self.setting_for(user_id).await?;
        setting.set_mfa_totp(false);
        self.repo.upsert_security_setting(&setting).await?;

        let deactivated = self.repo.deactivate_totp_credentials(user_id).await?;
        let asv = self.repo.bump_auth_state_version(user_id).await?;

        tracing::info!(
            user_id = %user_id,
            credentials_deactivated = deactivated,
            asv = asv,
            reason = reason.unwrap_or("unspecified"),
            "TOTP disabled"
        );
        Ok(())
    }

    /// Second step of a login. Requires an active, verified credential.
    pub async fn verify_login_code(&self, user_id: &UserId, code: &str) -> AuthResult<()> {
        self.ensure_enabled()?;

        let mut credential = self
            .repo
            .find_active_totp_credential(user_id)
            .await?
            .filter(TotpCredential::can_authenticate)
            .ok_or_else(|| AuthError::InvalidState("No verified TOTP credential".to_string()))?;

        if !credential.secret.verify(code, &self.config.totp.policy())? {
            tracing::debug!(user_id = %user_id, "TOTP login code mismatch");
            return Err(AuthError::InvalidCredential);
        }

        credential.mark_used();
        self.repo.update_totp_credential(&credential).await?;
        Ok(())
    }

    fn pending(credential: TotpCredential) -> AuthResult<TotpCredential> {
        if credential.is_verified() {
            return Err(AuthError::InvalidState(
                "TOTP is already enabled; disable it first".to_string(),
            ));
        }
        Ok(credential)
    }

    async fn setting_for(&self, user_id: &UserId) -> AuthResult<UserSecuritySetting> {
        Ok(self
            .repo
            .find_security_setting(user_id)
            .await?
            .unwrap_or_else(|| UserSecuritySetting::disabled(*user_id)))
    }
}
