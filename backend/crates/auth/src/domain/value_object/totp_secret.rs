//! TOTP Secret Value Object
//!
//! RFC 6238 shared secret (160 bits, Base32 without padding), compatible
//! with Google Authenticator and friends. Code length, period and accepted
//! clock skew come from a [`TotpPolicy`] so they follow configuration.

use std::time::{SystemTime, UNIX_EPOCH};

use kernel::error::app_error::{AppError, AppResult};
use totp_rs::{Algorithm, Secret, TOTP};

/// Code generation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotpPolicy {
    /// 6..=8
    pub digits: usize,
    /// Seconds per time step
    pub period: u64,
    /// Neighbouring steps accepted on each side of the current one
    pub skew: u8,
}

impl Default for TotpPolicy {
    fn default() -> Self {
        Self {
            digits: 6,
            period: 30,
            skew: 1,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret {
    secret_base32: String,
}

impl TotpSecret {
    pub fn generate() -> Self {
        Self {
            secret_base32: Secret::generate_secret().to_encoded().to_string(),
        }
    }

    pub fn from_base32(secret: impl Into<String>) -> AppResult<Self> {
        let secret_base32 = secret.into();
        Secret::Encoded(secret_base32.clone())
            .to_bytes()
            .map_err(|e| AppError::internal(format!("Invalid TOTP secret: {e:?}")))?;
        Ok(Self { secret_base32 })
    }

    pub fn as_base32(&self) -> &str {
        &self.secret_base32
    }

    fn to_totp(
        &self,
        policy: &TotpPolicy,
        issuer: Option<&str>,
        account_name: &str,
    ) -> AppResult<TOTP> {
        let bytes = Secret::Encoded(self.secret_base32.clone())
            .to_bytes()
            .map_err(|e| AppError::internal(format!("Invalid TOTP secret: {e:?}")))?;

        TOTP::new(
            Algorithm::SHA1,
            policy.digits,
            policy.skew,
            policy.period,
            bytes,
            issuer.map(str::to_string),
            account_name.to_string(),
        )
        .map_err(|e| AppError::internal(format!("Failed to build TOTP: {e}")))
    }

    /// Zero-padded code for the step containing `unix_secs`
    pub fn generate_at(&self, policy: &TotpPolicy, unix_secs: u64) -> AppResult<String> {
        Ok(self.to_totp(policy, None, "")?.generate(unix_secs))
    }

    /// Constant-time string comparison over the skew window
    pub fn verify_at(&self, code: &str, policy: &TotpPolicy, unix_secs: u64) -> AppResult<bool> {
        let code = code.trim();
        if code.len() != policy.digits || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(false);
        }
        Ok(self.to_totp(policy, None, "")?.check(code, unix_secs))
    }

    pub fn verify(&self, code: &str, policy: &TotpPolicy) -> AppResult<bool> {
        self.verify_at(code, policy, unix_now()?)
    }

    /// `otpauth://totp/...` provisioning URI
    pub fn otpauth_uri(
        &self,
        policy: &TotpPolicy,
        issuer: &str,
        account_name: &str,
    ) -> AppResult<String> {
        Ok(self.to_totp(policy, Some(issuer), account_name)?.get_url())
    }
}

impl std::fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TotpSecret")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

pub(crate) fn unix_now() -> AppResult<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| AppError::internal("System clock before UNIX epoch").with_source(e))
}
