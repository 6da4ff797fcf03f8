//! Application Configuration
//!
//! Configuration for the Auth application layer.

use std::time::Duration;

use platform::crypto::random_bytes;

use crate::domain::value_object::totp_secret::TotpPolicy;

/// Minimum HS256 key length in bytes
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC key for access and step-up tokens (at least 32 bytes)
    pub jwt_secret: Vec<u8>,
    /// `iss` claim, required on verification
    pub jwt_issuer: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Application context used when a login names none
    pub default_app_code: String,
    /// Global role granted to every newly registered user, if any
    pub default_role_code: Option<String>,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    /// Revoke the session when a refresh presents a stale secret
    pub revoke_session_on_refresh_reuse: bool,
    pub totp: TotpSettings,
}

#[derive(Debug, Clone)]
pub struct TotpSettings {
    /// System-wide switch for MFA
    pub enabled: bool,
    pub issuer: String,
    pub digits: usize,
    /// Seconds
    pub period: u64,
    /// Steps accepted either side of the current one
    pub skew: u8,
    /// Lifetime of the step-up token handed out by login. Must be shorter
    /// than the access token TTL.
    pub login_token_ttl: Duration,
}

impl TotpSettings {
    pub fn policy(&self) -> TotpPolicy {
        TotpPolicy {
            digits: self.digits,
            period: self.period,
            skew: self.skew,
        }
    }
}

impl Default for TotpSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            issuer: "MiniPSP-Auth".to_string(),
            digits: 6,
            period: 30,
            skew: 1,
            login_token_ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: Vec::new(),
            jwt_issuer: "auth-service".to_string(),
            access_token_ttl: Duration::from_secs(10 * 60), // 10 minutes
            refresh_token_ttl: Duration::from_secs(30 * 24 * 3600), // 30 days
            default_app_code: "AUTH".to_string(),
            default_role_code: None,
            password_pepper: None,
            revoke_session_on_refresh_reuse: true,
            totp: TotpSettings::default(),
        }
    }
}

impl AuthConfig {
    /// Create config with a random signing secret
    pub fn with_random_secret() -> Self {
        Self {
            jwt_secret: random_bytes(MIN_JWT_SECRET_LEN * 2),
            ..Default::default()
        }
    }

    /// Create config for development (random secret, TOTP on)
    pub fn development() -> Self {
        let mut config = Self::with_random_secret();
        config.totp.enabled = true;
        config
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }

    pub fn access_token_ttl_secs(&self) -> i64 {
        self.access_token_ttl.as_secs() as i64
    }

    pub fn refresh_token_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_token_ttl.as_secs() as i64)
    }
}
