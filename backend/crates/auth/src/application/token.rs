//! Token Service
//!
//! Signs and verifies the two kinds of bearer credential the engine hands
//! out: access tokens and the short-lived step-up token issued when a login
//! still needs a TOTP code. Both are HS256 JWTs with closed claim sets, so
//! one can never be decoded as the other.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::application::config::{AuthConfig, MIN_JWT_SECRET_LEN};
use crate::application::resolve_permissions::ResolvedAuthority;
use crate::domain::entity::user::User;
use crate::domain::value_object::{MerchantId, SessionId, UserId, app_code::AppCode};
use crate::error::{AuthError, AuthResult};

/// `purpose` claim of the step-up token
pub const STEP_UP_PURPOSE: &str = "MFA_TOTP_LOGIN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessClaims {
    pub sub: String,
    pub jti: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Auth state version at issuance
    pub asv: i64,
    /// Refresh session the token was minted for
    pub sid: SessionId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub perms: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merchant_ids: Vec<MerchantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepUpClaims {
    pub sub: String,
    pub jti: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub purpose: String,
}

/// What login and refresh hand back to the client
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    /// `"{session_id}.{secret}"`
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl_secs: i64,
    step_up_ttl_secs: i64,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        if config.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(AuthError::Internal(format!(
                "JWT secret must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }
        if config.totp.login_token_ttl >= config.access_token_ttl {
            return Err(AuthError::Internal(
                "TOTP login token TTL must be shorter than the access token TTL".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&config.jwt_secret),
            decoding_key: DecodingKey::from_secret(&config.jwt_secret),
            issuer: config.jwt_issuer.clone(),
            access_ttl_secs: config.access_token_ttl_secs(),
            step_up_ttl_secs: config.totp.login_token_ttl.as_secs() as i64,
        })
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Claims reflect `authority` as resolved right now and the user's
    /// current ASV
    pub fn issue_access_token(
        &self,
        user: &User,
        session_id: &SessionId,
        authority: &ResolvedAuthority,
        app_code: Option<&AppCode>,
    ) -> AuthResult<String> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user.user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.access_ttl_secs,
            asv: user.auth_state_version,
            sid: *session_id,
            perms: authority.permissions.clone(),
            merchant_ids: authority.merchant_ids.clone(),
            app: app_code.map(|code| code.as_str().to_string()),
            email: Some(user.email.as_str().to_string()),
        };
        self.sign(&claims)
    }

    /// Any failure (signature, expiry, issuer, shape) is `InvalidCredential`
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        self.verify(token)
    }

    pub fn issue_step_up_token(&self, user_id: &UserId) -> AuthResult<String> {
        let now = Utc::now().timestamp();
        let claims = StepUpClaims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.step_up_ttl_secs,
            purpose: STEP_UP_PURPOSE.to_string(),
        };
        self.sign(&claims)
    }

    pub fn verify_step_up_token(&self, token: &str) -> AuthResult<UserId> {
        let claims: StepUpClaims = self.verify(token)?;
        if claims.purpose != STEP_UP_PURPOSE {
            tracing::debug!(purpose = %claims.purpose, "Step-up token with wrong purpose");
            return Err(AuthError::InvalidCredential);
        }
        claims.sub.parse().map_err(|_| AuthError::InvalidCredential)
    }

    fn sign<C: Serialize>(&self, claims: &C) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {e}")))
    }

    fn verify<C: DeserializeOwned>(&self, token: &str) -> AuthResult<C> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        decode::<C>(token.trim(), &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token verification failed");
                AuthError::InvalidCredential
            })
    }
}
