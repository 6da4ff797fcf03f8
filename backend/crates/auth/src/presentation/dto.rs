//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::token::TokenPair;
use crate::domain::entity::{auth_session::AuthSession, user::User};
use crate::domain::value_object::{
    ApplicationId, MerchantId, SessionId, TotpCredentialId, UserId,
};

// ============================================================================
// Register
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub id: UserId,
}

// ============================================================================
// Login
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub app_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoginStatus {
    Ok,
    NeedMfaTotp,
}

/// Tokens are present for `OK`, the login token for `NEED_MFA_TOTP`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub login_status: LoginStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpLoginRequest {
    pub login_token: String,
    pub code: String,
    #[serde(default)]
    pub app_code: Option<String>,
}

// ============================================================================
// Token pair / refresh / logout
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer",
            expires_in: pair.expires_in,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsRevokedResponse {
    pub ok: bool,
    pub sessions_revoked: u64,
}

// ============================================================================
// TOTP
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpEnrollResponse {
    pub credential_id: TotpCredentialId,
    /// Base32 secret for manual entry
    pub secret: String,
    pub otpauth_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpConfirmRequest {
    pub credential_id: TotpCredentialId,
    pub code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpDisableRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// ============================================================================
// Self-service
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user_id: UserId,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email.as_str().to_string(),
            full_name: user.full_name,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// A session as its owner sees it. No secret material.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: SessionId,
    pub status: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub application_id: Option<ApplicationId>,
    pub created_at: DateTime<Utc>,
    pub last_rotated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    /// The session behind the token making this request
    pub current: bool,
}

impl SessionResponse {
    pub fn new(session: AuthSession, current_session: &SessionId) -> Self {
        Self {
            current: &session.session_id == current_session,
            id: session.session_id,
            status: session.status.to_string(),
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            application_id: session.application_id,
            created_at: session.created_at,
            last_rotated_at: session.last_rotated_at,
            expires_at: session.expires_at,
            revoked_at: session.revoked_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeResponse {
    pub user_id: UserId,
    pub email: Option<String>,
    pub permissions: Vec<String>,
    pub merchant_ids: Vec<MerchantId>,
    pub app: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScopeCheckQuery {
    /// Permission code; omitted means merchant membership only
    #[serde(default)]
    pub perm: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeCheckResponse {
    pub allowed: bool,
}

// ============================================================================
// Administration
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLogoutAllResponse {
    pub user_id: UserId,
    /// Always `"revoked_all"`
    pub status: &'static str,
    pub sessions_revoked: u64,
}
