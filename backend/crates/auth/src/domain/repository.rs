//! Repository Traits
//!
//! Read/write contracts the engine needs from storage. Implementations live
//! in the infrastructure layer. Method names are distinct across traits so a
//! single store type can implement all of them without call ambiguity.

use chrono::{DateTime, Utc};

use crate::domain::entity::{
    access_audit::AccessAuditEvent,
    access_grant::{ApplicationRoleGrant, GlobalRoleGrant, MerchantRoleGrant, Role},
    application::Application,
    auth_session::{AuthSession, SessionRotation},
    security_setting::UserSecuritySetting,
    totp_credential::TotpCredential,
    user::User,
};
use crate::domain::value_object::{
    ApplicationId, RoleId, SessionId, TotpCredentialId, UserId, email::Email,
    user_password::UserPassword,
};
use crate::error::AuthResult;

#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Fails with `Conflict` when the normalized email is taken
    async fn insert_user(&self, user: &User) -> AuthResult<()>;

    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>>;

    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    async fn email_exists(&self, email: &Email) -> AuthResult<bool>;

    /// `None` clears the name. Fails with `NotFound` for an unknown user.
    async fn update_full_name(&self, user_id: &UserId, full_name: Option<&str>) -> AuthResult<()>;

    async fn find_auth_state_version(&self, user_id: &UserId) -> AuthResult<Option<i64>>;

    /// Atomic `asv = asv + 1`; returns the new value.
    /// Fails with `NotFound` for an unknown user.
    async fn bump_auth_state_version(&self, user_id: &UserId) -> AuthResult<i64>;

    /// Revokes every active session of the user, then bumps the ASV, then
    /// stores `new_password` if given, as one atomic unit. A refresh racing
    /// this either loses the rotation or mints a token with the old ASV.
    /// Returns `(sessions_revoked, new_asv)`; `NotFound` for an unknown user.
    async fn reset_auth_state(
        &self,
        user_id: &UserId,
        new_password: Option<&UserPassword>,
        at: DateTime<Utc>,
    ) -> AuthResult<(u64, i64)>;
}

#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    async fn insert_session(&self, session: &AuthSession) -> AuthResult<()>;

    async fn find_session(&self, session_id: &SessionId) -> AuthResult<Option<AuthSession>>;

    /// Newest first
    async fn find_sessions_by_user(&self, user_id: &UserId) -> AuthResult<Vec<AuthSession>>;

    /// Applies the rotation only if the session is active and still holds
    /// `expected_hash`. `false` means another request rotated or revoked it.
    async fn rotate_session(&self, rotation: &SessionRotation) -> AuthResult<bool>;

    /// Active -> revoked. `false` if there was no active session to revoke.
    async fn revoke_session(&self, session_id: &SessionId, at: DateTime<Utc>) -> AuthResult<bool>;

    async fn mark_session_expired(&self, session_id: &SessionId) -> AuthResult<()>;
}

#[trait_variant::make(SecuritySettingRepository: Send)]
pub trait LocalSecuritySettingRepository {
    async fn find_security_setting(
        &self,
        user_id: &UserId,
    ) -> AuthResult<Option<UserSecuritySetting>>;

    async fn upsert_security_setting(&self, setting: &UserSecuritySetting) -> AuthResult<()>;
}

#[trait_variant::make(TotpCredentialRepository: Send)]
pub trait LocalTotpCredentialRepository {
    /// At most one credential per user is active. Fails with `Conflict`
    /// when inserting an active credential while another one is active.
    async fn insert_totp_credential(&self, credential: &TotpCredential) -> AuthResult<()>;

    async fn find_totp_credential(
        &self,
        credential_id: &TotpCredentialId,
    ) -> AuthResult<Option<TotpCredential>>;

    /// The active credential, verified or not
    async fn find_active_totp_credential(
        &self,
        user_id: &UserId,
    ) -> AuthResult<Option<TotpCredential>>;

    /// Persists `verified_at`, `last_used_at` and `active`
    async fn update_totp_credential(&self, credential: &TotpCredential) -> AuthResult<()>;

    async fn deactivate_totp_credentials(&self, user_id: &UserId) -> AuthResult<u64>;
}

#[trait_variant::make(GrantRepository: Send)]
pub trait LocalGrantRepository {
    async fn find_role_by_code(&self, code: &str) -> AuthResult<Option<Role>>;

    async fn find_permission_codes_by_roles(&self, role_ids: &[RoleId]) -> AuthResult<Vec<String>>;

    /// Rows are returned regardless of expiry; the resolver filters
    async fn find_global_grants(&self, user_id: &UserId) -> AuthResult<Vec<GlobalRoleGrant>>;

    async fn find_application_grants(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
    ) -> AuthResult<Vec<ApplicationRoleGrant>>;

    async fn find_merchant_grants(&self, user_id: &UserId) -> AuthResult<Vec<MerchantRoleGrant>>;

    async fn insert_global_grant(&self, grant: &GlobalRoleGrant) -> AuthResult<()>;
}

#[trait_variant::make(ApplicationRepository: Send)]
pub trait LocalApplicationRepository {
    /// Case-insensitive
    async fn find_application_by_code(&self, code: &str) -> AuthResult<Option<Application>>;

    async fn find_application_by_id(
        &self,
        application_id: &ApplicationId,
    ) -> AuthResult<Option<Application>>;
}

/// Destination for access decisions. Failures are reported but must never
/// change the decision.
#[trait_variant::make(AuditSink: Send)]
pub trait LocalAuditSink {
    async fn record_access(&self, event: &AccessAuditEvent) -> AuthResult<()>;
}

/// Everything the HTTP layer needs from one store
pub trait AuthStore:
    UserRepository
    + SessionRepository
    + SecuritySettingRepository
    + TotpCredentialRepository
    + GrantRepository
    + ApplicationRepository
    + AuditSink
    + Clone
    + Send
    + Sync
    + 'static
{
}

impl<T> AuthStore for T where
    T: UserRepository
        + SessionRepository
        + SecuritySettingRepository
        + TotpCredentialRepository
        + GrantRepository
        + ApplicationRepository
        + AuditSink
        + Clone
        + Send
        + Sync
        + 'static
{
}
