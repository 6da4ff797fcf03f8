//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{
    access_audit::AccessAuditEvent,
    access_grant::{ApplicationRoleGrant, GlobalRoleGrant, GrantMeta, MerchantRoleGrant, Role},
    application::Application,
    auth_session::{AuthSession, SessionRotation, SessionStatus},
    security_setting::UserSecuritySetting,
    totp_credential::TotpCredential,
    user::User,
};
use crate::domain::repository::{
    ApplicationRepository, AuditSink, GrantRepository, SecuritySettingRepository,
    SessionRepository, TotpCredentialRepository, UserRepository,
};
use crate::domain::value_object::{
    ApplicationId, MerchantId, RoleId, SessionId, TotpCredentialId, UserId, email::Email,
    totp_secret::TotpSecret, user_password::UserPassword,
};
use crate::error::{AuthError, AuthResult};

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Marks overdue active sessions as expired and deletes sessions that
    /// ended more than 30 days ago. Refresh never depends on this.
    pub async fn cleanup_expired(&self) -> AuthResult<(u64, u64)> {
        let now = Utc::now();

        let expired = sqlx::query(
            "UPDATE auth_sessions SET status = 'expired' WHERE status = 'active' AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let deleted = sqlx::query(
            r#"
            DELETE FROM auth_sessions
            WHERE status <> 'active'
              AND COALESCE(revoked_at, expires_at) < $1 - INTERVAL '30 days'
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        tracing::info!(
            sessions_expired = expired,
            sessions_deleted = deleted,
            "Cleaned up auth sessions"
        );

        Ok((expired, deleted))
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

const USER_COLUMNS: &str = r#"
    user_id,
    email,
    password_hash,
    full_name,
    auth_state_version,
    auth_state_changed_at,
    created_at,
    updated_at
"#;

impl UserRepository for PgAuthRepository {
    async fn insert_user(&self, user: &User) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                email,
                password_hash,
                full_name,
                auth_state_version,
                auth_state_changed_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.email.as_str())
        .bind(user.password.as_phc_string())
        .bind(&user.full_name)
        .bind(user.auth_state_version)
        .bind(user.auth_state_changed_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                Err(AuthError::Conflict("Email already registered".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn email_exists(&self, email: &Email) -> AuthResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn update_full_name(&self, user_id: &UserId, full_name: Option<&str>) -> AuthResult<()> {
        let updated = sqlx::query(
            "UPDATE users SET full_name = $2, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .bind(full_name)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AuthError::NotFound("User"));
        }
        Ok(())
    }

    async fn find_auth_state_version(&self, user_id: &UserId) -> AuthResult<Option<i64>> {
        let asv = sqlx::query_scalar::<_, i64>(
            "SELECT auth_state_version FROM users WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(asv)
    }

    async fn bump_auth_state_version(&self, user_id: &UserId) -> AuthResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users SET
                auth_state_version = auth_state_version + 1,
                auth_state_changed_at = now(),
                updated_at = now()
            WHERE user_id = $1
            RETURNING auth_state_version
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AuthError::NotFound("User"))
    }

    async fn reset_auth_state(
        &self,
        user_id: &UserId,
        new_password: Option<&UserPassword>,
        at: DateTime<Utc>,
    ) -> AuthResult<(u64, i64)> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the user serializes concurrent resets
        let exists = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM users WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Err(AuthError::NotFound("User"));
        }

        let revoked = sqlx::query(
            r#"
            UPDATE auth_sessions SET status = 'revoked', revoked_at = $2
            WHERE user_id = $1 AND status = 'active'
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let asv = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users SET
                auth_state_version = auth_state_version + 1,
                auth_state_changed_at = $2,
                password_hash = COALESCE($3, password_hash),
                updated_at = $2
            WHERE user_id = $1
            RETURNING auth_state_version
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(at)
        .bind(new_password.map(UserPassword::as_phc_string))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((revoked, asv))
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

const SESSION_COLUMNS: &str = r#"
    session_id,
    user_id,
    refresh_token_hash,
    status,
    ip_address,
    user_agent,
    application_id,
    last_rotated_at,
    expires_at,
    revoked_at,
    created_at
"#;

impl SessionRepository for PgAuthRepository {
    async fn insert_session(&self, session: &AuthSession) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_sessions (
                session_id,
                user_id,
                refresh_token_hash,
                status,
                ip_address,
                user_agent,
                application_id,
                last_rotated_at,
                expires_at,
                revoked_at,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(session.session_id.as_uuid())
        .bind(session.user_id.as_uuid())
        .bind(&session.rotation_secret_hash)
        .bind(session.status.as_str())
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.application_id.map(ApplicationId::into_uuid))
        .bind(session.last_rotated_at)
        .bind(session.expires_at)
        .bind(session.revoked_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_session(&self, session_id: &SessionId) -> AuthResult<Option<AuthSession>> {
        let row = sqlx::query_as::<_, AuthSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM auth_sessions WHERE session_id = $1"
        ))
        .bind(session_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(AuthSessionRow::into_session).transpose()
    }

    async fn find_sessions_by_user(&self, user_id: &UserId) -> AuthResult<Vec<AuthSession>> {
        let rows = sqlx::query_as::<_, AuthSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM auth_sessions WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuthSessionRow::into_session).collect()
    }

    async fn rotate_session(&self, rotation: &SessionRotation) -> AuthResult<bool> {
        let rotated = sqlx::query(
            r#"
            UPDATE auth_sessions SET
                refresh_token_hash = $3,
                expires_at = $4,
                ip_address = $5,
                user_agent = $6,
                last_rotated_at = $7
            WHERE session_id = $1
              AND status = 'active'
              AND refresh_token_hash = $2
            "#,
        )
        .bind(rotation.session_id.as_uuid())
        .bind(&rotation.expected_hash)
        .bind(&rotation.new_hash)
        .bind(rotation.expires_at)
        .bind(&rotation.ip_address)
        .bind(&rotation.user_agent)
        .bind(rotation.rotated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rotated == 1)
    }

    async fn revoke_session(&self, session_id: &SessionId, at: DateTime<Utc>) -> AuthResult<bool> {
        let revoked = sqlx::query(
            r#"
            UPDATE auth_sessions SET status = 'revoked', revoked_at = $2
            WHERE session_id = $1 AND status = 'active'
            "#,
        )
        .bind(session_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(revoked == 1)
    }

    async fn mark_session_expired(&self, session_id: &SessionId) -> AuthResult<()> {
        sqlx::query(
            "UPDATE auth_sessions SET status = 'expired' WHERE session_id = $1 AND status = 'active'",
        )
        .bind(session_id.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Security Setting Repository Implementation
// ============================================================================

impl SecuritySettingRepository for PgAuthRepository {
    async fn find_security_setting(
        &self,
        user_id: &UserId,
    ) -> AuthResult<Option<UserSecuritySetting>> {
        let row = sqlx::query_as::<_, SecuritySettingRow>(
            r#"
            SELECT user_id, mfa_totp_enabled, mfa_updated_at
            FROM user_security_settings
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| UserSecuritySetting {
            user_id: UserId::from_uuid(r.user_id),
            mfa_totp_enabled: r.mfa_totp_enabled,
            mfa_updated_at: r.mfa_updated_at,
        }))
    }

    async fn upsert_security_setting(&self, setting: &UserSecuritySetting) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_security_settings (user_id, mfa_totp_enabled, mfa_updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                mfa_totp_enabled = EXCLUDED.mfa_totp_enabled,
                mfa_updated_at = EXCLUDED.mfa_updated_at
            "#,
        )
        .bind(setting.user_id.as_uuid())
        .bind(setting.mfa_totp_enabled)
        .bind(setting.mfa_updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// TOTP Credential Repository Implementation
// ============================================================================

const TOTP_COLUMNS: &str = r#"
    credential_id,
    user_id,
    secret,
    issuer,
    account_name,
    created_at,
    verified_at,
    last_used_at,
    active
"#;

impl TotpCredentialRepository for PgAuthRepository {
    async fn insert_totp_credential(&self, credential: &TotpCredential) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO totp_credentials (
                credential_id,
                user_id,
                secret,
                issuer,
                account_name,
                created_at,
                verified_at,
                last_used_at,
                active
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(credential.credential_id.as_uuid())
        .bind(credential.user_id.as_uuid())
        .bind(credential.secret.as_base32())
        .bind(&credential.issuer)
        .bind(&credential.account_name)
        .bind(credential.created_at)
        .bind(credential.verified_at)
        .bind(credential.last_used_at)
        .bind(credential.active)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => Err(
                AuthError::Conflict("TOTP credential already active".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_totp_credential(
        &self,
        credential_id: &TotpCredentialId,
    ) -> AuthResult<Option<TotpCredential>> {
        let row = sqlx::query_as::<_, TotpCredentialRow>(&format!(
            "SELECT {TOTP_COLUMNS} FROM totp_credentials WHERE credential_id = $1"
        ))
        .bind(credential_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TotpCredentialRow::into_credential).transpose()
    }

    async fn find_active_totp_credential(
        &self,
        user_id: &UserId,
    ) -> AuthResult<Option<TotpCredential>> {
        let row = sqlx::query_as::<_, TotpCredentialRow>(&format!(
            r#"
            SELECT {TOTP_COLUMNS} FROM totp_credentials
            WHERE user_id = $1 AND active
            "#
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TotpCredentialRow::into_credential).transpose()
    }

    async fn update_totp_credential(&self, credential: &TotpCredential) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE totp_credentials SET
                verified_at = $2,
                last_used_at = $3,
                active = $4
            WHERE credential_id = $1
            "#,
        )
        .bind(credential.credential_id.as_uuid())
        .bind(credential.verified_at)
        .bind(credential.last_used_at)
        .bind(credential.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deactivate_totp_credentials(&self, user_id: &UserId) -> AuthResult<u64> {
        let deactivated = sqlx::query(
            "UPDATE totp_credentials SET active = FALSE WHERE user_id = $1 AND active",
        )
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deactivated)
    }
}

// ============================================================================
// Grant Repository Implementation
// ============================================================================

impl GrantRepository for PgAuthRepository {
    async fn find_role_by_code(&self, code: &str) -> AuthResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            "SELECT role_id, code, name, is_system FROM roles WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Role {
            role_id: RoleId::from_uuid(r.role_id),
            code: r.code,
            name: r.name,
            is_system: r.is_system,
        }))
    }

    async fn find_permission_codes_by_roles(&self, role_ids: &[RoleId]) -> AuthResult<Vec<String>> {
        let ids: Vec<Uuid> = role_ids.iter().map(|id| id.into_uuid()).collect();

        let codes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT p.code
            FROM role_permissions rp
            JOIN permissions p ON p.permission_id = rp.permission_id
            WHERE rp.role_id = ANY($1)
            ORDER BY p.code
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }

    async fn find_global_grants(&self, user_id: &UserId) -> AuthResult<Vec<GlobalRoleGrant>> {
        let rows = sqlx::query_as::<_, GlobalGrantRow>(
            r#"
            SELECT user_id, role_id, expires_at, granted_by, note
            FROM user_global_roles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| GlobalRoleGrant {
                user_id: UserId::from_uuid(r.user_id),
                role_id: RoleId::from_uuid(r.role_id),
                expires_at: r.expires_at,
                meta: grant_meta(r.granted_by, r.note),
            })
            .collect())
    }

    async fn find_application_grants(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
    ) -> AuthResult<Vec<ApplicationRoleGrant>> {
        let rows = sqlx::query_as::<_, ApplicationGrantRow>(
            r#"
            SELECT user_id, application_id, role_id, expires_at, granted_by, note
            FROM user_application_roles
            WHERE user_id = $1 AND application_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(application_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ApplicationRoleGrant {
                user_id: UserId::from_uuid(r.user_id),
                application_id: ApplicationId::from_uuid(r.application_id),
                role_id: RoleId::from_uuid(r.role_id),
                expires_at: r.expires_at,
                meta: grant_meta(r.granted_by, r.note),
            })
            .collect())
    }

    async fn find_merchant_grants(&self, user_id: &UserId) -> AuthResult<Vec<MerchantRoleGrant>> {
        let rows = sqlx::query_as::<_, MerchantGrantRow>(
            r#"
            SELECT user_id, merchant_id, role_id, scope, expires_at, granted_by, note
            FROM user_merchant_roles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| MerchantRoleGrant {
                user_id: UserId::from_uuid(r.user_id),
                merchant_id: MerchantId::from_uuid(r.merchant_id),
                role_id: RoleId::from_uuid(r.role_id),
                scope: r.scope,
                expires_at: r.expires_at,
                meta: grant_meta(r.granted_by, r.note),
            })
            .collect())
    }

    async fn insert_global_grant(&self, grant: &GlobalRoleGrant) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_global_roles (user_id, role_id, expires_at, granted_by, note)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, role_id) DO UPDATE SET
                expires_at = EXCLUDED.expires_at,
                granted_by = EXCLUDED.granted_by,
                note = EXCLUDED.note
            "#,
        )
        .bind(grant.user_id.as_uuid())
        .bind(grant.role_id.as_uuid())
        .bind(grant.expires_at)
        .bind(grant.meta.granted_by.map(UserId::into_uuid))
        .bind(&grant.meta.note)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Application Repository Implementation
// ============================================================================

impl ApplicationRepository for PgAuthRepository {
    async fn find_application_by_code(&self, code: &str) -> AuthResult<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            r#"
            SELECT application_id, code, name, is_system
            FROM applications
            WHERE upper(code) = upper($1)
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ApplicationRow::into_application))
    }

    async fn find_application_by_id(
        &self,
        application_id: &ApplicationId,
    ) -> AuthResult<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            r#"
            SELECT application_id, code, name, is_system
            FROM applications
            WHERE application_id = $1
            "#,
        )
        .bind(application_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ApplicationRow::into_application))
    }
}

// ============================================================================
// Audit Sink Implementation
// ============================================================================

impl AuditSink for PgAuthRepository {
    async fn record_access(&self, event: &AccessAuditEvent) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO access_audit (
                user_id,
                merchant_id,
                http_method,
                path,
                allowed,
                required_permission,
                client_ip,
                user_agent,
                token_id,
                note,
                occurred_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(event.user_id.map(UserId::into_uuid))
        .bind(event.merchant_id.map(MerchantId::into_uuid))
        .bind(&event.request.http_method)
        .bind(&event.request.path)
        .bind(event.allowed)
        .bind(&event.required_permission)
        .bind(&event.request.client_ip)
        .bind(&event.request.user_agent)
        .bind(&event.token_id)
        .bind(&event.note)
        .bind(event.occurred_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Row Types
// ============================================================================

fn grant_meta(granted_by: Option<Uuid>, note: Option<String>) -> GrantMeta {
    GrantMeta {
        granted_by: granted_by.map(UserId::from_uuid),
        note,
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
    password_hash: String,
    full_name: Option<String>,
    auth_state_version: i64,
    auth_state_changed_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        let password = UserPassword::from_phc_string(self.password_hash)
            .map_err(|e| AuthError::Internal(format!("Invalid password hash: {e}")))?;

        Ok(User {
            user_id: UserId::from_uuid(self.user_id),
            email: Email::from_db(self.email),
            password,
            full_name: self.full_name,
            auth_state_version: self.auth_state_version,
            auth_state_changed_at: self.auth_state_changed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuthSessionRow {
    session_id: Uuid,
    user_id: Uuid,
    refresh_token_hash: Vec<u8>,
    status: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    application_id: Option<Uuid>,
    last_rotated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl AuthSessionRow {
    fn into_session(self) -> AuthResult<AuthSession> {
        let status: SessionStatus = self.status.parse().map_err(AuthError::Internal)?;

        Ok(AuthSession {
            session_id: SessionId::from_uuid(self.session_id),
            user_id: UserId::from_uuid(self.user_id),
            rotation_secret_hash: self.refresh_token_hash,
            status,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            application_id: self.application_id.map(ApplicationId::from_uuid),
            last_rotated_at: self.last_rotated_at,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SecuritySettingRow {
    user_id: Uuid,
    mfa_totp_enabled: bool,
    mfa_updated_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct TotpCredentialRow {
    credential_id: Uuid,
    user_id: Uuid,
    secret: String,
    issuer: String,
    account_name: String,
    created_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
    active: bool,
}

impl TotpCredentialRow {
    fn into_credential(self) -> AuthResult<TotpCredential> {
        let secret = TotpSecret::from_base32(self.secret)
            .map_err(|e| AuthError::Internal(format!("Invalid TOTP secret: {e}")))?;

        Ok(TotpCredential {
            credential_id: TotpCredentialId::from_uuid(self.credential_id),
            user_id: UserId::from_uuid(self.user_id),
            secret,
            issuer: self.issuer,
            account_name: self.account_name,
            created_at: self.created_at,
            verified_at: self.verified_at,
            last_used_at: self.last_used_at,
            active: self.active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    role_id: Uuid,
    code: String,
    name: String,
    is_system: bool,
}

#[derive(sqlx::FromRow)]
struct GlobalGrantRow {
    user_id: Uuid,
    role_id: Uuid,
    expires_at: Option<DateTime<Utc>>,
    granted_by: Option<Uuid>,
    note: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ApplicationGrantRow {
    user_id: Uuid,
    application_id: Uuid,
    role_id: Uuid,
    expires_at: Option<DateTime<Utc>>,
    granted_by: Option<Uuid>,
    note: Option<String>,
}

#[derive(sqlx::FromRow)]
struct MerchantGrantRow {
    user_id: Uuid,
    merchant_id: Uuid,
    role_id: Uuid,
    scope: Option<Value>,
    expires_at: Option<DateTime<Utc>>,
    granted_by: Option<Uuid>,
    note: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    application_id: Uuid,
    code: String,
    name: String,
    is_system: bool,
}

impl ApplicationRow {
    fn into_application(self) -> Application {
        Application {
            application_id: ApplicationId::from_uuid(self.application_id),
            code: self.code,
            name: self.name,
            is_system: self.is_system,
        }
    }
}
