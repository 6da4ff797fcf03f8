//! In-Memory Repository Implementation
//!
//! Backs tests and local runs without `DATABASE_URL`. Every operation runs
//! under one mutex, so session rotation and ASV bumps are atomic exactly as
//! their SQL counterparts are.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::domain::entity::{
    access_audit::AccessAuditEvent,
    access_grant::{
        ApplicationRoleGrant, GlobalRoleGrant, GrantMeta, MerchantRoleGrant, Permission, Role,
        RolePermission,
    },
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
    ApplicationId, MerchantId, PermissionId, RoleId, SessionId, TotpCredentialId, UserId,
    email::Email, user_password::UserPassword,
};
use crate::error::{AuthError, AuthResult};

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    sessions: HashMap<SessionId, AuthSession>,
    settings: HashMap<UserId, UserSecuritySetting>,
    totp_credentials: HashMap<TotpCredentialId, TotpCredential>,
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, Permission>,
    role_permissions: BTreeSet<RolePermission>,
    global_grants: Vec<GlobalRoleGrant>,
    application_grants: Vec<ApplicationRoleGrant>,
    merchant_grants: Vec<MerchantRoleGrant>,
    applications: HashMap<ApplicationId, Application>,
    audit_events: Vec<AccessAuditEvent>,
    fail_audit: bool,
}

/// Shared, cloneable in-process store
#[derive(Clone, Default)]
pub struct InMemoryAuthRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // Every critical section leaves the state consistent, so a panic in
        // another holder does not invalidate it
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Seeding (there is no administration API for these)
    // ------------------------------------------------------------------

    pub fn insert_application(&self, code: &str) -> ApplicationId {
        let application = Application {
            application_id: ApplicationId::new(),
            code: code.trim().to_uppercase(),
            name: code.trim().to_string(),
            is_system: false,
        };
        let id = application.application_id;
        self.state().applications.insert(id, application);
        id
    }

    pub fn insert_role(&self, code: &str) -> RoleId {
        let role = Role {
            role_id: RoleId::new(),
            code: code.to_string(),
            name: code.to_string(),
            is_system: false,
        };
        let id = role.role_id;
        self.state().roles.insert(id, role);
        id
    }

    /// Creates the permission on first use
    pub fn grant_role_permission(&self, role_id: RoleId, permission_code: &str) {
        let mut state = self.state();
        let permission_id = match state
            .permissions
            .values()
            .find(|p| p.code == permission_code)
        {
            Some(permission) => permission.permission_id,
            None => {
                let permission = Permission {
                    permission_id: PermissionId::new(),
                    code: permission_code.to_string(),
                    name: permission_code.to_string(),
                    description: None,
                };
                let id = permission.permission_id;
                state.permissions.insert(id, permission);
                id
            }
        };
        state.role_permissions.insert(RolePermission {
            role_id,
            permission_id,
        });
    }

    pub fn grant_global_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
        expires_at: Option<DateTime<Utc>>,
    ) {
        let mut state = self.state();
        state
            .global_grants
            .retain(|g| !(g.user_id == user_id && g.role_id == role_id));
        state.global_grants.push(GlobalRoleGrant {
            user_id,
            role_id,
            expires_at,
            meta: GrantMeta::default(),
        });
    }

    pub fn grant_application_role(
        &self,
        user_id: UserId,
        application_id: ApplicationId,
        role_id: RoleId,
        expires_at: Option<DateTime<Utc>>,
    ) {
        let mut state = self.state();
        state.application_grants.retain(|g| {
            !(g.user_id == user_id && g.application_id == application_id && g.role_id == role_id)
        });
        state.application_grants.push(ApplicationRoleGrant {
            user_id,
            application_id,
            role_id,
            expires_at,
            meta: GrantMeta::default(),
        });
    }

    pub fn grant_merchant_role(
        &self,
        user_id: UserId,
        merchant_id: MerchantId,
        role_id: RoleId,
        expires_at: Option<DateTime<Utc>>,
    ) {
        let mut state = self.state();
        state.merchant_grants.retain(|g| {
            !(g.user_id == user_id && g.merchant_id == merchant_id && g.role_id == role_id)
        });
        state.merchant_grants.push(MerchantRoleGrant {
            user_id,
            merchant_id,
            role_id,
            scope: None,
            expires_at,
            meta: GrantMeta::default(),
        });
    }

    /// Recorded access decisions, oldest first
    pub fn audit_events(&self) -> Vec<AccessAuditEvent> {
        self.state().audit_events.clone()
    }

    /// Make `record_access` fail, to exercise sink outages
    pub fn set_audit_failure(&self, fail: bool) {
        self.state().fail_audit = fail;
    }
}

impl UserRepository for InMemoryAuthRepository {
    async fn insert_user(&self, user: &User) -> AuthResult<()> {
        let mut state = self.state();
        if state.users.values().any(|u| u.email == user.email) {
            return Err(AuthError::Conflict("Email already registered".to_string()));
        }
        state.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        Ok(self.state().users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        Ok(self
            .state()
            .users
            .values()
            .find(|u| &u.email == email)
            .cloned())
    }

    async fn email_exists(&self, email: &Email) -> AuthResult<bool> {
        Ok(self.state().users.values().any(|u| &u.email == email))
    }

    async fn update_full_name(&self, user_id: &UserId, full_name: Option<&str>) -> AuthResult<()> {
        let mut state = self.state();
        let user = state
            .users
            .get_mut(user_id)
            .ok_or(AuthError::NotFound("User"))?;
        user.full_name = full_name.map(str::to_string);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn find_auth_state_version(&self, user_id: &UserId) -> AuthResult<Option<i64>> {
        Ok(self
            .state()
            .users
            .get(user_id)
            .map(|u| u.auth_state_version))
    }

    async fn bump_auth_state_version(&self, user_id: &UserId) -> AuthResult<i64> {
        let mut state = self.state();
        let user = state
            .users
            .get_mut(user_id)
            .ok_or(AuthError::NotFound("User"))?;
        let now = Utc::now();
        user.auth_state_version += 1;
        user.auth_state_changed_at = now;
        user.updated_at = now;
        Ok(user.auth_state_version)
    }

    async fn reset_auth_state(
        &self,
        user_id: &UserId,
        new_password: Option<&UserPassword>,
        at: DateTime<Utc>,
    ) -> AuthResult<(u64, i64)> {
        let mut guard = self.state();
        let state = &mut *guard;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or(AuthError::NotFound("User"))?;

        let mut revoked = 0;
        for session in state
            .sessions
            .values_mut()
            .filter(|s| &s.user_id == user_id && s.is_active())
        {
            session.status = SessionStatus::Revoked;
            session.revoked_at = Some(at);
            revoked += 1;
        }

        user.auth_state_version += 1;
        user.auth_state_changed_at = at;
        user.updated_at = at;
        if let Some(password) = new_password {
            user.password = password.clone();
        }
        Ok((revoked, user.auth_state_version))
    }
}

impl SessionRepository for InMemoryAuthRepository {
    async fn insert_session(&self, session: &AuthSession) -> AuthResult<()> {
        self.state()
            .sessions
            .insert(session.session_id, session.clone());
        Ok(())
    }

    async fn find_session(&self, session_id: &SessionId) -> AuthResult<Option<AuthSession>> {
        Ok(self.state().sessions.get(session_id).cloned())
    }

    async fn find_sessions_by_user(&self, user_id: &UserId) -> AuthResult<Vec<AuthSession>> {
        let mut sessions: Vec<AuthSession> = self
            .state()
            .sessions
            .values()
            .filter(|s| &s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn rotate_session(&self, rotation: &SessionRotation) -> AuthResult<bool> {
        let mut state = self.state();
        let Some(session) = state.sessions.get_mut(&rotation.session_id) else {
            return Ok(false);
        };
        if !session.is_active() || session.rotation_secret_hash != rotation.expected_hash {
            return Ok(false);
        }

        session.rotation_secret_hash = rotation.new_hash.clone();
        session.expires_at = rotation.expires_at;
        session.ip_address = rotation.ip_address.clone();
        session.user_agent = rotation.user_agent.clone();
        session.last_rotated_at = rotation.rotated_at;
        Ok(true)
    }

    async fn revoke_session(&self, session_id: &SessionId, at: DateTime<Utc>) -> AuthResult<bool> {
        let mut state = self.state();
        match state.sessions.get_mut(session_id) {
            Some(session) if session.is_active() => {
                session.status = SessionStatus::Revoked;
                session.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_session_expired(&self, session_id: &SessionId) -> AuthResult<()> {
        let mut state = self.state();
        if let Some(session) = state.sessions.get_mut(session_id).filter(|s| s.is_active()) {
            session.status = SessionStatus::Expired;
        }
        Ok(())
    }
}

impl SecuritySettingRepository for InMemoryAuthRepository {
    async fn find_security_setting(
        &self,
        user_id: &UserId,
    ) -> AuthResult<Option<UserSecuritySetting>> {
        Ok(self.state().settings.get(user_id).cloned())
    }

    async fn upsert_security_setting(&self, setting: &UserSecuritySetting) -> AuthResult<()> {
        self.state()
            .settings
            .insert(setting.user_id, setting.clone());
        Ok(())
    }
}

impl TotpCredentialRepository for InMemoryAuthRepository {
    async fn insert_totp_credential(&self, credential: &TotpCredential) -> AuthResult<()> {
        let mut state = self.state();
        if credential.active
            && state
                .totp_credentials
                .values()
                .any(|c| c.user_id == credential.user_id && c.active)
        {
            return Err(AuthError::Conflict(
                "TOTP credential already active".to_string(),
            ));
        }
        state
            .totp_credentials
            .insert(credential.credential_id, credential.clone());
        Ok(())
    }

    async fn find_totp_credential(
        &self,
        credential_id: &TotpCredentialId,
    ) -> AuthResult<Option<TotpCredential>> {
        Ok(self.state().totp_credentials.get(credential_id).cloned())
    }

    async fn find_active_totp_credential(
        &self,
        user_id: &UserId,
    ) -> AuthResult<Option<TotpCredential>> {
        Ok(self
            .state()
            .totp_credentials
            .values()
            .find(|c| &c.user_id == user_id && c.active)
            .cloned())
    }

    async fn update_totp_credential(&self, credential: &TotpCredential) -> AuthResult<()> {
        let mut state = self.state();
        let stored = state
            .totp_credentials
            .get_mut(&credential.credential_id)
            .ok_or(AuthError::NotFound("TOTP credential"))?;
        stored.verified_at = credential.verified_at;
        stored.last_used_at = credential.last_used_at;
        stored.active = credential.active;
        Ok(())
    }

    async fn deactivate_totp_credentials(&self, user_id: &UserId) -> AuthResult<u64> {
        let mut state = self.state();
        let mut deactivated = 0;
        for credential in state
            .totp_credentials
            .values_mut()
            .filter(|c| &c.user_id == user_id && c.active)
        {
            credential.active = false;
            deactivated += 1;
        }
        Ok(deactivated)
    }
}

impl GrantRepository for InMemoryAuthRepository {
    async fn find_role_by_code(&self, code: &str) -> AuthResult<Option<Role>> {
        Ok(self
            .state()
            .roles
            .values()
            .find(|r| r.code == code)
            .cloned())
    }

    async fn find_permission_codes_by_roles(&self, role_ids: &[RoleId]) -> AuthResult<Vec<String>> {
        let state = self.state();
        let codes: BTreeSet<String> = state
            .role_permissions
            .iter()
            .filter(|rp| role_ids.contains(&rp.role_id))
            .filter_map(|rp| state.permissions.get(&rp.permission_id))
            .map(|p| p.code.clone())
            .collect();
        Ok(codes.into_iter().collect())
    }

    async fn find_global_grants(&self, user_id: &UserId) -> AuthResult<Vec<GlobalRoleGrant>> {
        Ok(self
            .state()
            .global_grants
            .iter()
            .filter(|g| &g.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_application_grants(
        &self,
        user_id: &UserId,
        application_id: &ApplicationId,
    ) -> AuthResult<Vec<ApplicationRoleGrant>> {
        Ok(self
            .state()
            .application_grants
            .iter()
            .filter(|g| &g.user_id == user_id && &g.application_id == application_id)
            .cloned()
            .collect())
    }

    async fn find_merchant_grants(&self, user_id: &UserId) -> AuthResult<Vec<MerchantRoleGrant>> {
        Ok(self
            .state()
            .merchant_grants
            .iter()
            .filter(|g| &g.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_global_grant(&self, grant: &GlobalRoleGrant) -> AuthResult<()> {
        let mut state = self.state();
        state
            .global_grants
            .retain(|g| !(g.user_id == grant.user_id && g.role_id == grant.role_id));
        state.global_grants.push(grant.clone());
        Ok(())
    }
}

impl ApplicationRepository for InMemoryAuthRepository {
    async fn find_application_by_code(&self, code: &str) -> AuthResult<Option<Application>> {
        Ok(self
            .state()
            .applications
            .values()
            .find(|a| a.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn find_application_by_id(
        &self,
        application_id: &ApplicationId,
    ) -> AuthResult<Option<Application>> {
        Ok(self.state().applications.get(application_id).cloned())
    }
}

impl AuditSink for InMemoryAuthRepository {
    async fn record_access(&self, event: &AccessAuditEvent) -> AuthResult<()> {
        let mut state = self.state();
        if state.fail_audit {
            return Err(AuthError::Internal("Audit sink unavailable".to_string()));
        }

        tracing::info!(
            target: "audit",
            user_id = ?event.user_id.map(|id| id.to_string()),
            merchant_id = ?event.merchant_id.map(|id| id.to_string()),
            allowed = event.allowed,
            permission = ?event.required_permission,
            path = ?event.request.path,
            "Access decision"
        );
        state.audit_events.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::user_password::RawPassword;
    use chrono::Duration;
    use platform::client::ClientInfo;

    fn user(email: &str) -> User {
        let raw = RawPassword::new("Correct-Horse-9".to_string()).unwrap();
        User::new(
            Email::new(email).unwrap(),
            UserPassword::from_raw(&raw, None).unwrap(),
            None,
        )
    }

    fn session(user_id: UserId) -> AuthSession {
        AuthSession::new(
            user_id,
            vec![1; 32],
            &ClientInfo::default(),
            None,
            Duration::days(30),
        )
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let repo = InMemoryAuthRepository::new();
        repo.insert_user(&user("a@example.com")).await.unwrap();
        let err = repo.insert_user(&user("A@Example.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_bump_is_monotonic() {
        let repo = InMemoryAuthRepository::new();
        let u = user("a@example.com");
        repo.insert_user(&u).await.unwrap();

        assert_eq!(repo.bump_auth_state_version(&u.user_id).await.unwrap(), 1);
        assert_eq!(repo.bump_auth_state_version(&u.user_id).await.unwrap(), 2);
        assert_eq!(
            repo.find_auth_state_version(&u.user_id).await.unwrap(),
            Some(2)
        );
        assert!(matches!(
            repo.bump_auth_state_version(&UserId::new()).await,
            Err(AuthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rotation_is_compare_and_swap() {
        let repo = InMemoryAuthRepository::new();
        let s = session(UserId::new());
        repo.insert_session(&s).await.unwrap();

        let rotation = |expected: Vec<u8>, new: Vec<u8>| SessionRotation {
            session_id: s.session_id,
            expected_hash: expected,
            new_hash: new,
            expires_at: s.expires_at,
            ip_address: None,
            user_agent: None,
            rotated_at: Utc::now(),
        };

        assert!(repo.rotate_session(&rotation(vec![1; 32], vec![2; 32])).await.unwrap());
        // second writer holding the old hash loses
        assert!(!repo.rotate_session(&rotation(vec![1; 32], vec![3; 32])).await.unwrap());

        let stored = repo.find_session(&s.session_id).await.unwrap().unwrap();
        assert_eq!(stored.rotation_secret_hash, vec![2; 32]);
    }

    #[tokio::test]
    async fn test_revoked_session_cannot_rotate() {
        let repo = InMemoryAuthRepository::new();
        let s = session(UserId::new());
        repo.insert_session(&s).await.unwrap();

        assert!(repo.revoke_session(&s.session_id, Utc::now()).await.unwrap());
        assert!(!repo.revoke_session(&s.session_id, Utc::now()).await.unwrap());

        let rotation = SessionRotation {
            session_id: s.session_id,
            expected_hash: vec![1; 32],
            new_hash: vec![2; 32],
            expires_at: s.expires_at,
            ip_address: None,
            user_agent: None,
            rotated_at: Utc::now(),
        };
        assert!(!repo.rotate_session(&rotation).await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_auth_state_only_touches_active_sessions_of_user() {
        let repo = InMemoryAuthRepository::new();
        let u = user("a@example.com");
        repo.insert_user(&u).await.unwrap();
        let a = session(u.user_id);
        let b = session(u.user_id);
        let other = session(UserId::new());
        for s in [&a, &b, &other] {
            repo.insert_session(s).await.unwrap();
        }
        repo.revoke_session(&a.session_id, Utc::now()).await.unwrap();

        let (revoked, asv) = repo
            .reset_auth_state(&u.user_id, None, Utc::now())
            .await
            .unwrap();
        assert_eq!((revoked, asv), (1, 1));
        let other = repo.find_session(&other.session_id).await.unwrap().unwrap();
        assert!(other.is_active());
    }

    #[tokio::test]
    async fn test_reset_auth_state_stores_new_password() {
        let repo = InMemoryAuthRepository::new();
        let u = user("a@example.com");
        repo.insert_user(&u).await.unwrap();
        repo.insert_session(&session(u.user_id)).await.unwrap();

        let raw = RawPassword::new("Battery-Staple-7".to_string()).unwrap();
        let hashed = UserPassword::from_raw(&raw, None).unwrap();
        repo.reset_auth_state(&u.user_id, Some(&hashed), Utc::now())
            .await
            .unwrap();

        let stored = repo.find_user_by_id(&u.user_id).await.unwrap().unwrap();
        assert!(stored.password.verify(&raw, None));
        assert_eq!(stored.auth_state_version, 1);
        assert!(
            repo.find_sessions_by_user(&u.user_id)
                .await
                .unwrap()
                .iter()
                .all(|s| !s.is_active())
        );
    }

    #[tokio::test]
    async fn test_reset_auth_state_unknown_user_changes_nothing() {
        let repo = InMemoryAuthRepository::new();
        let user_id = UserId::new();
        let s = session(user_id);
        repo.insert_session(&s).await.unwrap();

        assert!(matches!(
            repo.reset_auth_state(&user_id, None, Utc::now()).await,
            Err(AuthError::NotFound(_))
        ));
        assert!(repo.find_session(&s.session_id).await.unwrap().unwrap().is_active());
    }

    #[tokio::test]
    async fn test_second_active_totp_credential_conflicts() {
        let repo = InMemoryAuthRepository::new();
        let user_id = UserId::new();
        let first = TotpCredential::new(user_id, "MiniPSP-Auth", "a@example.com");
        repo.insert_totp_credential(&first).await.unwrap();

        let second = TotpCredential::new(user_id, "MiniPSP-Auth", "a@example.com");
        assert!(matches!(
            repo.insert_totp_credential(&second).await,
            Err(AuthError::Conflict(_))
        ));

        let active = repo.find_active_totp_credential(&user_id).await.unwrap().unwrap();
        assert_eq!(active.credential_id, first.credential_id);

        // once the first is gone a new one may take its place
        repo.deactivate_totp_credentials(&user_id).await.unwrap();
        repo.insert_totp_credential(&second).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_full_name() {
        let repo = InMemoryAuthRepository::new();
        let u = user("a@example.com");
        repo.insert_user(&u).await.unwrap();

        repo.update_full_name(&u.user_id, Some("Ada Lovelace")).await.unwrap();
        let stored = repo.find_user_by_id(&u.user_id).await.unwrap().unwrap();
        assert_eq!(stored.full_name.as_deref(), Some("Ada Lovelace"));

        assert!(matches!(
            repo.update_full_name(&UserId::new(), None).await,
            Err(AuthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_application_lookup_ignores_case() {
        let repo = InMemoryAuthRepository::new();
        let id = repo.insert_application("MiniPSP");
        let found = repo.find_application_by_code("minipsp").await.unwrap().unwrap();
        assert_eq!(found.application_id, id);
        assert_eq!(found.code, "MINIPSP");
    }
}
