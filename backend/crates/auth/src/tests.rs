//! Flow tests across use cases, against the in-memory store

#[cfg(test)]
mod support {
    use std::sync::Arc;

    use platform::client::ClientInfo;

    use crate::application::{
        AuthConfig, AuthenticateUseCase, LoginOutcome, RefreshUseCase, SignInInput,
        SignInUseCase, SignOutUseCase, SignUpInput, SignUpUseCase, TokenPair, TokenService,
        TotpUseCase,
    };
    use crate::domain::value_object::UserId;
    use crate::infra::memory::InMemoryAuthRepository;

    pub const PASSWORD: &str = "Correct-Horse-9";

    pub struct Harness {
        pub repo: Arc<InMemoryAuthRepository>,
        pub config: Arc<AuthConfig>,
        pub tokens: Arc<TokenService>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_config(|_| {})
        }

        pub fn with_config(configure: impl FnOnce(&mut AuthConfig)) -> Self {
            let mut config = AuthConfig::with_random_secret();
            configure(&mut config);
            let tokens = TokenService::new(&config).unwrap();

            Self {
                repo: Arc::new(InMemoryAuthRepository::new()),
                config: Arc::new(config),
                tokens: Arc::new(tokens),
            }
        }

        pub fn client() -> ClientInfo {
            ClientInfo {
                ip: Some("192.0.2.10".parse().unwrap()),
                user_agent: Some("flow-test".to_string()),
            }
        }

        pub async fn register(&self, email: &str) -> UserId {
            SignUpUseCase::new(self.repo.clone(), self.config.clone())
                .execute(SignUpInput {
                    email: email.to_string(),
                    password: PASSWORD.to_string(),
                    full_name: None,
                })
                .await
                .unwrap()
                .user_id
        }

        pub fn sign_in(&self) -> SignInUseCase<InMemoryAuthRepository> {
            SignInUseCase::new(self.repo.clone(), self.tokens.clone(), self.config.clone())
        }

        pub fn refresh(&self) -> RefreshUseCase<InMemoryAuthRepository> {
            RefreshUseCase::new(self.repo.clone(), self.tokens.clone(), self.config.clone())
        }

        pub fn sign_out(&self) -> SignOutUseCase<InMemoryAuthRepository> {
            SignOutUseCase::new(self.repo.clone())
        }

        pub fn authenticate(&self) -> AuthenticateUseCase<InMemoryAuthRepository> {
            AuthenticateUseCase::new(self.repo.clone(), self.tokens.clone())
        }

        pub fn totp(&self) -> TotpUseCase<InMemoryAuthRepository> {
            TotpUseCase::new(self.repo.clone(), self.config.clone())
        }

        pub async fn login_outcome(&self, email: &str, app_code: Option<&str>) -> LoginOutcome {
            self.sign_in()
                .login(
                    SignInInput {
                        email: email.to_string(),
                        password: PASSWORD.to_string(),
                        app_code: app_code.map(str::to_string),
                    },
                    &Self::client(),
                )
                .await
                .unwrap()
        }

        pub async fn login(&self, email: &str) -> TokenPair {
            match self.login_outcome(email, None).await {
                LoginOutcome::Authenticated(pair) => pair,
                other => panic!("expected tokens, got {other:?}"),
            }
        }
    }
}

#[cfg(test)]
mod orchestrator_tests {
    use super::support::{Harness, PASSWORD};
    use crate::application::{LoginOutcome, SignInInput};
    use crate::domain::entity::auth_session::SessionStatus;
    use crate::domain::repository::{SessionRepository, UserRepository};
    use crate::domain::value_object::{MerchantId, refresh_token::RefreshToken};
    use crate::error::AuthError;

    #[tokio::test]
    async fn test_login_issues_token_pair_with_current_asv() {
        let h = Harness::new();
        let user_id = h.register("ada@example.com").await;

        let pair = h.login("ada@example.com").await;
        assert_eq!(pair.expires_in, 600);

        let claims = h.tokens.verify_access_token(&pair.access_token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.asv, 0);
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));

        let token = RefreshToken::parse(&pair.refresh_token).unwrap();
        let session = h.repo.find_session(&token.session_id()).await.unwrap().unwrap();
        assert!(session.is_active());
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.ip_address.as_deref(), Some("192.0.2.10"));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let h = Harness::new();
        h.register("ada@example.com").await;
        let sign_in = h.sign_in();

        for (email, password) in [
            ("ada@example.com", "Wrong-Horse-9"),
            ("nobody@example.com", PASSWORD),
            ("not-an-email", PASSWORD),
            ("ada@example.com", "x"),
        ] {
            let result = sign_in
                .login(
                    SignInInput {
                        email: email.to_string(),
                        password: password.to_string(),
                        app_code: None,
                    },
                    &Harness::client(),
                )
                .await;
            assert!(matches!(result, Err(AuthError::InvalidCredential)), "{email}");
        }
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_keeps_session_id() {
        let h = Harness::new();
        h.register("ada@example.com").await;
        let first = h.login("ada@example.com").await;

        let second = h.refresh().execute(&first.refresh_token, &Harness::client()).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        let a = RefreshToken::parse(&first.refresh_token).unwrap();
        let b = RefreshToken::parse(&second.refresh_token).unwrap();
        assert_eq!(a.session_id(), b.session_id());

        assert!(h.authenticate().execute(&second.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_replay_is_rejected_and_revokes_session() {
        let h = Harness::new();
        h.register("ada@example.com").await;
        let first = h.login("ada@example.com").await;
        let refresh = h.refresh();

        let second = refresh.execute(&first.refresh_token, &Harness::client()).await.unwrap();

        let replay = refresh.execute(&first.refresh_token, &Harness::client()).await;
        assert!(matches!(replay, Err(AuthError::InvalidCredential)));

        // The legitimate holder is cut off too
        let after = refresh.execute(&second.refresh_token, &Harness::client()).await;
        assert!(matches!(after, Err(AuthError::InvalidCredential)));
    }

    #[tokio::test]
    async fn test_refresh_replay_without_revocation() {
        let h = Harness::with_config(|c| c.revoke_session_on_refresh_reuse = false);
        h.register("ada@example.com").await;
        let first = h.login("ada@example.com").await;
        let refresh = h.refresh();

        let second = refresh.execute(&first.refresh_token, &Harness::client()).await.unwrap();
        assert!(refresh.execute(&first.refresh_token, &Harness::client()).await.is_err());
        assert!(refresh.execute(&second.refresh_token, &Harness::client()).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_of_expired_session_marks_it_expired() {
        let h = Harness::with_config(|c| c.refresh_token_ttl = std::time::Duration::ZERO);
        h.register("ada@example.com").await;
        let pair = h.login("ada@example.com").await;

        let result = h.refresh().execute(&pair.refresh_token, &Harness::client()).await;
        assert!(matches!(result, Err(AuthError::InvalidCredential)));

        let session_id = RefreshToken::parse(&pair.refresh_token).unwrap().session_id();
        let session = h.repo.find_session(&session_id).await.unwrap().unwrap();
        assert!(!session.is_active());
        assert!(session.revoked_at.is_none());
    }

    #[tokio::test]
    async fn test_refresh_rejects_garbage() {
        let h = Harness::new();
        let refresh = h.refresh();

        for raw in [
            "",
            "no-dot",
            "not-a-uuid.abc",
            "00000000-0000-0000-0000-000000000000.abc",
            "00000000-0000-0000-0000-000000000000.",
        ] {
            let result = refresh.execute(raw, &Harness::client()).await;
            assert!(matches!(result, Err(AuthError::InvalidCredential)), "{raw:?}");
        }
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let h = Harness::new();
        h.register("ada@example.com").await;
        let pair = h.login("ada@example.com").await;
        let sign_out = h.sign_out();

        sign_out.logout(&pair.refresh_token).await.unwrap();
        sign_out.logout(&pair.refresh_token).await.unwrap();
        sign_out.logout("garbage").await.unwrap();

        let result = h.refresh().execute(&pair.refresh_token, &Harness::client()).await;
        assert!(matches!(result, Err(AuthError::InvalidCredential)));
    }

    #[tokio::test]
    async fn test_logout_with_stale_secret_revokes_session() {
        let h = Harness::with_config(|c| c.revoke_session_on_refresh_reuse = false);
        h.register("ada@example.com").await;
        let first = h.login("ada@example.com").await;
        let second = h.refresh().execute(&first.refresh_token, &Harness::client()).await.unwrap();

        h.sign_out().logout(&first.refresh_token).await.unwrap();

        let session_id = RefreshToken::parse(&first.refresh_token).unwrap().session_id();
        let session = h.repo.find_session(&session_id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Revoked);
        assert!(h.refresh().execute(&second.refresh_token, &Harness::client()).await.is_err());
    }

    #[tokio::test]
    async fn test_logout_all_invalidates_every_access_token() {
        let h = Harness::new();
        let user_id = h.register("ada@example.com").await;
        let laptop = h.login("ada@example.com").await;
        let phone = h.login("ada@example.com").await;

        let authenticate = h.authenticate();
        assert!(authenticate.execute(&laptop.access_token).await.is_ok());

        let revoked = h.sign_out().logout_all(&user_id).await.unwrap();
        assert_eq!(revoked, 2);
        assert_eq!(h.repo.find_auth_state_version(&user_id).await.unwrap(), Some(1));

        for pair in [&laptop, &phone] {
            assert!(matches!(
                authenticate.execute(&pair.access_token).await,
                Err(AuthError::InvalidCredential)
            ));
            assert!(h.refresh().execute(&pair.refresh_token, &Harness::client()).await.is_err());
        }

        // A fresh login carries the new ASV
        let again = h.login("ada@example.com").await;
        let ctx = authenticate.execute(&again.access_token).await.unwrap();
        assert_eq!(ctx.user_id, user_id);
        assert_eq!(h.tokens.verify_access_token(&again.access_token).unwrap().asv, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_refresh_racing_logout_all_never_outlives_it() {
        let h = Harness::new();
        let user_id = h.register("ada@example.com").await;

        for _ in 0..10 {
            let pair = h.login("ada@example.com").await;

            let refresh = h.refresh();
            let refresh_token = pair.refresh_token.clone();
            let refreshing = tokio::spawn(async move {
                refresh.execute(&refresh_token, &Harness::client()).await
            });
            let sign_out = h.sign_out();
            let signing_out = tokio::spawn(async move { sign_out.logout_all(&user_id).await });

            let refreshed = refreshing.await.unwrap();
            signing_out.await.unwrap().unwrap();

            // Whichever order the steps interleaved in, nothing minted by the
            // refresh survives the logout-all
            if let Ok(next) = refreshed {
                assert!(h.authenticate().execute(&next.access_token).await.is_err());
                assert!(
                    h.refresh()
                        .execute(&next.refresh_token, &Harness::client())
                        .await
                        .is_err()
                );
            }
            assert!(h.authenticate().execute(&pair.access_token).await.is_err());
        }
    }

    #[tokio::test]
    async fn test_logout_all_twice_keeps_bumping() {
        let h = Harness::new();
        let user_id = h.register("ada@example.com").await;

        assert_eq!(h.sign_out().logout_all(&user_id).await.unwrap(), 0);
        assert_eq!(h.sign_out().logout_all(&user_id).await.unwrap(), 0);
        assert_eq!(h.repo.find_auth_state_version(&user_id).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_access_token_carries_resolved_authority() {
        let h = Harness::new();
        let user_id = h.register("ada@example.com").await;

        let app = h.repo.insert_application("AUTH");
        let auditor = h.repo.insert_role("AUDITOR");
        h.repo.grant_role_permission(auditor, "audit.view");
        let finance = h.repo.insert_role("FINANCE");
        h.repo.grant_role_permission(finance, "invoice.read_org");
        let merchant_role = h.repo.insert_role("MERCHANT_VIEWER");

        let merchant = MerchantId::new();
        h.repo.grant_global_role(user_id, auditor, None);
        h.repo.grant_application_role(user_id, app, finance, None);
        h.repo.grant_merchant_role(user_id, merchant, merchant_role, None);

        let pair = h.login("ada@example.com").await;
        let claims = h.tokens.verify_access_token(&pair.access_token).unwrap();

        assert_eq!(claims.perms, vec!["audit.view", "invoice.read_org"]);
        assert_eq!(claims.merchant_ids, vec![merchant]);
        assert_eq!(claims.app.as_deref(), Some("AUTH"));

        // Refresh keeps the application context of the session
        let next = h.refresh().execute(&pair.refresh_token, &Harness::client()).await.unwrap();
        let claims = h.tokens.verify_access_token(&next.access_token).unwrap();
        assert_eq!(claims.app.as_deref(), Some("AUTH"));
        assert!(claims.perms.contains(&"invoice.read_org".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_application_logs_in_without_app_context() {
        let h = Harness::new();
        h.register("ada@example.com").await;

        let LoginOutcome::Authenticated(pair) =
            h.login_outcome("ada@example.com", Some("nope")).await
        else {
            panic!("expected tokens");
        };

        let claims = h.tokens.verify_access_token(&pair.access_token).unwrap();
        assert!(claims.app.is_none());
        assert!(claims.perms.is_empty());
    }
}

#[cfg(test)]
mod mfa_tests {
    use super::support::Harness;
    use crate::application::{LoginOutcome, TotpSignInInput, TotpUseCase};
    use crate::domain::repository::{SessionRepository, TotpCredentialRepository};
    use crate::domain::value_object::{UserId, totp_secret::unix_now};
    use crate::error::AuthError;
    use crate::infra::memory::InMemoryAuthRepository;

    fn mfa_harness() -> Harness {
        Harness::with_config(|c| c.totp.enabled = true)
    }

    async fn current_code(h: &Harness, user_id: &UserId) -> String {
        let credential = h
            .repo
            .find_active_totp_credential(user_id)
            .await
            .unwrap()
            .unwrap();
        credential
            .secret
            .generate_at(&h.config.totp.policy(), unix_now().unwrap())
            .unwrap()
    }

    async fn enable_totp(h: &Harness, totp: &TotpUseCase<InMemoryAuthRepository>, user_id: &UserId) {
        let enrollment = totp.enroll(user_id).await.unwrap();
        let code = current_code(h, user_id).await;
        totp.confirm(user_id, &enrollment.credential_id, &code).await.unwrap();
    }

    async fn login_token(h: &Harness) -> String {
        match h.login_outcome("ada@example.com", None).await {
            LoginOutcome::MfaRequired { login_token } => login_token,
            other => panic!("expected step-up, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mfa_login_withholds_tokens_until_code() {
        let h = mfa_harness();
        let user_id = h.register("ada@example.com").await;
        let totp = h.totp();
        enable_totp(&h, &totp, &user_id).await;

        let login_token = login_token(&h).await;
        assert!(h.repo.find_sessions_by_user(&user_id).await.unwrap().is_empty());

        let code = current_code(&h, &user_id).await;
        let pair = h
            .sign_in()
            .login_with_totp(
                TotpSignInInput {
                    login_token,
                    code,
                    app_code: None,
                },
                &Harness::client(),
            )
            .await
            .unwrap();

        // Confirming MFA bumped the ASV once
        let claims = h.tokens.verify_access_token(&pair.access_token).unwrap();
        assert_eq!(claims.asv, 1);
        assert_eq!(h.repo.find_sessions_by_user(&user_id).await.unwrap().len(), 1);
        assert!(h.authenticate().execute(&pair.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_code_is_invalid_credential() {
        let h = mfa_harness();
        let user_id = h.register("ada@example.com").await;
        enable_totp(&h, &h.totp(), &user_id).await;

        let result = h
            .sign_in()
            .login_with_totp(
                TotpSignInInput {
                    login_token: login_token(&h).await,
                    code: "000000x".to_string(),
                    app_code: None,
                },
                &Harness::client(),
            )
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredential)));
        assert!(h.repo.find_sessions_by_user(&user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_step_up_token_is_not_an_access_token() {
        let h = mfa_harness();
        let user_id = h.register("ada@example.com").await;
        enable_totp(&h, &h.totp(), &user_id).await;

        let login_token = login_token(&h).await;
        assert!(matches!(
            h.authenticate().execute(&login_token).await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn test_access_token_is_not_a_step_up_token() {
        let h = mfa_harness();
        h.register("ada@example.com").await;
        let pair = h.login("ada@example.com").await;

        let result = h
            .sign_in()
            .login_with_totp(
                TotpSignInInput {
                    login_token: pair.access_token,
                    code: "123456".to_string(),
                    app_code: None,
                },
                &Harness::client(),
            )
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredential)));
    }

    #[tokio::test]
    async fn test_mfa_disabled_between_steps() {
        let h = mfa_harness();
        let user_id = h.register("ada@example.com").await;
        let totp = h.totp();
        enable_totp(&h, &totp, &user_id).await;

        let login_token = login_token(&h).await;
        totp.disable(&user_id, Some("lost phone")).await.unwrap();

        let result = h
            .sign_in()
            .login_with_totp(
                TotpSignInInput {
                    login_token,
                    code: "123456".to_string(),
                    app_code: None,
                },
                &Harness::client(),
            )
            .await;
        assert!(matches!(result, Err(AuthError::InvalidState(_))));

        // Plain password login works again
        assert!(matches!(
            h.login_outcome("ada@example.com", None).await,
            LoginOutcome::Authenticated(_)
        ));
    }

    #[tokio::test]
    async fn test_feature_switch_off_skips_step_up() {
        let h = Harness::new();
        let user_id = h.register("ada@example.com").await;

        assert!(matches!(h.totp().enroll(&user_id).await, Err(AuthError::FeatureDisabled)));
        assert!(matches!(
            h.login_outcome("ada@example.com", None).await,
            LoginOutcome::Authenticated(_)
        ));

        let result = h
            .sign_in()
            .login_with_totp(
                TotpSignInInput {
                    login_token: "anything".to_string(),
                    code: "123456".to_string(),
                    app_code: None,
                },
                &Harness::client(),
            )
            .await;
        assert!(matches!(result, Err(AuthError::FeatureDisabled)));
    }

    #[tokio::test]
    async fn test_pending_enrollment_does_not_require_step_up() {
        let h = mfa_harness();
        let user_id = h.register("ada@example.com").await;
        h.totp().enroll(&user_id).await.unwrap();

        assert!(matches!(
            h.login_outcome("ada@example.com", None).await,
            LoginOutcome::Authenticated(_)
        ));
    }
}

#[cfg(test)]
mod account_tests {
    use super::support::{Harness, PASSWORD};
    use crate::application::{
        ChangePasswordInput, ChangePasswordUseCase, LoginOutcome, ManageSessionsUseCase,
        SignInInput,
    };
    use crate::domain::repository::UserRepository;
    use crate::domain::value_object::refresh_token::RefreshToken;
    use crate::error::AuthError;

    #[tokio::test]
    async fn test_change_password_signs_out_everywhere() {
        let h = Harness::new();
        let user_id = h.register("ada@example.com").await;
        let pair = h.login("ada@example.com").await;

        let use_case = ChangePasswordUseCase::new(h.repo.clone(), h.config.clone());
        let revoked = use_case
            .execute(
                &user_id,
                ChangePasswordInput {
                    current_password: PASSWORD.to_string(),
                    new_password: "Battery-Staple-42".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(revoked, 1);
        assert_eq!(h.repo.find_auth_state_version(&user_id).await.unwrap(), Some(1));

        assert!(h.authenticate().execute(&pair.access_token).await.is_err());
        assert!(h.refresh().execute(&pair.refresh_token, &Harness::client()).await.is_err());

        // Only the new password signs in now
        let result = h
            .sign_in()
            .login(
                SignInInput {
                    email: "ada@example.com".to_string(),
                    password: PASSWORD.to_string(),
                    app_code: None,
                },
                &Harness::client(),
            )
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredential)));
        let result = h
            .sign_in()
            .login(
                SignInInput {
                    email: "ada@example.com".to_string(),
                    password: "Battery-Staple-42".to_string(),
                    app_code: None,
                },
                &Harness::client(),
            )
            .await;
        assert!(matches!(result, Ok(LoginOutcome::Authenticated(_))));
    }

    #[tokio::test]
    async fn test_change_password_requires_current_password() {
        let h = Harness::new();
        let user_id = h.register("ada@example.com").await;

        let use_case = ChangePasswordUseCase::new(h.repo.clone(), h.config.clone());
        let result = use_case
            .execute(
                &user_id,
                ChangePasswordInput {
                    current_password: "Wrong-Horse-9".to_string(),
                    new_password: "Battery-Staple-42".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredential)));

        // Old password still works
        h.login("ada@example.com").await;
    }

    #[tokio::test]
    async fn test_revoke_one_session_leaves_others() {
        let h = Harness::new();
        let user_id = h.register("ada@example.com").await;
        let laptop = h.login("ada@example.com").await;
        let phone = h.login("ada@example.com").await;

        let sessions = ManageSessionsUseCase::new(h.repo.clone());
        assert_eq!(sessions.list(&user_id).await.unwrap().len(), 2);

        let laptop_session = RefreshToken::parse(&laptop.refresh_token).unwrap().session_id();
        sessions.revoke(&user_id, &laptop_session).await.unwrap();

        assert!(h.refresh().execute(&laptop.refresh_token, &Harness::client()).await.is_err());
        assert!(h.refresh().execute(&phone.refresh_token, &Harness::client()).await.is_ok());
    }
}

#[cfg(test)]
mod guard_tests {
    use std::sync::Arc;

    use crate::application::{AccessGuard, AuthContext};
    use crate::domain::entity::access_audit::RequestMeta;
    use crate::domain::value_object::{MerchantId, SessionId, UserId};
    use crate::error::AuthError;
    use crate::infra::memory::InMemoryAuthRepository;

    fn context(permissions: &[&str], merchants: &[MerchantId]) -> AuthContext {
        let mut permissions: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
        permissions.sort();
        AuthContext {
            user_id: UserId::new(),
            email: Some("ada@example.com".to_string()),
            permissions,
            merchant_ids: merchants.to_vec(),
            app_code: Some("AUTH".to_string()),
            session_id: SessionId::new(),
            token_id: "jti-1".to_string(),
        }
    }

    fn request() -> RequestMeta {
        RequestMeta {
            http_method: Some("GET".to_string()),
            path: Some("/merchants/x/invoices".to_string()),
            client_ip: Some("192.0.2.10".to_string()),
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn test_every_decision_is_audited() {
        let repo = Arc::new(InMemoryAuthRepository::new());
        let guard = AccessGuard::new(repo.clone());
        let merchant = MerchantId::new();
        let ctx = context(&["invoice.read_org"], &[merchant]);

        assert!(guard.check(Some(&ctx), "invoice.read_org", Some(merchant), &request()).await);
        assert!(!guard.check(Some(&ctx), "invoice.write", Some(merchant), &request()).await);
        assert!(!guard.check(Some(&ctx), "invoice.read_org", Some(MerchantId::new()), &request()).await);
        assert!(!guard.check(None, "invoice.read_org", None, &request()).await);
        assert!(!guard.check(Some(&ctx), "  ", None, &request()).await);

        let events = repo.audit_events();
        assert_eq!(events.len(), 5);
        assert_eq!(
            events.iter().map(|e| e.allowed).collect::<Vec<_>>(),
            vec![true, false, false, false, false]
        );
        assert_eq!(
            events.iter().map(|e| e.note.as_deref()).collect::<Vec<_>>(),
            vec![
                None,
                Some("missing permission"),
                Some("merchant out of scope"),
                Some("unauthenticated"),
                Some("no permission specified"),
            ]
        );

        let first = &events[0];
        assert_eq!(first.user_id, Some(ctx.user_id));
        assert_eq!(first.merchant_id, Some(merchant));
        assert_eq!(first.token_id.as_deref(), Some("jti-1"));
        assert_eq!(first.request.path.as_deref(), Some("/merchants/x/invoices"));

        assert!(events[3].user_id.is_none());
        assert!(events[4].required_permission.is_none());
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_change_decision() {
        let repo = Arc::new(InMemoryAuthRepository::new());
        repo.set_audit_failure(true);
        let guard = AccessGuard::new(repo.clone());
        let merchant = MerchantId::new();
        let ctx = context(&["invoice.read_org"], &[merchant]);

        assert!(guard.check(Some(&ctx), "invoice.read_org", Some(merchant), &request()).await);
        assert!(!guard.check(Some(&ctx), "invoice.write", None, &request()).await);
        assert!(guard.has_merchant(Some(&ctx), merchant, &request()).await);
        assert!(repo.audit_events().is_empty());
    }

    #[tokio::test]
    async fn test_has_merchant_and_require() {
        let repo = Arc::new(InMemoryAuthRepository::new());
        let guard = AccessGuard::new(repo.clone());
        let merchant = MerchantId::new();
        let ctx = context(&["audit.view"], &[merchant]);

        assert!(guard.has_merchant(Some(&ctx), merchant, &request()).await);
        assert!(!guard.has_merchant(Some(&ctx), MerchantId::new(), &request()).await);
        assert!(!guard.has_merchant(None, merchant, &request()).await);

        assert!(guard.require(Some(&ctx), "audit.view", None, &request()).await.is_ok());
        assert!(matches!(
            guard.require(Some(&ctx), "invoice.write", None, &request()).await,
            Err(AuthError::Forbidden(_))
        ));
        assert!(matches!(
            guard.require_merchant(None, merchant, &request()).await,
            Err(AuthError::Forbidden(_))
        ));

        assert_eq!(repo.audit_events().len(), 6);
    }
}

#[cfg(test)]
mod router_tests {
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::application::{AuthConfig, SESSION_ADMIN_PERMISSION};
    use crate::domain::value_object::{MerchantId, UserId, refresh_token::RefreshToken};
    use crate::infra::memory::InMemoryAuthRepository;
    use crate::presentation::router::auth_router;

    fn app(repo: &InMemoryAuthRepository) -> Router {
        auth_router(repo.clone(), AuthConfig::with_random_secret()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn authorized(method: &str, uri: &str, bearer: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {bearer}"));
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn register_as(app: &Router, email: &str) -> UserId {
        let (status, body) = send(
            app,
            post_json(
                "/auth/register",
                json!({ "email": email, "password": "Correct-Horse-9" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().parse().unwrap()
    }

    async fn login_as(app: &Router, email: &str) -> Value {
        let (status, body) = send(
            app,
            post_json(
                "/auth/login",
                json!({ "email": email, "password": "Correct-Horse-9" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    async fn register(app: &Router) -> UserId {
        register_as(app, "Ada@Example.com").await
    }

    async fn login(app: &Router) -> Value {
        login_as(app, "ada@example.com").await
    }

    async fn register_and_login(app: &Router) -> Value {
        register(app).await;
        login(app).await
    }

    #[tokio::test]
    async fn test_register_login_and_scope() {
        let repo = InMemoryAuthRepository::new();
        let app = app(&repo);

        let login = register_and_login(&app).await;
        assert_eq!(login["loginStatus"], "OK");
        assert!(login.get("loginToken").is_none());
        let access = login["accessToken"].as_str().unwrap();

        let (status, scope) = send(&app, get("/me/scope", Some(access))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(scope["email"], "ada@example.com");
        assert_eq!(scope["permissions"], json!([]));
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let repo = InMemoryAuthRepository::new();
        let app = app(&repo);
        register_and_login(&app).await;

        let (status, _) = send(
            &app,
            post_json(
                "/auth/register",
                json!({ "email": "ada@example.com", "password": "Another-Horse-7" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_protected_routes_require_bearer() {
        let repo = InMemoryAuthRepository::new();
        let app = app(&repo);

        let (status, _) = send(&app, get("/me/scope", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, get("/me/sessions", Some("not.a.jwt"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_and_logout_over_http() {
        let repo = InMemoryAuthRepository::new();
        let app = app(&repo);
        let login = register_and_login(&app).await;
        let refresh_token = login["refreshToken"].as_str().unwrap().to_string();

        let (status, rotated) = send(
            &app,
            post_json("/auth/refresh", json!({ "refreshToken": refresh_token })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rotated["tokenType"], "Bearer");
        let rotated_refresh = rotated["refreshToken"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            post_json("/auth/refresh", json!({ "refreshToken": refresh_token })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            post_json("/auth/logout", json!({ "refreshToken": rotated_refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_logout_all_over_http() {
        let repo = InMemoryAuthRepository::new();
        let app = app(&repo);
        let login = register_and_login(&app).await;
        let access = login["accessToken"].as_str().unwrap();

        let (status, body) =
            send(&app, authorized("POST", "/auth/logout-all", access, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessionsRevoked"], 1);

        let (status, _) = send(&app, get("/me/scope", Some(access))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_scope_check_is_audited_for_anonymous_callers() {
        let repo = InMemoryAuthRepository::new();
        let app = app(&repo);
        let merchant = MerchantId::new();

        let (status, body) = send(
            &app,
            get(&format!("/merchants/{merchant}/scope-check?perm=invoice.read_org"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allowed"], false);

        let events = repo.audit_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].merchant_id, Some(merchant));
        assert_eq!(events[0].note.as_deref(), Some("unauthenticated"));
        assert_eq!(events[0].request.http_method.as_deref(), Some("GET"));
    }

    #[tokio::test]
    async fn test_scope_check_with_merchant_grant() {
        let repo = InMemoryAuthRepository::new();
        let app = app(&repo);
        let user_id = register(&app).await;

        let merchant = MerchantId::new();
        let role = repo.insert_role("MERCHANT_ADMIN");
        repo.grant_role_permission(role, "invoice.read_org");
        repo.grant_merchant_role(user_id, merchant, role, None);

        let login = login(&app).await;
        let access = login["accessToken"].as_str().unwrap();

        let (_, body) = send(
            &app,
            get(
                &format!("/merchants/{merchant}/scope-check?perm=invoice.read_org"),
                Some(access),
            ),
        )
        .await;
        assert_eq!(body["allowed"], true);

        let (_, body) = send(
            &app,
            get(&format!("/merchants/{}/scope-check", MerchantId::new()), Some(access)),
        )
        .await;
        assert_eq!(body["allowed"], false);

        let events = repo.audit_events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.user_id == Some(user_id)));
    }

    #[tokio::test]
    async fn test_profile_read_and_update() {
        let repo = InMemoryAuthRepository::new();
        let app = app(&repo);
        let user_id = register(&app).await;
        let login = login(&app).await;
        let access = login["accessToken"].as_str().unwrap();

        let (status, profile) = send(&app, get("/me/profile", Some(access))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["userId"], user_id.to_string());
        assert_eq!(profile["email"], "ada@example.com");
        assert_eq!(profile["fullName"], Value::Null);

        let (status, profile) = send(
            &app,
            authorized(
                "PUT",
                "/me/profile",
                access,
                Some(json!({ "fullName": " Ada Lovelace " })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["fullName"], "Ada Lovelace");

        let (status, _) = send(
            &app,
            authorized(
                "PUT",
                "/me/profile",
                access,
                Some(json!({ "fullName": "x".repeat(201) })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, profile) = send(&app, get("/me/profile", Some(access))).await;
        assert_eq!(profile["fullName"], "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_session_list_flags_the_calling_session() {
        let repo = InMemoryAuthRepository::new();
        let app = app(&repo);
        register(&app).await;
        login(&app).await;
        let phone = login(&app).await;

        // Refresh keeps the session, so the new access token points at it too
        let (_, rotated) = send(
            &app,
            post_json("/auth/refresh", json!({ "refreshToken": phone["refreshToken"] })),
        )
        .await;
        let access = rotated["accessToken"].as_str().unwrap();
        let phone_session = RefreshToken::parse(rotated["refreshToken"].as_str().unwrap())
            .unwrap()
            .session_id();

        let (status, sessions) = send(&app, get("/me/sessions", Some(access))).await;
        assert_eq!(status, StatusCode::OK);
        let sessions = sessions.as_array().unwrap();
        assert_eq!(sessions.len(), 2);

        let current: Vec<&Value> = sessions.iter().filter(|s| s["current"] == true).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0]["id"], phone_session.to_string());
    }

    #[tokio::test]
    async fn test_admin_logout_all_requires_permission() {
        let repo = InMemoryAuthRepository::new();
        let app = app(&repo);
        let admin_id = register_as(&app, "admin@example.com").await;
        let target_id = register_as(&app, "ada@example.com").await;

        let role = repo.insert_role("ADMIN");
        repo.grant_role_permission(role, SESSION_ADMIN_PERMISSION);
        repo.grant_global_role(admin_id, role, None);

        let admin = login_as(&app, "admin@example.com").await;
        let admin_access = admin["accessToken"].as_str().unwrap();
        let target = login_as(&app, "ada@example.com").await;
        let target_access = target["accessToken"].as_str().unwrap();

        // Without the permission the caller is refused, and the refusal is audited
        let (status, _) = send(
            &app,
            authorized("POST", &format!("/admin/{admin_id}/logout-all"), target_access, None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, get("/me/scope", Some(admin_access))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            authorized("POST", &format!("/admin/{target_id}/logout-all"), admin_access, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userId"], target_id.to_string());
        assert_eq!(body["status"], "revoked_all");
        assert_eq!(body["sessionsRevoked"], 1);

        let (status, _) = send(&app, get("/me/scope", Some(target_access))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(
            &app,
            post_json("/auth/refresh", json!({ "refreshToken": target["refreshToken"] })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            authorized(
                "POST",
                &format!("/admin/{}/logout-all", UserId::new()),
                admin_access,
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let events = repo.audit_events();
        assert_eq!(events.len(), 3);
        assert!(!events[0].allowed);
        assert_eq!(events[0].user_id, Some(target_id));
        assert_eq!(
            events[0].required_permission.as_deref(),
            Some(SESSION_ADMIN_PERMISSION)
        );
        assert!(events[1].allowed);
        assert_eq!(events[1].user_id, Some(admin_id));
    }
}
