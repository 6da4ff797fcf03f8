//! Sign Up Use Case
//!
//! Creates a new user account.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::domain::entity::access_grant::{GlobalRoleGrant, GrantMeta};
use crate::domain::entity::user::User;
use crate::domain::repository::{GrantRepository, UserRepository};
use crate::domain::value_object::{
    UserId,
    email::Email,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

/// Sign up input
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// Sign up output
pub struct SignUpOutput {
    pub user_id: UserId,
}

/// Sign up use case
pub struct SignUpUseCase<R>
where
    R: UserRepository + GrantRepository,
{
    repo: Arc<R>,
    config: Arc<AuthConfig>,
}

impl<R> SignUpUseCase<R>
where
    R: UserRepository + GrantRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>) -> Self {
        Self { repo, config }
    }

    pub async fn execute(&self, input: SignUpInput) -> AuthResult<SignUpOutput> {
        let email = Email::new(&input.email)?;

        if self.repo.email_exists(&email).await? {
            return Err(AuthError::Conflict("Email already registered".to_string()));
        }

        let raw_password = RawPassword::new(input.password)?;
        let password = UserPassword::from_raw(&raw_password, self.config.pepper())?;

        let user = User::new(email, password, input.full_name);
        self.repo.insert_user(&user).await?;

        if let Some(role_code) = &self.config.default_role_code {
            self.grant_default_role(&user.user_id, role_code).await?;
        }

        tracing::info!(
            user_id = %user.user_id,
            email_domain = %user.email.domain(),
            "User registered"
        );

        Ok(SignUpOutput {
            user_id: user.user_id,
        })
    }

    async fn grant_default_role(&self, user_id: &UserId, role_code: &str) -> AuthResult<()> {
        let Some(role) = self.repo.find_role_by_code(role_code).await? else {
            tracing::warn!(role_code = %role_code, "Default role not found, skipping grant");
            return Ok(());
        };

        self.repo
            .insert_global_grant(&GlobalRoleGrant {
                user_id: *user_id,
                role_id: role.role_id,
                expires_at: None,
                meta: GrantMeta {
                    granted_by: None,
                    note: Some("default role on registration".to_string()),
                },
            })
            .await
    }
}
