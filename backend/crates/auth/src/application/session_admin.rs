//! Session Administration Use Case
//!
//! Signs another user out everywhere. Gated on [`SESSION_ADMIN_PERMISSION`]
//! through the access guard, so every attempt is audited.

use std::sync::Arc;

use crate::application::access_guard::AccessGuard;
use crate::application::authenticate::AuthContext;
use crate::application::sign_out::SignOutUseCase;
use crate::domain::entity::access_audit::RequestMeta;
use crate::domain::repository::{AuditSink, SessionRepository, UserRepository};
use crate::domain::value_object::UserId;
use crate::error::AuthResult;

pub const SESSION_ADMIN_PERMISSION: &str = "role.manage";

pub struct SessionAdminUseCase<R>
where
    R: UserRepository + SessionRepository + AuditSink,
{
    guard: AccessGuard<R>,
    sign_out: SignOutUseCase<R>,
}

impl<R> SessionAdminUseCase<R>
where
    R: UserRepository + SessionRepository + AuditSink,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            guard: AccessGuard::new(repo.clone()),
            sign_out: SignOutUseCase::new(repo),
        }
    }

    /// `Forbidden` without the permission, `NotFound` for an unknown target
    pub async fn logout_all(
        &self,
        ctx: &AuthContext,
        target: &UserId,
        request: &RequestMeta,
    ) -> AuthResult<u64> {
        self.guard
            .require(Some(ctx), SESSION_ADMIN_PERMISSION, None, request)
            .await?;

        let revoked = self.sign_out.logout_all(target).await?;
        tracing::info!(
            admin_id = %ctx.user_id,
            user_id = %target,
            sessions_revoked = revoked,
            "Sessions revoked by administrator"
        );
        Ok(revoked)
    }
}
