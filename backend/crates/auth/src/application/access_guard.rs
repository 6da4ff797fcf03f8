//! Access Guard
//!
//! Permission and merchant-scope decisions over an [`AuthContext`]. Each
//! decision, allowed or denied, is written to the audit sink. A sink failure
//! is logged and never changes the outcome.

use std::sync::Arc;

use chrono::Utc;

use crate::application::authenticate::AuthContext;
use crate::domain::entity::access_audit::{AccessAuditEvent, RequestMeta};
use crate::domain::repository::AuditSink;
use crate::domain::value_object::MerchantId;
use crate::error::{AuthError, AuthResult};

pub struct AccessGuard<A>
where
    A: AuditSink,
{
    audit: Arc<A>,
}

impl<A> AccessGuard<A>
where
    A: AuditSink,
{
    pub fn new(audit: Arc<A>) -> Self {
        Self { audit }
    }

    /// Allowed iff the caller holds `required_permission` and, when a target
    /// merchant is given, is scoped to it. Missing context or a blank
    /// permission is a denial.
    pub async fn check(
        &self,
        ctx: Option<&AuthContext>,
        required_permission: &str,
        target_merchant: Option<MerchantId>,
        request: &RequestMeta,
    ) -> bool {
        let required = required_permission.trim();
        let (allowed, note) = match ctx {
            None => (false, Some("unauthenticated")),
            Some(_) if required.is_empty() => (false, Some("no permission specified")),
            Some(ctx) if !ctx.has_permission(required) => (false, Some("missing permission")),
            Some(ctx) => match target_merchant {
                Some(merchant_id) if !ctx.has_merchant(&merchant_id) => {
                    (false, Some("merchant out of scope"))
                }
                _ => (true, None),
            },
        };

        self.record(AccessAuditEvent {
            user_id: ctx.map(|c| c.user_id),
            merchant_id: target_merchant,
            allowed,
            required_permission: (!required.is_empty()).then(|| required.to_string()),
            request: request.clone(),
            token_id: ctx.map(|c| c.token_id.clone()),
            note: note.map(str::to_string),
            occurred_at: Utc::now(),
        })
        .await;

        allowed
    }

    /// Merchant membership alone, independent of any permission code
    pub async fn has_merchant(
        &self,
        ctx: Option<&AuthContext>,
        merchant_id: MerchantId,
        request: &RequestMeta,
    ) -> bool {
        let allowed = ctx.is_some_and(|c| c.has_merchant(&merchant_id));

        self.record(AccessAuditEvent {
            user_id: ctx.map(|c| c.user_id),
            merchant_id: Some(merchant_id),
            allowed,
            required_permission: None,
            request: request.clone(),
            token_id: ctx.map(|c| c.token_id.clone()),
            note: (!allowed).then(|| "merchant out of scope".to_string()),
            occurred_at: Utc::now(),
        })
        .await;

        allowed
    }

    pub async fn require(
        &self,
        ctx: Option<&AuthContext>,
        required_permission: &str,
        target_merchant: Option<MerchantId>,
        request: &RequestMeta,
    ) -> AuthResult<()> {
        if self
            .check(ctx, required_permission, target_merchant, request)
            .await
        {
            Ok(())
        } else {
            Err(AuthError::Forbidden(format!(
                "Missing permission {}",
                required_permission.trim()
            )))
        }
    }

    pub async fn require_merchant(
        &self,
        ctx: Option<&AuthContext>,
        merchant_id: MerchantId,
        request: &RequestMeta,
    ) -> AuthResult<()> {
        if self.has_merchant(ctx, merchant_id, request).await {
            Ok(())
        } else {
            Err(AuthError::Forbidden("Merchant out of scope".to_string()))
        }
    }

    async fn record(&self, event: AccessAuditEvent) {
        if let Err(e) = self.audit.record_access(&event).await {
            tracing::warn!(
                error = %e,
                allowed = event.allowed,
                "Failed to record access decision"
            );
        }
    }
}
