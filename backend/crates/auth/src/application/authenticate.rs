//! Authenticate Use Case
//!
//! Turns a bearer access token into an [`AuthContext`]. The token must
//! verify and carry the user's current ASV; a bumped ASV retires every
//! token issued before the bump regardless of its expiry.

use std::sync::Arc;

use crate::application::token::TokenService;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{MerchantId, SessionId, UserId};
use crate::error::{AuthError, AuthResult};

/// Verified caller identity and authority, passed explicitly to guards and
/// handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub email: Option<String>,
    /// Sorted
    pub permissions: Vec<String>,
    pub merchant_ids: Vec<MerchantId>,
    pub app_code: Option<String>,
    /// Refresh session behind the presented token
    pub session_id: SessionId,
    /// `jti` of the presented token
    pub token_id: String,
}

impl AuthContext {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .binary_search_by(|p| p.as_str().cmp(permission))
            .is_ok()
    }

    pub fn has_merchant(&self, merchant_id: &MerchantId) -> bool {
        self.merchant_ids.contains(merchant_id)
    }
}

pub struct AuthenticateUseCase<R>
where
    R: UserRepository,
{
    repo: Arc<R>,
    tokens: Arc<TokenService>,
}

impl<R> AuthenticateUseCase<R>
where
    R: UserRepository,
{
    pub fn new(repo: Arc<R>, tokens: Arc<TokenService>) -> Self {
        Self { repo, tokens }
    }

    pub async fn execute(&self, bearer_token: &str) -> AuthResult<AuthContext> {
        let claims = self.tokens.verify_access_token(bearer_token)?;
        let user_id: UserId = claims.sub.parse().map_err(|_| AuthError::InvalidCredential)?;

        let current_asv = self
            .repo
            .find_auth_state_version(&user_id)
            .await?
            .ok_or(AuthError::InvalidCredential)?;

        if claims.asv != current_asv {
            tracing::debug!(
                user_id = %user_id,
                token_asv = claims.asv,
                current_asv = current_asv,
                "Access token from a previous auth state"
            );
            return Err(AuthError::InvalidCredential);
        }

        let mut permissions = claims.perms;
        permissions.sort();
        permissions.dedup();

        Ok(AuthContext {
            user_id,
            email: claims.email,
            permissions,
            merchant_ids: claims.merchant_ids,
            app_code: claims.app,
            session_id: claims.sid,
            token_id: claims.jti,
        })
    }
}
