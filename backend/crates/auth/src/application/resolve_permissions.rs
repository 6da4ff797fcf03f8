//! Permission Resolver
//!
//! Flattens a user's role grants into the permission codes and merchant ids
//! carried by an access token. Global and merchant grants always apply;
//! application grants only when the requested application is known.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::entity::access_grant::RoleGrant;
use crate::domain::repository::{ApplicationRepository, GrantRepository};
use crate::domain::value_object::{MerchantId, RoleId, UserId, app_code::AppCode};
use crate::error::AuthResult;

/// Sorted and duplicate-free
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAuthority {
    pub permissions: Vec<String>,
    pub merchant_ids: Vec<MerchantId>,
}

pub struct PermissionResolver<R>
where
    R: GrantRepository + ApplicationRepository,
{
    repo: Arc<R>,
}

impl<R> PermissionResolver<R>
where
    R: GrantRepository + ApplicationRepository,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn resolve(
        &self,
        user_id: &UserId,
        app_code: Option<&AppCode>,
    ) -> AuthResult<ResolvedAuthority> {
        self.resolve_at(user_id, app_code, Utc::now()).await
    }

    pub async fn resolve_at(
        &self,
        user_id: &UserId,
        app_code: Option<&AppCode>,
        now: DateTime<Utc>,
    ) -> AuthResult<ResolvedAuthority> {
        let mut role_ids: BTreeSet<RoleId> = active_roles(
            &self.repo.find_global_grants(user_id).await?,
            now,
        );

        if let Some(code) = app_code {
            match self.repo.find_application_by_code(code.as_str()).await? {
                Some(application) => {
                    let grants = self
                        .repo
                        .find_application_grants(user_id, &application.application_id)
                        .await?;
                    role_ids.extend(active_roles(&grants, now));
                }
                None => {
                    tracing::debug!(app_code = %code, "Unknown application, no app-scoped permissions");
                }
            }
        }

        let merchant_grants = self.repo.find_merchant_grants(user_id).await?;
        let mut merchant_ids = BTreeSet::new();
        for grant in merchant_grants.iter().filter(|g| g.is_active_at(now)) {
            role_ids.insert(grant.role_id);
            merchant_ids.insert(grant.merchant_id);
        }

        let permissions: BTreeSet<String> = if role_ids.is_empty() {
            BTreeSet::new()
        } else {
            let role_ids: Vec<RoleId> = role_ids.into_iter().collect();
            self.repo
                .find_permission_codes_by_roles(&role_ids)
                .await?
                .into_iter()
                .collect()
        };

        Ok(ResolvedAuthority {
            permissions: permissions.into_iter().collect(),
            merchant_ids: merchant_ids.into_iter().collect(),
        })
    }
}

fn active_roles<G: RoleGrant>(grants: &[G], now: DateTime<Utc>) -> BTreeSet<RoleId> {
    grants
        .iter()
        .filter(|grant| grant.is_active_at(now))
        .map(RoleGrant::role_id)
        .collect()
}
