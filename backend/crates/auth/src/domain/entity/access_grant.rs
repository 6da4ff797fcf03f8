//! Roles, permissions and the three scopes a role can be granted in.
//!
//! Grants are keyed by value (`(user, role)`, `(user, application, role)`,
//! `(user, merchant, role)`); none of them has an identity of its own.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::value_object::{ApplicationId, MerchantId, PermissionId, RoleId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub role_id: RoleId,
    pub code: String,
    pub name: String,
    /// System roles cannot be deleted by administrators
    pub is_system: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub permission_id: PermissionId,
    /// e.g. `invoice.read_org`
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RolePermission {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
}

/// Who granted it and why; informational only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantMeta {
    pub granted_by: Option<UserId>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalRoleGrant {
    pub user_id: UserId,
    pub role_id: RoleId,
    /// `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
    pub meta: GrantMeta,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationRoleGrant {
    pub user_id: UserId,
    pub application_id: ApplicationId,
    pub role_id: RoleId,
    pub expires_at: Option<DateTime<Utc>>,
    pub meta: GrantMeta,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MerchantRoleGrant {
    pub user_id: UserId,
    pub merchant_id: MerchantId,
    pub role_id: RoleId,
    /// Opaque per-merchant restrictions, passed through untouched
    pub scope: Option<Value>,
    pub expires_at: Option<DateTime<Utc>>,
    pub meta: GrantMeta,
}

/// Common view over the three grant kinds
pub trait RoleGrant {
    fn role_id(&self) -> RoleId;
    fn expires_at(&self) -> Option<DateTime<Utc>>;

    /// A grant whose expiry is at or before `now` contributes nothing
    fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_none_or(|expires_at| expires_at > now)
    }
}

impl RoleGrant for GlobalRoleGrant {
    fn role_id(&self) -> RoleId {
        self.role_id
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

impl RoleGrant for ApplicationRoleGrant {
    fn role_id(&self) -> RoleId {
        self.role_id
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

impl RoleGrant for MerchantRoleGrant {
    fn role_id(&self) -> RoleId {
        self.role_id
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}
