//! Access Audit Event
//!
//! One record per access decision, allowed or not.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{MerchantId, UserId};

/// Request facts attached to an audit record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub http_method: Option<String>,
    pub path: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessAuditEvent {
    /// `None` when the caller was not authenticated
    pub user_id: Option<UserId>,
    pub merchant_id: Option<MerchantId>,
    pub allowed: bool,
    pub required_permission: Option<String>,
    pub request: RequestMeta,
    /// `jti` of the access token used
    pub token_id: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
