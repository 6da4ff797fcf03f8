//! Auth Session Entity
//!
//! One refresh-token lineage. The session id is stable across rotations;
//! the secret hash and expiry change on every refresh.
//!
//! `active -> active` (rotate), `active -> revoked` (logout),
//! `active -> expired` (detected lazily when used).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use platform::client::ClientInfo;

use crate::domain::value_object::{ApplicationId, SessionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Revoked,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Revoked => "revoked",
            SessionStatus::Expired => "expired",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "revoked" => Ok(SessionStatus::Revoked),
            "expired" => Ok(SessionStatus::Expired),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub session_id: SessionId,
    pub user_id: UserId,
    /// SHA-256 of the current rotation secret
    pub rotation_secret_hash: Vec<u8>,
    pub status: SessionStatus,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub application_id: Option<ApplicationId>,
    pub last_rotated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AuthSession {
    /// TTL comes from configuration
    pub fn new(
        user_id: UserId,
        rotation_secret_hash: Vec<u8>,
        client: &ClientInfo,
        application_id: Option<ApplicationId>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            session_id: SessionId::new(),
            user_id,
            rotation_secret_hash,
            status: SessionStatus::Active,
            ip_address: client.ip_string(),
            user_agent: client.user_agent.clone(),
            application_id,
            last_rotated_at: now,
            expires_at: now + ttl,
            revoked_at: None,
            created_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Compare-and-swap rotation: applied only while the session is still
/// active and still holds `expected_hash`.
#[derive(Debug, Clone)]
pub struct SessionRotation {
    pub session_id: SessionId,
    pub expected_hash: Vec<u8>,
    pub new_hash: Vec<u8>,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub rotated_at: DateTime<Utc>,
}
