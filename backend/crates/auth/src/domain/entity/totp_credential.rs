//! TOTP Credential Entity
//!
//! `NO_CREDENTIAL -> PENDING (unverified) -> ENABLED (verified) -> DISABLED
//! (inactive)`. Only an active, verified credential can satisfy a login.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{TotpCredentialId, UserId, totp_secret::TotpSecret};

#[derive(Debug, Clone)]
pub struct TotpCredential {
    pub credential_id: TotpCredentialId,
    pub user_id: UserId,
    pub secret: TotpSecret,
    pub issuer: String,
    pub account_name: String,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl TotpCredential {
    pub fn new(user_id: UserId, issuer: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            credential_id: TotpCredentialId::new(),
            user_id,
            secret: TotpSecret::generate(),
            issuer: issuer.into(),
            account_name: account_name.into(),
            created_at: Utc::now(),
            verified_at: None,
            last_used_at: None,
            active: true,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.active && !self.is_verified()
    }

    pub fn can_authenticate(&self) -> bool {
        self.active && self.is_verified()
    }

    pub fn mark_verified(&mut self) {
        self.verified_at = Some(Utc::now());
    }

    pub fn mark_used(&mut self) {
        self.last_used_at = Some(Utc::now());
    }
}
