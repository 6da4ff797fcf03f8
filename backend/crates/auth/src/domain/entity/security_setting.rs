//! Per-user security flags. `mfa_totp_enabled` is the single switch login
//! consults to decide whether step-up is required.

use chrono::{DateTime, Utc};

use crate::domain::value_object::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSecuritySetting {
    pub user_id: UserId,
    pub mfa_totp_enabled: bool,
    pub mfa_updated_at: Option<DateTime<Utc>>,
}

impl UserSecuritySetting {
    pub fn disabled(user_id: UserId) -> Self {
        Self {
            user_id,
            mfa_totp_enabled: false,
            mfa_updated_at: None,
        }
    }

    pub fn set_mfa_totp(&mut self, enabled: bool) {
        self.mfa_totp_enabled = enabled;
        self.mfa_updated_at = Some(Utc::now());
    }
}
