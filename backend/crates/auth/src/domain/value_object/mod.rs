//! Value Object Module

pub mod app_code;
pub mod email;
pub mod refresh_token;
pub mod totp_secret;
pub mod user_password;

pub use kernel::id::{
    ApplicationId, MerchantId, PermissionId, RoleId, SessionId, TotpCredentialId, UserId,
};
