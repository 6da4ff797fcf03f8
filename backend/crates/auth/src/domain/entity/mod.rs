//! Entity Module

pub mod access_audit;
pub mod access_grant;
pub mod application;
pub mod auth_session;
pub mod security_setting;
pub mod totp_credential;
pub mod user;
