//! Domain Layer
//!
//! Entities, value objects and repository traits.

pub mod entity;
pub mod repository;
pub mod value_object;

pub use entity::{auth_session::AuthSession, user::User};
pub use repository::{
    ApplicationRepository, AuditSink, AuthStore, GrantRepository, SecuritySettingRepository,
    SessionRepository, TotpCredentialRepository, UserRepository,
};
