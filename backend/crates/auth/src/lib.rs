//! Auth (Authentication & Authorization) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits
//! - `application/` - Use cases and application services
//! - `infra/` - PostgreSQL and in-memory stores
//! - `presentation/` - HTTP handlers, DTOs, router, middleware
//!
//! ## Features
//! - Email + password registration and login
//! - Short-lived JWT access tokens carrying the resolved permission set
//! - Rotating refresh sessions (`sessionId.secret`) with replay detection
//! - Optional TOTP step-up at login (RFC 6238)
//! - Permissions resolved from global, application and merchant grants
//! - Audited access checks per merchant
//!
//! ## Security Model
//! - Passwords hashed with Argon2id, optional server-side pepper
//! - Refresh secrets stored as SHA-256 only, rotated with compare-and-swap
//! - Every access token embeds the user's auth state version (ASV);
//!   logout-all, password change and MFA changes bump it

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::{AuthConfig, TotpSettings};
pub use domain::repository::AuthStore;
pub use error::{AuthError, AuthResult};
pub use infra::{memory::InMemoryAuthRepository, postgres::PgAuthRepository};
pub use presentation::router::auth_router;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

#[cfg(test)]
mod tests;
