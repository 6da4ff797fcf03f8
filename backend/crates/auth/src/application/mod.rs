//! Application Layer
//!
//! Use cases and application services.

pub mod access_guard;
pub mod authenticate;
pub mod change_password;
pub mod config;
pub mod manage_sessions;
pub mod profile;
pub mod refresh;
pub mod resolve_permissions;
pub mod session_admin;
pub mod session_issuer;
pub mod sign_in;
pub mod sign_out;
pub mod sign_up;
pub mod token;
pub mod totp_setup;

// Re-exports
pub use access_guard::AccessGuard;
pub use authenticate::{AuthContext, AuthenticateUseCase};
pub use change_password::{ChangePasswordInput, ChangePasswordUseCase};
pub use config::{AuthConfig, TotpSettings};
pub use manage_sessions::ManageSessionsUseCase;
pub use profile::ProfileUseCase;
pub use refresh::RefreshUseCase;
pub use resolve_permissions::{PermissionResolver, ResolvedAuthority};
pub use session_admin::{SESSION_ADMIN_PERMISSION, SessionAdminUseCase};
pub use sign_in::{LoginOutcome, SignInInput, SignInUseCase, TotpSignInInput};
pub use sign_out::SignOutUseCase;
pub use sign_up::{SignUpInput, SignUpOutput, SignUpUseCase};
pub use token::{TokenPair, TokenService};
pub use totp_setup::{TotpEnrollment, TotpUseCase};
