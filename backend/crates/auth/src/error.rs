//! Auth Error Types
//!
//! Auth-specific variants, translated once into `kernel::error::AppError`
//! at the HTTP boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad password, token, refresh secret or TOTP code. The cause is
    /// deliberately not carried.
    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// TOTP is turned off for the whole deployment
    #[error("Feature disabled")]
    FeatureDisabled,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Input failed a value-object policy (email format, password rules)
    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredential => ErrorKind::Unauthorized,
            AuthError::Conflict(_) | AuthError::InvalidState(_) => ErrorKind::Conflict,
            AuthError::FeatureDisabled | AuthError::Validation(_) => ErrorKind::BadRequest,
            AuthError::Forbidden(_) => ErrorKind::Forbidden,
            AuthError::NotFound(_) => ErrorKind::NotFound,
            AuthError::Database(_) | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Client-facing form. Credential failures and server faults never
    /// reveal their cause.
    pub fn to_app_error(&self) -> AppError {
        match self {
            AuthError::InvalidCredential => AppError::unauthorized("Unauthorized")
                .with_action("Sign in again"),
            AuthError::Database(_) | AuthError::Internal(_) => {
                AppError::internal("Internal server error")
            }
            AuthError::FeatureDisabled => {
                AppError::bad_request("Two-factor authentication is disabled")
            }
            other => AppError::new(other.kind(), other.to_string()),
        }
    }

    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::InvalidCredential => {
                tracing::warn!("Rejected credential");
            }
            AuthError::Forbidden(reason) => {
                tracing::warn!(reason = %reason, "Forbidden");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

/// Value objects report policy failures as `AppError`; client errors keep
/// their message, anything else is internal.
impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        if err.is_server_error() {
            AuthError::Internal(err.to_string())
        } else {
            AuthError::Validation(err.message().to_string())
        }
    }
}
