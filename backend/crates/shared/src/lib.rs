//! Shared kernel
//!
//! The small vocabulary every crate in the workspace agrees on:
//! the boundary error type and typed entity identifiers.

pub mod error {
    pub mod app_error;
    pub mod kind;
    #[cfg(feature = "axum")]
    pub mod response;
}
pub mod id;
