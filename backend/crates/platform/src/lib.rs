//! Platform crate - technical foundations shared by domain crates
//!
//! - `crypto`: random tokens, SHA-256, URL-safe base64, constant-time compare
//! - `password`: Argon2id hashing behind a zeroizing clear-text type
//! - `client`: caller IP / User-Agent / bearer token extraction

pub mod client;
pub mod crypto;
pub mod password;
