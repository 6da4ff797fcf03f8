//! Refresh Token Value Objects
//!
//! Wire format: `<session uuid>.<url-safe base64 secret>`. Only the SHA-256
//! of the secret is ever persisted.

use std::fmt;

use kernel::id::SessionId;
use platform::crypto::{constant_time_eq, random_token, sha256};

use crate::error::{AuthError, AuthResult};

/// 256-bit rotation secret
pub const ROTATION_SECRET_BYTES: usize = 32;

#[derive(Clone, PartialEq, Eq)]
pub struct RotationSecret(String);

impl RotationSecret {
    pub fn generate() -> Self {
        Self(random_token(ROTATION_SECRET_BYTES))
    }

    pub fn hash(&self) -> Vec<u8> {
        sha256(self.0.as_bytes()).to_vec()
    }

    pub fn matches(&self, stored_hash: &[u8]) -> bool {
        constant_time_eq(&self.hash(), stored_hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RotationSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RotationSecret([REDACTED])")
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken {
    session_id: SessionId,
    secret: RotationSecret,
}

impl RefreshToken {
    pub fn new(session_id: SessionId, secret: RotationSecret) -> Self {
        Self { session_id, secret }
    }

    /// Anything that is not `uuid.base64url` is an invalid credential
    pub fn parse(raw: &str) -> AuthResult<Self> {
        let (id, secret) = raw
            .trim()
            .split_once('.')
            .ok_or(AuthError::InvalidCredential)?;

        let session_id: SessionId = id.parse().map_err(|_| AuthError::InvalidCredential)?;

        let url_safe = |b: u8| b.is_ascii_alphanumeric() || b == b'-' || b == b'_';
        if secret.is_empty() || !secret.bytes().all(url_safe) {
            return Err(AuthError::InvalidCredential);
        }

        Ok(Self {
            session_id,
            secret: RotationSecret(secret.to_string()),
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn secret(&self) -> &RotationSecret {
        &self.secret
    }

    /// Externally visible form
    pub fn encode(&self) -> String {
        format!("{}.{}", self.session_id, self.secret.0)
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshToken")
            .field("session_id", &self.session_id)
            .field("secret", &self.secret)
            .finish()
    }
}
