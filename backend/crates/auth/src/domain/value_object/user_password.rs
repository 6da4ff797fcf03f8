//! User Password Value Objects
//!
//! `RawPassword` is what the user typed (validated, zeroized on drop);
//! `UserPassword` is the Argon2id PHC hash that gets stored. Both delegate
//! the cryptography to `platform::password`.

use kernel::error::app_error::{AppError, AppResult};
use platform::password::{ClearTextPassword, HashedPassword, PasswordPolicyError};
use std::fmt;

pub struct RawPassword(ClearTextPassword);

impl RawPassword {
    pub fn new(raw: String) -> AppResult<Self> {
        ClearTextPassword::new(raw).map(Self).map_err(|e| {
            let action = match e {
                PasswordPolicyError::TooShort { .. } => "Please choose a longer password",
                PasswordPolicyError::TooLong { .. } => "Please choose a shorter password",
                PasswordPolicyError::EmptyOrWhitespace => "Please enter a password",
                PasswordPolicyError::InvalidCharacter => "Please remove control characters",
                PasswordPolicyError::CommonPattern => "Please choose a less predictable password",
            };
            AppError::bad_request(e.to_string()).with_action(action)
        })
    }
}

impl fmt::Debug for RawPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawPassword").field(&"[REDACTED]").finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct UserPassword(HashedPassword);

impl UserPassword {
    pub fn from_raw(raw: &RawPassword, pepper: Option<&[u8]>) -> AppResult<Self> {
        raw.0
            .hash(pepper)
            .map(Self)
            .map_err(|e| AppError::internal("Password hashing failed").with_source(e))
    }

    pub fn from_phc_string(phc: impl Into<String>) -> AppResult<Self> {
        HashedPassword::from_phc_string(phc)
            .map(Self)
            .map_err(|e| AppError::internal("Invalid password hash in database").with_source(e))
    }

    pub fn as_phc_string(&self) -> &str {
        self.0.as_phc_string()
    }

    pub fn verify(&self, raw: &RawPassword, pepper: Option<&[u8]>) -> bool {
        self.0.verify(&raw.0, pepper)
    }
}

impl fmt::Debug for UserPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UserPassword").field(&"[HASH]").finish()
    }
}
