//! Application code: the caller-facing name of an application context
//! (`"AUTH"`, `"MINIPSP"`, ...). Compared case-insensitively, stored upper case.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppCode(String);

impl AppCode {
    /// Trim and upper-case; blank input falls back to `default`.
    /// Returns `None` only when both are blank.
    pub fn normalize(requested: Option<&str>, default: &str) -> Option<Self> {
        [requested.unwrap_or_default(), default]
            .into_iter()
            .map(str::trim)
            .find(|code| !code.is_empty())
            .map(|code| Self(code.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
