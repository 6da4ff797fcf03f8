//! Application Entity
//!
//! A client application context (`AUTH`, `MINIPSP`, ...). Application-scoped
//! role grants and sessions point at one of these.

use crate::domain::value_object::ApplicationId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub application_id: ApplicationId,
    /// Upper case, unique
    pub code: String,
    pub name: String,
    pub is_system: bool,
}
