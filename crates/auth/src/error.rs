//! Error taxonomy of the authorization core.
//!
//! `Display` output is safe to hand to an external caller: it never includes
//! the inner detail strings, which exist for logs only.

use thiserror::Error;

use crate::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Login failed. Unknown username and wrong password are indistinguishable.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Token is malformed, tampered, signed with another key or algorithm,
    /// expired, or not yet valid.
    #[error("invalid or expired token")]
    InvalidToken,

    /// A referenced identity/role/permission does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The credential store is unreachable or failed. Retryable by the caller.
    #[error("credential store unavailable")]
    StorageFault(String),

    /// Password hashing failed internally.
    #[error("password hashing failed")]
    Hashing(String),

    /// Token signing failed (e.g. misconfigured key).
    #[error("token issuance failed")]
    TokenIssue(String),
}

impl AuthError {
    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InvalidToken => "invalid_token",
            AuthError::NotFound(_) => "not_found",
            AuthError::StorageFault(_) => "storage_error",
            AuthError::Hashing(_) => "internal_error",
            AuthError::TokenIssue(_) => "internal_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::StorageFault(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => AuthError::NotFound(what),
            // The core only reads; a duplicate surfacing here means the store misbehaved.
            StoreError::Duplicate(field) => AuthError::StorageFault(format!("unexpected duplicate {field}")),
            StoreError::Unavailable(msg) => AuthError::StorageFault(msg),
        }
    }
}
