//! Validated CRUD over the credential store.
//!
//! Directories own input validation and the hash-before-persist step; the
//! store owns uniqueness. Errors are reported as [`DomainError`].

mod permissions;
mod roles;
mod users;

pub use permissions::{CreatePermission, PermissionDirectory, UpdatePermission};
pub use roles::{CreateRole, RoleDirectory, UpdateRole};
pub use users::{CreateUser, UpdateUser, UserDirectory};

use warden_auth::{AuthError, StoreError};
use warden_core::DomainError;

pub(crate) fn store_error(err: StoreError) -> DomainError {
    match err {
        StoreError::NotFound(what) => DomainError::not_found(what),
        StoreError::Duplicate(field) => DomainError::conflict(format!("{field} already exists")),
        StoreError::Unavailable(msg) => {
            tracing::warn!(error = %msg, "credential store unavailable");
            DomainError::storage(msg)
        }
    }
}

pub(crate) fn hashing_error(err: AuthError) -> DomainError {
    tracing::warn!(error = ?err, "password hashing failed");
    DomainError::storage(err.to_string())
}

/// `None` for blank input, used by partial updates.
pub(crate) fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn require(field: &str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn validate_email(email: &str) -> Result<(), DomainError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(DomainError::validation("email must be a valid address")),
    }
}
