//! Read-side contract the core needs from the credential store.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use warden_core::UserId;

use crate::User;

/// Errors a credential store reports.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness constraint rejected the write; carries the field name.
    #[error("duplicate {0}")]
    Duplicate(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Identity lookups used by login and authorization.
///
/// Implementations return the user with every role and each role's
/// permissions expanded, read from one consistent snapshot.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get_identity_by_id(&self, id: UserId) -> Result<User, StoreError>;

    /// Exact (case-sensitive) username match.
    async fn get_identity_by_username(&self, username: &str) -> Result<User, StoreError>;
}

#[async_trait]
impl<S> IdentityStore for Arc<S>
where
    S: IdentityStore + ?Sized,
{
    async fn get_identity_by_id(&self, id: UserId) -> Result<User, StoreError> {
        (**self).get_identity_by_id(id).await
    }

    async fn get_identity_by_username(&self, username: &str) -> Result<User, StoreError> {
        (**self).get_identity_by_username(username).await
    }
}
