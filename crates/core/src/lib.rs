//! `warden-core`: shared identifiers and the domain error model.
//!
//! This crate has no IO and no knowledge of tokens, hashing, or storage.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{PermissionId, RoleId, UserId};
