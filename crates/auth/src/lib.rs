//! `warden-auth`: the authorization core.
//!
//! Password hashing, session token issuance/verification, permission
//! resolution, and the login flow. This crate is decoupled from HTTP and
//! storage: identities are read through [`IdentityStore`].

pub mod authorize;
pub mod claims;
pub mod error;
pub mod login;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod service;
pub mod store;
pub mod token;
pub mod user;

#[cfg(test)]
pub(crate) mod testing;

pub use authorize::{
    AuthorizationEngine, AuthorizationExplanation, effective_permissions, explain, grants,
    has_role,
};
pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use error::AuthError;
pub use login::{LoginRequest, LoginResponse, LoginService};
pub use password::{PasswordHash, PasswordHasher};
pub use permissions::{Permission, PermissionKey};
pub use roles::Role;
pub use service::{AccessControl, AuthService};
pub use store::{IdentityStore, StoreError};
pub use token::{IssuedToken, TokenConfig, TokenService};
pub use user::{User, UserProfile};
