//! Credential store boundary.
//!
//! Durable users, roles and permissions plus their many-to-many associations.
//! The core reads identities through [`warden_auth::IdentityStore`]; directory
//! services write through [`CredentialStore`].

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryCredentialStore;
pub use postgres::PostgresCredentialStore;
pub use r#trait::{
    CredentialStore, NewPermission, NewRole, NewUser, PermissionChanges, RoleChanges, UserChanges,
};
