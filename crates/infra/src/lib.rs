//! Infrastructure layer: credential persistence, directory services, seeding.

pub mod credential_store;
pub mod directory;
pub mod seed;

pub use credential_store::{
    CredentialStore, InMemoryCredentialStore, NewPermission, NewRole, NewUser, PermissionChanges,
    PostgresCredentialStore, RoleChanges, UserChanges,
};
pub use directory::{
    CreatePermission, CreateRole, CreateUser, PermissionDirectory, RoleDirectory, UpdatePermission,
    UpdateRole, UpdateUser, UserDirectory,
};
pub use seed::{SeedSummary, seed_default_data};
