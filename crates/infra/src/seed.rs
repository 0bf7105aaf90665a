//! Default roles, permissions and administrator account.

use warden_auth::{PasswordHasher, Permission, Role, StoreError};
use warden_core::DomainResult;

use crate::credential_store::{CredentialStore, NewPermission, NewRole, NewUser};
use crate::directory::store_error;

pub const RESOURCES: [&str; 3] = ["users", "roles", "permissions"];
pub const ACTIONS: [&str; 2] = ["read", "write"];

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_FULL_NAME: &str = "System Administrator";

/// What a seeding run actually created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub permissions_created: usize,
    pub roles_created: usize,
    pub admin_created: bool,
}

/// Role name, description and granted `(resource, action)` pairs.
fn default_roles() -> Vec<(&'static str, &'static str, Vec<(&'static str, &'static str)>)> {
    let all: Vec<_> = RESOURCES
        .iter()
        .flat_map(|r| ACTIONS.iter().map(move |a| (*r, *a)))
        .collect();
    let all_read: Vec<_> = RESOURCES.iter().map(|r| (*r, "read")).collect();

    vec![
        ("admin", "Administrator with full access", all),
        ("supervisor", "Supervisor with read access to everything", all_read.clone()),
        ("editor", "Editor who manages users", vec![("users", "read"), ("users", "write")]),
        ("viewer", "Read-only access", all_read),
    ]
}

/// Create the default permissions, roles and admin account.
///
/// Idempotent: records that already exist (matched by their unique keys) are
/// reused, and grants/assignments are re-applied without duplication. An
/// existing admin keeps its password.
#[tracing::instrument(skip_all)]
pub async fn seed_default_data(
    store: &dyn CredentialStore,
    hasher: &PasswordHasher,
    admin_password: &str,
) -> DomainResult<SeedSummary> {
    let mut summary = SeedSummary::default();

    let mut permissions: Vec<Permission> = Vec::new();
    for resource in RESOURCES {
        for action in ACTIONS {
            let permission = match store.find_permission(resource, action).await {
                Ok(existing) => existing,
                Err(StoreError::NotFound(_)) => {
                    summary.permissions_created += 1;
                    store
                        .create_permission(NewPermission {
                            resource: resource.to_string(),
                            action: action.to_string(),
                            description: format!("{action} access to {resource}"),
                        })
                        .await
                        .map_err(store_error)?
                }
                Err(e) => return Err(store_error(e)),
            };
            permissions.push(permission);
        }
    }

    let mut admin_role: Option<Role> = None;
    for (name, description, grants) in default_roles() {
        let role = match store.find_role_by_name(name).await {
            Ok(existing) => existing,
            Err(StoreError::NotFound(_)) => {
                summary.roles_created += 1;
                store
                    .create_role(NewRole {
                        name: name.to_string(),
                        description: description.to_string(),
                    })
                    .await
                    .map_err(store_error)?
            }
            Err(e) => return Err(store_error(e)),
        };

        for (resource, action) in grants {
            if let Some(permission) = permissions.iter().find(|p| p.matches(resource, action)) {
                store
                    .grant_permission(role.id, permission.id)
                    .await
                    .map_err(store_error)?;
            }
        }

        if name == "admin" {
            admin_role = Some(role);
        }
    }

    let admin = match store.get_identity_by_username(ADMIN_USERNAME).await {
        Ok(existing) => existing,
        Err(StoreError::NotFound(_)) => {
            let password_hash = hasher
                .prepare(admin_password)
                .map_err(crate::directory::hashing_error)?;
            summary.admin_created = true;
            store
                .create_user(NewUser {
                    username: ADMIN_USERNAME.to_string(),
                    email: ADMIN_EMAIL.to_string(),
                    password_hash,
                    full_name: ADMIN_FULL_NAME.to_string(),
                })
                .await
                .map_err(store_error)?
        }
        Err(e) => return Err(store_error(e)),
    };

    if let Some(role) = admin_role {
        store.assign_role(admin.id, role.id).await.map_err(store_error)?;
    }

    tracing::info!(
        permissions_created = summary.permissions_created,
        roles_created = summary.roles_created,
        admin_created = summary.admin_created,
        "default data seeded"
    );
    Ok(summary)
}
