use std::sync::Arc;

use async_trait::async_trait;

use warden_auth::{IdentityStore, PasswordHash, Permission, Role, StoreError, User};
use warden_core::{PermissionId, RoleId, UserId};

/// A user ready to be persisted. The password is already a digest.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: PasswordHash,
    pub full_name: String,
}

/// Partial user update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<PasswordHash>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct RoleChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPermission {
    pub resource: String,
    pub action: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionChanges {
    pub resource: Option<String>,
    pub action: Option<String>,
    pub description: Option<String>,
}

/// Durable users, roles, permissions and their associations.
///
/// Uniqueness of username, email, role name and `(resource, action)` is
/// enforced atomically by the implementation and reported as
/// [`StoreError::Duplicate`] carrying the offending field. An update only
/// conflicts with records that have a different id.
///
/// Association mutations are idempotent: assigning an already assigned role
/// (or revoking one that is not assigned) succeeds without change, as long as
/// both records exist.
#[async_trait]
pub trait CredentialStore: IdentityStore {
    // users
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn update_user(&self, id: UserId, changes: UserChanges) -> Result<User, StoreError>;
    async fn delete_user(&self, id: UserId) -> Result<(), StoreError>;
    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError>;
    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError>;

    // roles
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;
    async fn get_role(&self, id: RoleId) -> Result<Role, StoreError>;
    async fn find_role_by_name(&self, name: &str) -> Result<Role, StoreError>;
    async fn create_role(&self, role: NewRole) -> Result<Role, StoreError>;
    async fn update_role(&self, id: RoleId, changes: RoleChanges) -> Result<Role, StoreError>;
    async fn delete_role(&self, id: RoleId) -> Result<(), StoreError>;
    async fn grant_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), StoreError>;
    async fn revoke_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), StoreError>;

    // permissions
    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError>;
    async fn get_permission(&self, id: PermissionId) -> Result<Permission, StoreError>;
    async fn find_permission(&self, resource: &str, action: &str) -> Result<Permission, StoreError>;
    async fn create_permission(&self, permission: NewPermission) -> Result<Permission, StoreError>;
    async fn update_permission(
        &self,
        id: PermissionId,
        changes: PermissionChanges,
    ) -> Result<Permission, StoreError>;
    async fn delete_permission(&self, id: PermissionId) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> CredentialStore for Arc<S>
where
    S: CredentialStore + ?Sized,
{
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        (**self).list_users().await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        (**self).create_user(user).await
    }

    async fn update_user(&self, id: UserId, changes: UserChanges) -> Result<User, StoreError> {
        (**self).update_user(id, changes).await
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        (**self).delete_user(id).await
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        (**self).assign_role(user_id, role_id).await
    }

    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        (**self).revoke_role(user_id, role_id).await
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        (**self).list_roles().await
    }

    async fn get_role(&self, id: RoleId) -> Result<Role, StoreError> {
        (**self).get_role(id).await
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Role, StoreError> {
        (**self).find_role_by_name(name).await
    }

    async fn create_role(&self, role: NewRole) -> Result<Role, StoreError> {
        (**self).create_role(role).await
    }

    async fn update_role(&self, id: RoleId, changes: RoleChanges) -> Result<Role, StoreError> {
        (**self).update_role(id, changes).await
    }

    async fn delete_role(&self, id: RoleId) -> Result<(), StoreError> {
        (**self).delete_role(id).await
    }

    async fn grant_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), StoreError> {
        (**self).grant_permission(role_id, permission_id).await
    }

    async fn revoke_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), StoreError> {
        (**self).revoke_permission(role_id, permission_id).await
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        (**self).list_permissions().await
    }

    async fn get_permission(&self, id: PermissionId) -> Result<Permission, StoreError> {
        (**self).get_permission(id).await
    }

    async fn find_permission(&self, resource: &str, action: &str) -> Result<Permission, StoreError> {
        (**self).find_permission(resource, action).await
    }

    async fn create_permission(&self, permission: NewPermission) -> Result<Permission, StoreError> {
        (**self).create_permission(permission).await
    }

    async fn update_permission(
        &self,
        id: PermissionId,
        changes: PermissionChanges,
    ) -> Result<Permission, StoreError> {
        (**self).update_permission(id, changes).await
    }

    async fn delete_permission(&self, id: PermissionId) -> Result<(), StoreError> {
        (**self).delete_permission(id).await
    }
}
