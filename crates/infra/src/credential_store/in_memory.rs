use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use warden_auth::{IdentityStore, Permission, Role, StoreError, User};
use warden_core::{PermissionId, RoleId, UserId};

use super::r#trait::{
    CredentialStore, NewPermission, NewRole, NewUser, PermissionChanges, RoleChanges, UserChanges,
};

#[derive(Debug, Clone)]
struct UserRecord {
    /// Stored with `roles` empty; expanded on read.
    user: User,
    role_ids: BTreeSet<RoleId>,
}

#[derive(Debug, Clone)]
struct RoleRecord {
    /// Stored with `permissions` empty; expanded on read.
    role: Role,
    permission_ids: BTreeSet<PermissionId>,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, UserRecord>,
    roles: HashMap<RoleId, RoleRecord>,
    permissions: HashMap<PermissionId, Permission>,
}

impl State {
    fn expand_role(&self, record: &RoleRecord) -> Role {
        let mut role = record.role.clone();
        role.permissions = record
            .permission_ids
            .iter()
            .filter_map(|id| self.permissions.get(id).cloned())
            .collect();
        role
    }

    fn expand_user(&self, record: &UserRecord) -> User {
        let mut user = record.user.clone();
        user.roles = record
            .role_ids
            .iter()
            .filter_map(|id| self.roles.get(id))
            .map(|r| self.expand_role(r))
            .collect();
        user
    }

    fn user(&self, id: UserId) -> Result<User, StoreError> {
        self.users
            .get(&id)
            .map(|r| self.expand_user(r))
            .ok_or(StoreError::NotFound("user"))
    }

    fn role(&self, id: RoleId) -> Result<Role, StoreError> {
        self.roles
            .get(&id)
            .map(|r| self.expand_role(r))
            .ok_or(StoreError::NotFound("role"))
    }

    fn username_taken(&self, username: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|r| r.user.username == username && Some(r.user.id) != except)
    }

    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|r| r.user.email == email && Some(r.user.id) != except)
    }

    fn role_name_taken(&self, name: &str, except: Option<RoleId>) -> bool {
        self.roles
            .values()
            .any(|r| r.role.name == name && Some(r.role.id) != except)
    }

    fn permission_taken(&self, resource: &str, action: &str, except: Option<PermissionId>) -> bool {
        self.permissions
            .values()
            .any(|p| p.matches(resource, action) && Some(p.id) != except)
    }
}

/// In-memory credential store.
///
/// Intended for tests/dev. A single lock guards all tables, so every identity
/// read is a consistent snapshot and uniqueness checks are atomic with writes.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    state: RwLock<State>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

#[async_trait]
impl IdentityStore for InMemoryCredentialStore {
    async fn get_identity_by_id(&self, id: UserId) -> Result<User, StoreError> {
        self.read()?.user(id)
    }

    async fn get_identity_by_username(&self, username: &str) -> Result<User, StoreError> {
        let state = self.read()?;
        state
            .users
            .values()
            .find(|r| r.user.username == username)
            .map(|r| state.expand_user(r))
            .ok_or(StoreError::NotFound("user"))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let state = self.read()?;
        let mut users: Vec<User> = state.users.values().map(|r| state.expand_user(r)).collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut state = self.write()?;
        if state.username_taken(&new.username, None) {
            return Err(StoreError::Duplicate("username".into()));
        }
        if state.email_taken(&new.email, None) {
            return Err(StoreError::Duplicate("email".into()));
        }

        let user = User::new(new.username, new.email, new.password_hash, new.full_name);
        state.users.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                role_ids: BTreeSet::new(),
            },
        );
        Ok(user)
    }

    async fn update_user(&self, id: UserId, changes: UserChanges) -> Result<User, StoreError> {
        let mut state = self.write()?;
        if !state.users.contains_key(&id) {
            return Err(StoreError::NotFound("user"));
        }
        if let Some(username) = &changes.username {
            if state.username_taken(username, Some(id)) {
                return Err(StoreError::Duplicate("username".into()));
            }
        }
        if let Some(email) = &changes.email {
            if state.email_taken(email, Some(id)) {
                return Err(StoreError::Duplicate("email".into()));
            }
        }

        let record = state.users.get_mut(&id).ok_or(StoreError::NotFound("user"))?;
        let user = &mut record.user;
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(full_name) = changes.full_name {
            user.full_name = full_name;
        }
        user.updated_at = Utc::now();

        state.user(id)
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.users.remove(&id).map(|_| ()).ok_or(StoreError::NotFound("user"))
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.roles.contains_key(&role_id) {
            return Err(StoreError::NotFound("role"));
        }
        let record = state.users.get_mut(&user_id).ok_or(StoreError::NotFound("user"))?;
        record.role_ids.insert(role_id);
        Ok(())
    }

    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.roles.contains_key(&role_id) {
            return Err(StoreError::NotFound("role"));
        }
        let record = state.users.get_mut(&user_id).ok_or(StoreError::NotFound("user"))?;
        record.role_ids.remove(&role_id);
        Ok(())
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let state = self.read()?;
        let mut roles: Vec<Role> = state.roles.values().map(|r| state.expand_role(r)).collect();
        roles.sort_by_key(|r| r.id);
        Ok(roles)
    }

    async fn get_role(&self, id: RoleId) -> Result<Role, StoreError> {
        self.read()?.role(id)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Role, StoreError> {
        let state = self.read()?;
        state
            .roles
            .values()
            .find(|r| r.role.name == name)
            .map(|r| state.expand_role(r))
            .ok_or(StoreError::NotFound("role"))
    }

    async fn create_role(&self, new: NewRole) -> Result<Role, StoreError> {
        let mut state = self.write()?;
        if state.role_name_taken(&new.name, None) {
            return Err(StoreError::Duplicate("name".into()));
        }

        let role = Role::new(new.name, new.description);
        state.roles.insert(
            role.id,
            RoleRecord {
                role: role.clone(),
                permission_ids: BTreeSet::new(),
            },
        );
        Ok(role)
    }

    async fn update_role(&self, id: RoleId, changes: RoleChanges) -> Result<Role, StoreError> {
        let mut state = self.write()?;
        if !state.roles.contains_key(&id) {
            return Err(StoreError::NotFound("role"));
        }
        if let Some(name) = &changes.name {
            if state.role_name_taken(name, Some(id)) {
                return Err(StoreError::Duplicate("name".into()));
            }
        }

        let record = state.roles.get_mut(&id).ok_or(StoreError::NotFound("role"))?;
        if let Some(name) = changes.name {
            record.role.name = name;
        }
        if let Some(description) = changes.description {
            record.role.description = description;
        }
        record.role.updated_at = Utc::now();

        state.role(id)
    }

    async fn delete_role(&self, id: RoleId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.roles.remove(&id).ok_or(StoreError::NotFound("role"))?;
        for record in state.users.values_mut() {
            record.role_ids.remove(&id);
        }
        Ok(())
    }

    async fn grant_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.permissions.contains_key(&permission_id) {
            return Err(StoreError::NotFound("permission"));
        }
        let record = state.roles.get_mut(&role_id).ok_or(StoreError::NotFound("role"))?;
        record.permission_ids.insert(permission_id);
        Ok(())
    }

    async fn revoke_permission(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.permissions.contains_key(&permission_id) {
            return Err(StoreError::NotFound("permission"));
        }
        let record = state.roles.get_mut(&role_id).ok_or(StoreError::NotFound("role"))?;
        record.permission_ids.remove(&permission_id);
        Ok(())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        let mut permissions: Vec<Permission> = self.read()?.permissions.values().cloned().collect();
        permissions.sort_by_key(|p| p.id);
        Ok(permissions)
    }

    async fn get_permission(&self, id: PermissionId) -> Result<Permission, StoreError> {
        self.read()?
            .permissions
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("permission"))
    }

    async fn find_permission(&self, resource: &str, action: &str) -> Result<Permission, StoreError> {
        self.read()?
            .permissions
            .values()
            .find(|p| p.matches(resource, action))
            .cloned()
            .ok_or(StoreError::NotFound("permission"))
    }

    async fn create_permission(&self, new: NewPermission) -> Result<Permission, StoreError> {
        let mut state = self.write()?;
        if state.permission_taken(&new.resource, &new.action, None) {
            return Err(StoreError::Duplicate("resource/action".into()));
        }

        let permission = Permission::new(new.resource, new.action, new.description);
        state.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn update_permission(
        &self,
        id: PermissionId,
        changes: PermissionChanges,
    ) -> Result<Permission, StoreError> {
        let mut state = self.write()?;
        let current = state
            .permissions
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("permission"))?;

        let resource = changes.resource.unwrap_or_else(|| current.resource.clone());
        let action = changes.action.unwrap_or_else(|| current.action.clone());
        let key_changed = resource != current.resource || action != current.action;
        if key_changed && state.permission_taken(&resource, &action, Some(id)) {
            return Err(StoreError::Duplicate("resource/action".into()));
        }

        let permission = state
            .permissions
            .get_mut(&id)
            .ok_or(StoreError::NotFound("permission"))?;
        permission.resource = resource;
        permission.action = action;
        if let Some(description) = changes.description {
            permission.description = description;
        }
        permission.updated_at = Utc::now();
        Ok(permission.clone())
    }

    async fn delete_permission(&self, id: PermissionId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state
            .permissions
            .remove(&id)
            .ok_or(StoreError::NotFound("permission"))?;
        for record in state.roles.values_mut() {
            record.permission_ids.remove(&id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_auth::PasswordHash;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: format!("{username}@example.com"),
            password_hash: PasswordHash::from_stored("digest"),
            full_name: username.into(),
        }
    }

    fn new_permission(resource: &str, action: &str) -> NewPermission {
        NewPermission {
            resource: resource.into(),
            action: action.into(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn identity_is_expanded_with_roles_and_permissions() {
        let store = InMemoryCredentialStore::new();
        let user = store.create_user(new_user("alice")).await.unwrap();
        let role = store
            .create_role(NewRole {
                name: "editor".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        let perm = store.create_permission(new_permission("users", "read")).await.unwrap();

        store.grant_permission(role.id, perm.id).await.unwrap();
        store.assign_role(user.id, role.id).await.unwrap();

        let loaded = store.get_identity_by_username("alice").await.unwrap();
        assert_eq!(loaded.id, user.id);
        assert_eq!(loaded.roles.len(), 1);
        assert!(loaded.roles[0].grants("users", "read"));
    }

    #[tokio::test]
    async fn duplicate_permission_pair_is_rejected() {
        let store = InMemoryCredentialStore::new();
        store.create_permission(new_permission("articles", "read")).await.unwrap();

        let err = store
            .create_permission(new_permission("articles", "read"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Duplicate("resource/action".into()));
        assert_eq!(store.list_permissions().await.unwrap().len(), 1);

        // Same resource, different action is a different permission.
        store.create_permission(new_permission("articles", "write")).await.unwrap();
    }

    #[tokio::test]
    async fn permission_rename_checks_other_records_only() {
        let store = InMemoryCredentialStore::new();
        let read = store.create_permission(new_permission("articles", "read")).await.unwrap();
        let write = store.create_permission(new_permission("articles", "write")).await.unwrap();

        // Renaming onto another record's pair conflicts.
        let err = store
            .update_permission(
                write.id,
                PermissionChanges {
                    action: Some("read".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Duplicate("resource/action".into()));

        // Re-submitting its own pair is not a conflict.
        let updated = store
            .update_permission(
                read.id,
                PermissionChanges {
                    resource: Some("articles".into()),
                    action: Some("read".into()),
                    description: Some("Read articles".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.description, "Read articles");
    }

    #[tokio::test]
    async fn duplicate_username_and_email_are_rejected() {
        let store = InMemoryCredentialStore::new();
        let alice = store.create_user(new_user("alice")).await.unwrap();
        let bob = store.create_user(new_user("bob")).await.unwrap();

        let err = store.create_user(new_user("alice")).await.unwrap_err();
        assert_eq!(err, StoreError::Duplicate("username".into()));

        let mut other = new_user("carol");
        other.email = "alice@example.com".into();
        assert_eq!(
            store.create_user(other).await.unwrap_err(),
            StoreError::Duplicate("email".into())
        );

        let err = store
            .update_user(
                bob.id,
                UserChanges {
                    username: Some("alice".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Duplicate("username".into()));

        // Keeping one's own username is fine.
        store
            .update_user(
                alice.id,
                UserChanges {
                    username: Some("alice".into()),
                    full_name: Some("Alice A.".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deleting_a_role_removes_its_associations() {
        let store = InMemoryCredentialStore::new();
        let user = store.create_user(new_user("alice")).await.unwrap();
        let role = store
            .create_role(NewRole {
                name: "viewer".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        store.assign_role(user.id, role.id).await.unwrap();

        store.delete_role(role.id).await.unwrap();

        let loaded = store.get_identity_by_id(user.id).await.unwrap();
        assert!(loaded.roles.is_empty());
        assert_eq!(store.get_role(role.id).await.unwrap_err(), StoreError::NotFound("role"));
    }

    #[tokio::test]
    async fn associations_require_both_records() {
        let store = InMemoryCredentialStore::new();
        let user = store.create_user(new_user("alice")).await.unwrap();

        assert_eq!(
            store.assign_role(user.id, RoleId::new()).await.unwrap_err(),
            StoreError::NotFound("role")
        );
        assert_eq!(
            store.grant_permission(RoleId::new(), PermissionId::new()).await.unwrap_err(),
            StoreError::NotFound("permission")
        );
    }

    #[tokio::test]
    async fn assignment_is_idempotent() {
        let store = InMemoryCredentialStore::new();
        let user = store.create_user(new_user("alice")).await.unwrap();
        let role = store
            .create_role(NewRole {
                name: "viewer".into(),
                description: String::new(),
            })
            .await
            .unwrap();

        store.assign_role(user.id, role.id).await.unwrap();
        store.assign_role(user.id, role.id).await.unwrap();
        assert_eq!(store.get_identity_by_id(user.id).await.unwrap().roles.len(), 1);

        store.revoke_role(user.id, role.id).await.unwrap();
        store.revoke_role(user.id, role.id).await.unwrap();
        assert!(store.get_identity_by_id(user.id).await.unwrap().roles.is_empty());
    }
}
