use std::sync::Arc;

use serde::Deserialize;

use warden_auth::Role;
use warden_core::{DomainResult, PermissionId, RoleId};

use super::{non_blank, require, store_error};
use crate::credential_store::{CredentialStore, NewRole, RoleChanges};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRole {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateRole {
    pub name: String,
    pub description: String,
}

#[derive(Clone)]
pub struct RoleDirectory {
    store: Arc<dyn CredentialStore>,
}

impl RoleDirectory {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> DomainResult<Vec<Role>> {
        self.store.list_roles().await.map_err(store_error)
    }

    pub async fn get(&self, id: RoleId) -> DomainResult<Role> {
        self.store.get_role(id).await.map_err(store_error)
    }

    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CreateRole) -> DomainResult<Role> {
        let name = require("name", &input.name)?;
        let role = self
            .store
            .create_role(NewRole {
                name,
                description: input.description.trim().to_string(),
            })
            .await
            .map_err(store_error)?;

        tracing::info!(role_id = %role.id, "role created");
        Ok(role)
    }

    pub async fn update(&self, id: RoleId, input: UpdateRole) -> DomainResult<Role> {
        self.store
            .update_role(
                id,
                RoleChanges {
                    name: non_blank(input.name),
                    description: non_blank(input.description),
                },
            )
            .await
            .map_err(store_error)
    }

    #[tracing::instrument(skip(self), fields(role_id = %id))]
    pub async fn delete(&self, id: RoleId) -> DomainResult<()> {
        self.store.delete_role(id).await.map_err(store_error)?;
        tracing::info!("role deleted");
        Ok(())
    }

    /// Grant a permission and return the updated role.
    pub async fn grant_permission(&self, role_id: RoleId, permission_id: PermissionId) -> DomainResult<Role> {
        self.store
            .grant_permission(role_id, permission_id)
            .await
            .map_err(store_error)?;
        tracing::info!(role_id = %role_id, permission_id = %permission_id, "permission granted");
        self.get(role_id).await
    }

    pub async fn revoke_permission(&self, role_id: RoleId, permission_id: PermissionId) -> DomainResult<Role> {
        self.store
            .revoke_permission(role_id, permission_id)
            .await
            .map_err(store_error)?;
        tracing::info!(role_id = %role_id, permission_id = %permission_id, "permission revoked");
        self.get(role_id).await
    }
}
