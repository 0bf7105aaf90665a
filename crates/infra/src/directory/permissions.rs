use std::sync::Arc;

use serde::Deserialize;

use warden_auth::Permission;
use warden_core::{DomainResult, PermissionId};

use super::{non_blank, require, store_error};
use crate::credential_store::{CredentialStore, NewPermission, PermissionChanges};

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePermission {
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdatePermission {
    pub resource: String,
    pub action: String,
    pub description: String,
}

#[derive(Clone)]
pub struct PermissionDirectory {
    store: Arc<dyn CredentialStore>,
}

impl PermissionDirectory {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> DomainResult<Vec<Permission>> {
        self.store.list_permissions().await.map_err(store_error)
    }

    pub async fn get(&self, id: PermissionId) -> DomainResult<Permission> {
        self.store.get_permission(id).await.map_err(store_error)
    }

    #[tracing::instrument(skip(self, input), fields(resource = %input.resource, action = %input.action))]
    pub async fn create(&self, input: CreatePermission) -> DomainResult<Permission> {
        let resource = require("resource", &input.resource)?;
        let action = require("action", &input.action)?;

        let permission = self
            .store
            .create_permission(NewPermission {
                resource,
                action,
                description: input.description.trim().to_string(),
            })
            .await
            .map_err(store_error)?;

        tracing::info!(permission_id = %permission.id, "permission created");
        Ok(permission)
    }

    /// Uniqueness of `(resource, action)` is re-checked by the store only
    /// against other records.
    pub async fn update(&self, id: PermissionId, input: UpdatePermission) -> DomainResult<Permission> {
        self.store
            .update_permission(
                id,
                PermissionChanges {
                    resource: non_blank(input.resource),
                    action: non_blank(input.action),
                    description: non_blank(input.description),
                },
            )
            .await
            .map_err(store_error)
    }

    #[tracing::instrument(skip(self), fields(permission_id = %id))]
    pub async fn delete(&self, id: PermissionId) -> DomainResult<()> {
        self.store.delete_permission(id).await.map_err(store_error)?;
        tracing::info!("permission deleted");
        Ok(())
    }
}
