use std::sync::Arc;

use serde::Deserialize;

use warden_auth::{IdentityStore, PasswordHasher, User};
use warden_core::{DomainError, DomainResult, RoleId, UserId};

use super::{hashing_error, non_blank, require, store_error, validate_email};
use crate::credential_store::{CredentialStore, NewUser, UserChanges};

#[derive(Clone, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
}

/// Partial update; blank fields are left unchanged.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
}

impl core::fmt::Debug for CreateUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CreateUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

impl core::fmt::Debug for UpdateUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UpdateUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

/// User management. Passwords are hashed here, before the store sees them.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    pub async fn list(&self) -> DomainResult<Vec<User>> {
        self.store.list_users().await.map_err(store_error)
    }

    pub async fn get(&self, id: UserId) -> DomainResult<User> {
        self.store.get_identity_by_id(id).await.map_err(store_error)
    }

    #[tracing::instrument(skip(self, input), fields(username = %input.username))]
    pub async fn create(&self, input: CreateUser) -> DomainResult<User> {
        let username = require("username", &input.username)?;
        let email = require("email", &input.email)?;
        validate_email(&email)?;
        if input.password.is_empty() {
            return Err(DomainError::validation("password is required"));
        }

        let password_hash = self.hasher.prepare(&input.password).map_err(hashing_error)?;

        let user = self
            .store
            .create_user(NewUser {
                username,
                email,
                password_hash,
                full_name: input.full_name.trim().to_string(),
            })
            .await
            .map_err(store_error)?;

        tracing::info!(user_id = %user.id, "user created");
        Ok(user)
    }

    #[tracing::instrument(skip(self, input), fields(user_id = %id))]
    pub async fn update(&self, id: UserId, input: UpdateUser) -> DomainResult<User> {
        let email = non_blank(input.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }

        let password_hash = if input.password.is_empty() {
            None
        } else {
            Some(self.hasher.prepare(&input.password).map_err(hashing_error)?)
        };

        self.store
            .update_user(
                id,
                UserChanges {
                    username: non_blank(input.username),
                    email,
                    password_hash,
                    full_name: non_blank(input.full_name),
                },
            )
            .await
            .map_err(store_error)
    }

    #[tracing::instrument(skip(self), fields(user_id = %id))]
    pub async fn delete(&self, id: UserId) -> DomainResult<()> {
        self.store.delete_user(id).await.map_err(store_error)?;
        tracing::info!("user deleted");
        Ok(())
    }

    /// Assign a role and return the updated user.
    pub async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> DomainResult<User> {
        self.store
            .assign_role(user_id, role_id)
            .await
            .map_err(store_error)?;
        tracing::info!(user_id = %user_id, role_id = %role_id, "role assigned");
        self.get(user_id).await
    }

    pub async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> DomainResult<User> {
        self.store
            .revoke_role(user_id, role_id)
            .await
            .map_err(store_error)?;
        tracing::info!(user_id = %user_id, role_id = %role_id, "role revoked");
        self.get(user_id).await
    }
}
