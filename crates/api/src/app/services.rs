//! Service wiring: credential store, core services and directories.

use std::sync::Arc;

use warden_auth::{AccessControl, AuthError, AuthService, PasswordHasher, TokenConfig, TokenService};
use warden_infra::{
    CredentialStore, InMemoryCredentialStore, PermissionDirectory, PostgresCredentialStore,
    RoleDirectory, UserDirectory, seed_default_data,
};

use crate::config::AppConfig;
use crate::middleware::AuthState;

/// Everything request handlers need, shared behind an `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn CredentialStore>,
    pub tokens: TokenService,
    pub access: Arc<dyn AccessControl>,
    pub users: UserDirectory,
    pub roles: RoleDirectory,
    pub permissions: PermissionDirectory,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: TokenService,
    ) -> Result<Self, AuthError> {
        let access: Arc<dyn AccessControl> =
            Arc::new(AuthService::new(store.clone(), hasher, tokens.clone())?);

        Ok(Self {
            users: UserDirectory::new(store.clone(), hasher),
            roles: RoleDirectory::new(store.clone()),
            permissions: PermissionDirectory::new(store.clone()),
            store,
            tokens,
            access,
        })
    }

    /// Build from configuration: pick the store, apply seeding, wire services.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let hasher = PasswordHasher::new(config.bcrypt_cost)?;
        let tokens = TokenService::new(TokenConfig::new(
            config.jwt_secret.clone(),
            config.jwt_issuer.clone(),
            config.token_ttl,
        ))?;

        let store: Arc<dyn CredentialStore> = match &config.database_url {
            Some(url) => {
                tracing::info!("using postgres credential store");
                Arc::new(PostgresCredentialStore::connect(url).await?)
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory credential store");
                Arc::new(InMemoryCredentialStore::new())
            }
        };

        if config.seed_default_data {
            seed_default_data(store.as_ref(), &hasher, &config.admin_password).await?;
        }

        Ok(Self::new(store, hasher, tokens)?)
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState {
            tokens: self.tokens.clone(),
            access: self.access.clone(),
        }
    }
}
