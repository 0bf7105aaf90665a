use std::sync::Arc;

use async_trait::async_trait;

use warden_core::UserId;

use crate::{
    AuthError, AuthorizationEngine, IdentityStore, LoginRequest, LoginResponse, LoginService,
    PasswordHasher, TokenService, User, authorize,
};

/// The authorization capability the request gate depends on.
///
/// Production code uses [`AuthService`]; tests substitute their own.
#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn get_identity(&self, user_id: UserId) -> Result<User, AuthError>;

    async fn has_permission(
        &self,
        user_id: UserId,
        resource: &str,
        action: &str,
    ) -> Result<bool, AuthError>;

    /// Pure check over an already-loaded identity.
    fn has_role(&self, user: &User, role_name: &str) -> bool;

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError>;
}

#[async_trait]
impl<A> AccessControl for Arc<A>
where
    A: AccessControl + ?Sized,
{
    async fn get_identity(&self, user_id: UserId) -> Result<User, AuthError> {
        (**self).get_identity(user_id).await
    }

    async fn has_permission(
        &self,
        user_id: UserId,
        resource: &str,
        action: &str,
    ) -> Result<bool, AuthError> {
        (**self).has_permission(user_id, resource, action).await
    }

    fn has_role(&self, user: &User, role_name: &str) -> bool {
        (**self).has_role(user, role_name)
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        (**self).login(request).await
    }
}

/// Store-backed [`AccessControl`].
#[derive(Debug, Clone)]
pub struct AuthService<S> {
    engine: AuthorizationEngine<S>,
    login: LoginService<S>,
}

impl<S> AuthService<S>
where
    S: IdentityStore + Clone,
{
    pub fn new(store: S, hasher: PasswordHasher, tokens: TokenService) -> Result<Self, AuthError> {
        Ok(Self {
            engine: AuthorizationEngine::new(store.clone()),
            login: LoginService::new(store, hasher, tokens)?,
        })
    }
}

#[async_trait]
impl<S> AccessControl for AuthService<S>
where
    S: IdentityStore + Clone,
{
    async fn get_identity(&self, user_id: UserId) -> Result<User, AuthError> {
        self.engine.load(user_id).await
    }

    async fn has_permission(
        &self,
        user_id: UserId,
        resource: &str,
        action: &str,
    ) -> Result<bool, AuthError> {
        self.engine.has_permission(user_id, resource, action).await
    }

    fn has_role(&self, user: &User, role_name: &str) -> bool {
        authorize::has_role(user, role_name)
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        self.login.login(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixtureStore, hasher, user_with_password};
    use crate::{Permission, Role, TokenConfig};

    fn access(store: FixtureStore) -> Arc<dyn AccessControl> {
        let tokens = TokenService::new(TokenConfig::new(
            "service-test-secret-0123456789abcdef",
            "warden-test",
            chrono::Duration::hours(1),
        ))
        .unwrap();
        Arc::new(AuthService::new(store, hasher(), tokens).unwrap())
    }

    #[tokio::test]
    async fn login_then_authorize_through_the_trait_object() {
        let store = FixtureStore::default();
        let editor = Role::new("editor", "").with_permissions(vec![
            Permission::new("users", "read", ""),
            Permission::new("users", "write", ""),
        ]);
        let mut user = user_with_password("ed", "pw");
        user.roles = vec![editor];
        let user = store.insert(user);

        let access = access(store);
        let response = access
            .login(&LoginRequest {
                username: "ed".into(),
                password: "pw".into(),
            })
            .await
            .unwrap();
        assert_eq!(response.user.id, user.id);

        let loaded = access.get_identity(user.id).await.unwrap();
        assert!(access.has_role(&loaded, "editor"));
        assert!(!access.has_role(&loaded, "admin"));
        assert!(access.has_permission(user.id, "users", "write").await.unwrap());
        assert!(!access.has_permission(user.id, "roles", "read").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_identity_is_not_found() {
        let access = access(FixtureStore::default());
        let err = access.get_identity(UserId::new()).await.unwrap_err();
        assert_eq!(err, AuthError::NotFound("user"));
    }
}
