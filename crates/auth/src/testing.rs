//! In-crate test fixtures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use warden_core::UserId;

use crate::{IdentityStore, PasswordHash, PasswordHasher, Role, StoreError, User};

pub(crate) const TEST_COST: u32 = 4;

pub(crate) fn hasher() -> PasswordHasher {
    PasswordHasher::new(TEST_COST).unwrap()
}

pub(crate) fn user_with_roles(username: &str, roles: Vec<Role>) -> User {
    User::new(
        username,
        format!("{username}@example.com"),
        PasswordHash::from_stored("not-a-digest"),
        username,
    )
    .with_roles(roles)
}

pub(crate) fn user_with_password(username: &str, password: &str) -> User {
    let mut user = user_with_roles(username, vec![]);
    user.password_hash = hasher().hash(password).unwrap();
    user
}

/// Map-backed `IdentityStore` with an outage switch.
#[derive(Clone, Default)]
pub(crate) struct FixtureStore {
    users: Arc<RwLock<HashMap<UserId, User>>>,
    unavailable: Arc<AtomicBool>,
}

impl FixtureStore {
    pub(crate) fn insert(&self, user: User) -> User {
        self.users.write().unwrap().insert(user.id, user.clone());
        user
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for FixtureStore {
    async fn get_identity_by_id(&self, id: UserId) -> Result<User, StoreError> {
        self.check()?;
        self.users
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("user"))
    }

    async fn get_identity_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.check()?;
        self.users
            .read()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StoreError::NotFound("user"))
    }
}
