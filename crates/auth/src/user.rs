//! User identity model.
//!
//! A [`User`] is what the credential store hands to the core: the identity
//! with its roles and each role's permissions already expanded. It carries
//! the password digest and is therefore never serialized; [`UserProfile`] is
//! the projection that leaves the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::UserId;

use crate::{PasswordHash, Role};

/// An authenticable principal.
///
/// # Invariants
/// - `username` and `email` are globally unique (enforced by the store).
/// - `password_hash` is a one-way digest, never plaintext.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: PasswordHash,
    pub full_name: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: PasswordHash,
        full_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            username: username.into(),
            email: email.into(),
            password_hash,
            full_name: full_name.into(),
            roles: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_roles(mut self, roles: Vec<Role>) -> Self {
        self.roles = roles;
        self
    }

    /// Sanitized projection without the password digest.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            roles: self.roles.clone(),
        }
    }
}

/// The externally visible view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        user.profile()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_never_contains_the_digest() {
        let hash = PasswordHash::from_stored("$2b$04$abcdefghijklmnopqrstuuJ5Jp0m0w6f2rQ2sH8b9yqC0v1d3e4f5g");
        let user = User::new("alice", "alice@example.com", hash, "Alice")
            .with_roles(vec![Role::new("viewer", "read only")]);

        let json = serde_json::to_value(user.profile()).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(obj["username"], "alice");
        assert_eq!(obj["email"], "alice@example.com");
        assert_eq!(obj["full_name"], "Alice");
        assert_eq!(obj["roles"][0]["name"], "viewer");
        assert!(!obj.contains_key("password"));
        assert!(!obj.contains_key("password_hash"));
        assert!(!json.to_string().contains("$2b$"));
    }

    #[test]
    fn debug_output_redacts_digest() {
        let hash = PasswordHash::from_stored("$2b$04$abcdefghijklmnopqrstuuJ5Jp0m0w6f2rQ2sH8b9yqC0v1d3e4f5g");
        let user = User::new("bob", "bob@example.com", hash, "Bob");
        assert!(!format!("{user:?}").contains("$2b$"));
    }
}
