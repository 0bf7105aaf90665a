use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::RoleId;

use crate::Permission;

/// A named bundle of permissions, assignable to users.
///
/// Role names are globally unique. A role may be shared by many users and a
/// permission by many roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: RoleId::new(),
            name: name.into(),
            description: description.into(),
            permissions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Whether this role carries the exact `(resource, action)` pair.
    pub fn grants(&self, resource: &str, action: &str) -> bool {
        self.permissions.iter().any(|p| p.matches(resource, action))
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}
