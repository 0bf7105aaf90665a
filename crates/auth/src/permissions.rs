use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::PermissionId;

/// The `(resource, action)` pair a permission grants, e.g. `users` + `read`.
///
/// Matching is exact and case-sensitive: there is no wildcard and no
/// hierarchy between resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionKey {
    resource: Cow<'static, str>,
    action: Cow<'static, str>,
}

impl PermissionKey {
    pub fn new(resource: impl Into<Cow<'static, str>>, action: impl Into<Cow<'static, str>>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

impl core::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

/// A permission record: an atomic `(resource, action)` grant.
///
/// `(resource, action)` is unique across all permission records; the store
/// enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub resource: String,
    pub action: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    pub fn new(
        resource: impl Into<String>,
        action: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PermissionId::new(),
            resource: resource.into(),
            action: action.into(),
            description: description.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> PermissionKey {
        PermissionKey::new(self.resource.clone(), self.action.clone())
    }

    pub fn matches(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }
}
