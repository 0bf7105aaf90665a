use std::collections::BTreeSet;

use serde::Serialize;

use warden_core::UserId;

use crate::{AuthError, IdentityStore, PermissionKey, User};

/// Whether any of the user's roles carries exactly `(resource, action)`.
///
/// Pure policy check over an already-loaded identity:
/// - No IO
/// - No panics
/// - Additive only: there are no deny rules, wildcards or hierarchies
pub fn grants(user: &User, resource: &str, action: &str) -> bool {
    user.roles.iter().any(|role| role.grants(resource, action))
}

/// Exact (case-sensitive) role name membership.
pub fn has_role(user: &User, role_name: &str) -> bool {
    user.roles.iter().any(|role| role.name == role_name)
}

/// Union of the permissions granted through all of the user's roles.
pub fn effective_permissions(user: &User) -> BTreeSet<PermissionKey> {
    user.roles
        .iter()
        .flat_map(|role| role.permissions.iter().map(|p| p.key()))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// Answers "why was this request allowed/denied?" for debugging and for
/// the `/api/me` style introspection endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    /// The permission that was being checked, as `resource:action`.
    pub required_permission: String,

    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    pub user_id: UserId,

    pub roles: Vec<String>,

    /// Roles that carry the required permission (empty when denied).
    pub granting_roles: Vec<String>,

    /// Sorted `resource:action` strings.
    pub effective_permissions: Vec<String>,

    /// If denied, this explains what was missing.
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    NoRoles,
    MissingPermission,
}

/// Explain the decision [`grants`] would make for `(resource, action)`.
pub fn explain(user: &User, resource: &str, action: &str) -> AuthorizationExplanation {
    let required = PermissionKey::new(resource.to_string(), action.to_string());
    let required_str = required.to_string();

    let roles: Vec<String> = user.roles.iter().map(|r| r.name.clone()).collect();
    let effective: Vec<String> = effective_permissions(user)
        .iter()
        .map(|k| k.to_string())
        .collect();

    let granting_roles: Vec<String> = user
        .roles
        .iter()
        .filter(|role| role.grants(resource, action))
        .map(|role| role.name.clone())
        .collect();

    if !granting_roles.is_empty() {
        return AuthorizationExplanation {
            reason: format!("Permission '{required_str}' granted by role(s) {granting_roles:?}"),
            required_permission: required_str,
            granted: true,
            user_id: user.id,
            roles,
            granting_roles,
            effective_permissions: effective,
            denial_reason: None,
        };
    }

    let denial_reason = if user.roles.is_empty() {
        DenialReason {
            kind: DenialKind::NoRoles,
            message: "User has no roles assigned".to_string(),
            suggestions: vec![format!(
                "Assign a role that grants the '{required_str}' permission"
            )],
        }
    } else {
        DenialReason {
            kind: DenialKind::MissingPermission,
            message: format!("Missing required permission: '{required_str}'"),
            suggestions: vec![
                format!("Assign a role that grants the '{required_str}' permission"),
                format!("Grant '{required_str}' to one of the roles {roles:?}"),
            ],
        }
    };

    AuthorizationExplanation {
        reason: format!(
            "User does not have permission '{required_str}'. Current permissions: {effective:?}"
        ),
        required_permission: required_str,
        granted: false,
        user_id: user.id,
        roles,
        granting_roles,
        effective_permissions: effective,
        denial_reason: Some(denial_reason),
    }
}

/// Resolves permission decisions by loading identities from the store.
///
/// Stateless: every decision is computed fresh from one identity snapshot.
#[derive(Debug, Clone)]
pub struct AuthorizationEngine<S> {
    store: S,
}

impl<S: IdentityStore> AuthorizationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Load the identity with roles and permissions expanded.
    pub async fn load(&self, user_id: UserId) -> Result<User, AuthError> {
        Ok(self.store.get_identity_by_id(user_id).await?)
    }

    /// `Ok(false)` when no role matches; errors only for a missing identity
    /// or an unavailable store.
    #[tracing::instrument(skip(self), fields(user_id = %user_id), err)]
    pub async fn has_permission(
        &self,
        user_id: UserId,
        resource: &str,
        action: &str,
    ) -> Result<bool, AuthError> {
        let user = self.load(user_id).await?;
        let granted = grants(&user, resource, action);
        tracing::debug!(resource, action, granted, "permission check");
        Ok(granted)
    }
}
