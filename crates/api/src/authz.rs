//! API-side authorization guard.
//!
//! Handlers call these before touching the directories. Decisions are made
//! by the core from a fresh identity load, so grants revoked after the token
//! was issued take effect immediately.

use axum::http::StatusCode;

use warden_auth::AccessControl;

use crate::app::errors;
use crate::context::PrincipalContext;

/// Require `(resource, action)` for the caller.
///
/// Denied → 403; identity gone → 401; store unavailable → 500.
pub async fn require_permission(
    access: &dyn AccessControl,
    principal: &PrincipalContext,
    resource: &str,
    action: &str,
) -> Result<(), axum::response::Response> {
    match access
        .has_permission(principal.user_id(), resource, action)
        .await
    {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::info!(user_id = %principal.user_id(), resource, action, "permission denied");
            Err(errors::forbidden(resource, action))
        }
        Err(e) => Err(errors::auth_error_to_response(e)),
    }
}

/// Require a named role on the identity loaded for this request.
pub fn require_role(
    access: &dyn AccessControl,
    principal: &PrincipalContext,
    role_name: &str,
) -> Result<(), axum::response::Response> {
    if access.has_role(principal.user(), role_name) {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            format!("role '{role_name}' required"),
        ))
    }
}
