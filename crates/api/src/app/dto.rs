use std::str::FromStr;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_auth::{AuthorizationExplanation, UserProfile};
use warden_core::{DomainError, PermissionId, RoleId};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: RoleId,
}

#[derive(Debug, Deserialize)]
pub struct GrantPermissionRequest {
    pub permission_id: PermissionId,
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub resource: String,
    pub action: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub issuer: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserProfile,
    pub session: SessionInfo,
    /// Sorted `resource:action` strings.
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    pub explanation: AuthorizationExplanation,
}

// -------------------------
// Extraction helpers
// -------------------------

/// Unwrap a JSON body that was extracted leniently so the permission guard
/// runs first; a rejection becomes a 400 `invalid_body` response.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(inner)| inner).map_err(|rejection| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
    })
}

/// Parse a typed id from a path segment, or a 400 `invalid_id` response.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}
