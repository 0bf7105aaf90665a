use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};

use warden_auth::{LoginRequest, effective_permissions, explain as explain_decision};

use crate::app::{dto, errors, services::AppServices};
use crate::authz;
use crate::context::PrincipalContext;

/// POST /api/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<LoginRequest>,
) -> axum::response::Response {
    match services.access.login(&body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// GET /api/me - the caller's profile, session and effective permissions
pub async fn me(Extension(principal): Extension<PrincipalContext>) -> axum::response::Response {
    let claims = principal.claims();
    let body = dto::MeResponse {
        user: principal.profile(),
        session: dto::SessionInfo {
            issuer: claims.iss.clone(),
            issued_at: claims.issued_at(),
            expires_at: claims.expires_at(),
        },
        permissions: effective_permissions(principal.user())
            .iter()
            .map(|k| k.to_string())
            .collect(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// GET /api/me/explain?resource=..&action=.. - why the caller would be allowed/denied
pub async fn explain(
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ExplainQuery>,
) -> axum::response::Response {
    let explanation = explain_decision(principal.user(), &query.resource, &query.action);
    (StatusCode::OK, Json(dto::ExplainResponse { explanation })).into_response()
}

/// GET /api/me/roles/:name
pub async fn check_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(name): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_role(services.access.as_ref(), &principal, &name) {
        return resp;
    }
    (StatusCode::OK, Json(serde_json::json!({ "role": name, "held": true }))).into_response()
}
