use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};

use warden_core::{PermissionId, RoleId};
use warden_infra::{CreateRole, UpdateRole};

use crate::app::{dto, errors, services::AppServices};
use crate::authz;
use crate::context::PrincipalContext;

const RESOURCE: &str = "roles";

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route("/:id", get(get_role).put(update_role).delete(delete_role))
        .route("/:id/permissions", post(grant_permission))
        .route("/:id/permissions/:permission_id", delete(revoke_permission))
}

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "read").await {
        return resp;
    }

    match services.roles.list().await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "read").await {
        return resp;
    }
    let role_id: RoleId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.roles.get(role_id).await {
        Ok(role) => (StatusCode::OK, Json(role)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<CreateRole>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "write").await {
        return resp;
    }
    let body = match dto::json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    match services.roles.create(body).await {
        Ok(role) => (StatusCode::CREATED, Json(role)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<UpdateRole>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "write").await {
        return resp;
    }
    let body = match dto::json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    let role_id: RoleId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.roles.update(role_id, body).await {
        Ok(role) => (StatusCode::OK, Json(role)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "write").await {
        return resp;
    }
    let role_id: RoleId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.roles.delete(role_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn grant_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::GrantPermissionRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "write").await {
        return resp;
    }
    let body = match dto::json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    let role_id: RoleId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.roles.grant_permission(role_id, body.permission_id).await {
        Ok(role) => (StatusCode::OK, Json(role)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn revoke_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, permission_id)): Path<(String, String)>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "write").await {
        return resp;
    }
    let role_id: RoleId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let permission_id: PermissionId = match dto::parse_id(&permission_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.roles.revoke_permission(role_id, permission_id).await {
        Ok(role) => (StatusCode::OK, Json(role)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
