use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use warden_core::PermissionId;
use warden_infra::{CreatePermission, UpdatePermission};

use crate::app::{dto, errors, services::AppServices};
use crate::authz;
use crate::context::PrincipalContext;

const RESOURCE: &str = "permissions";

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_permissions).post(create_permission))
        .route(
            "/:id",
            get(get_permission).put(update_permission).delete(delete_permission),
        )
}

pub async fn list_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "read").await {
        return resp;
    }

    match services.permissions.list().await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "read").await {
        return resp;
    }
    let permission_id: PermissionId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.permissions.get(permission_id).await {
        Ok(permission) => (StatusCode::OK, Json(permission)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn create_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<CreatePermission>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "write").await {
        return resp;
    }
    let body = match dto::json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    match services.permissions.create(body).await {
        Ok(permission) => (StatusCode::CREATED, Json(permission)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<UpdatePermission>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "write").await {
        return resp;
    }
    let body = match dto::json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    let permission_id: PermissionId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.permissions.update(permission_id, body).await {
        Ok(permission) => (StatusCode::OK, Json(permission)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "write").await {
        return resp;
    }
    let permission_id: PermissionId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.permissions.delete(permission_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
