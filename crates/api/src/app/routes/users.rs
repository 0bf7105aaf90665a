use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};

use warden_auth::UserProfile;
use warden_core::{RoleId, UserId};
use warden_infra::{CreateUser, UpdateUser};

use crate::app::{dto, errors, services::AppServices};
use crate::authz;
use crate::context::PrincipalContext;

const RESOURCE: &str = "users";

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/:id/roles", post(assign_role))
        .route("/:id/roles/:role_id", delete(revoke_role))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "read").await {
        return resp;
    }

    match services.users.list().await {
        Ok(users) => {
            let items: Vec<UserProfile> = users.iter().map(|u| u.profile()).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "read").await {
        return resp;
    }
    let user_id: UserId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.users.get(user_id).await {
        Ok(user) => (StatusCode::OK, Json(user.profile())).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<CreateUser>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "write").await {
        return resp;
    }
    let body = match dto::json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    match services.users.create(body).await {
        Ok(user) => (StatusCode::CREATED, Json(user.profile())).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<UpdateUser>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "write").await {
        return resp;
    }
    let body = match dto::json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    let user_id: UserId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.users.update(user_id, body).await {
        Ok(user) => (StatusCode::OK, Json(user.profile())).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "write").await {
        return resp;
    }
    let user_id: UserId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.users.delete(user_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::AssignRoleRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "write").await {
        return resp;
    }
    let body = match dto::json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    let user_id: UserId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.users.assign_role(user_id, body.role_id).await {
        Ok(user) => (StatusCode::OK, Json(user.profile())).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn revoke_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, role_id)): Path<(String, String)>,
) -> axum::response::Response {
    if let Err(resp) = authz::require_permission(services.access.as_ref(), &principal, RESOURCE, "write").await {
        return resp;
    }
    let user_id: UserId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let role_id: RoleId = match dto::parse_id(&role_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.users.revoke_role(user_id, role_id).await {
        Ok(user) => (StatusCode::OK, Json(user.profile())).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
