use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use warden_auth::AuthError;
use warden_core::DomainError;

/// Map core authentication/authorization failures to HTTP.
///
/// Messages come from `Display`, which never carries internal detail; the
/// detail of server-side failures is logged instead.
pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match &err {
        AuthError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, err.code(), err.to_string())
        }
        AuthError::InvalidToken => json_error(StatusCode::UNAUTHORIZED, err.code(), err.to_string()),
        // The token was valid but its subject no longer exists.
        AuthError::NotFound(_) => json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized"),
        AuthError::StorageFault(detail) => {
            tracing::error!(error = %detail, "credential store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, err.code(), err.to_string())
        }
        AuthError::Hashing(detail) | AuthError::TokenIssue(detail) => {
            tracing::error!(error = %detail, "internal authentication failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, err.code(), err.to_string())
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match &err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg.clone()),
        DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg.clone()),
        DomainError::Storage(detail) => {
            tracing::error!(error = %detail, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", err.to_string())
        }
    }
}

pub fn forbidden(resource: &str, action: &str) -> axum::response::Response {
    json_error(
        StatusCode::FORBIDDEN,
        "forbidden",
        format!("missing permission '{resource}:{action}'"),
    )
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
