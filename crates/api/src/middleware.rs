use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use warden_auth::{AccessControl, TokenService};

use crate::app::errors;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: TokenService,
    pub access: Arc<dyn AccessControl>,
}

/// Request gate for protected routes.
///
/// 1. Require `Authorization: Bearer <token>` and verify it (401 on any failure).
/// 2. Load the identity named by the token (401 if it no longer exists,
///    500 if the store is unavailable).
/// 3. Insert a [`PrincipalContext`] for handlers.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers()).map_err(|_| {
        errors::json_error(StatusCode::UNAUTHORIZED, "missing_token", "bearer token required")
    })?;

    let claims = state
        .tokens
        .verify(token)
        .map_err(errors::auth_error_to_response)?;

    let user = state
        .access
        .get_identity(claims.user_id())
        .await
        .map_err(errors::auth_error_to_response)?;

    tracing::debug!(user_id = %user.id, "request authenticated");
    req.extensions_mut().insert(PrincipalContext::new(claims, user));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::{Extension, Router, body::Body, http::Request, routing::get};
    use chrono::Duration;
    use tower::ServiceExt;

    use warden_auth::{
        AuthError, LoginRequest, LoginResponse, PasswordHash, TokenConfig, User,
    };
    use warden_core::UserId;

    /// What the stub returns from `get_identity`.
    #[derive(Clone, Copy)]
    enum Lookup {
        Found,
        Missing,
        Outage,
    }

    struct StubAccess {
        lookup: Lookup,
    }

    #[async_trait]
    impl AccessControl for StubAccess {
        async fn get_identity(&self, user_id: UserId) -> Result<User, AuthError> {
            match self.lookup {
                Lookup::Found => {
                    let mut user = User::new(
                        "stub",
                        "stub@example.com",
                        PasswordHash::from_stored("unused"),
                        "Stub User",
                    );
                    user.id = user_id;
                    Ok(user)
                }
                Lookup::Missing => Err(AuthError::NotFound("user")),
                Lookup::Outage => Err(AuthError::StorageFault("connection refused".into())),
            }
        }

        async fn has_permission(&self, _: UserId, _: &str, _: &str) -> Result<bool, AuthError> {
            Ok(false)
        }

        fn has_role(&self, _: &User, _: &str) -> bool {
            false
        }

        async fn login(&self, _: &LoginRequest) -> Result<LoginResponse, AuthError> {
            Err(AuthError::InvalidCredentials)
        }
    }

    fn tokens() -> TokenService {
        TokenService::new(TokenConfig::new(
            "middleware-test-secret-0123456789abcdef",
            "warden-test",
            Duration::hours(1),
        ))
        .unwrap()
    }

    async fn whoami(Extension(principal): Extension<PrincipalContext>) -> String {
        principal.user_id().to_string()
    }

    fn app(lookup: Lookup) -> Router {
        let state = AuthState {
            tokens: tokens(),
            access: Arc::new(StubAccess { lookup }),
        };
        Router::new()
            .route("/whoami", get(whoami))
            .layer(axum::middleware::from_fn_with_state(state, auth_middleware))
    }

    async fn call(app: Router, authorization: Option<String>) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            req = req.header("authorization", value);
        }
        let res = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ));
        (status, body)
    }

    #[tokio::test]
    async fn valid_token_reaches_the_handler() {
        let user_id = UserId::new();
        let token = tokens().issue(user_id, "stub@example.com").unwrap();

        let (status, body) = call(app(Lookup::Found), Some(format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::Value::String(user_id.to_string()));
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthorized() {
        for header in [None, Some("Basic abc".to_string()), Some("Bearer ".to_string())] {
            let (status, body) = call(app(Lookup::Found), header).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], "missing_token");
        }
    }

    #[tokio::test]
    async fn invalid_token_is_unauthorized() {
        let (status, body) = call(app(Lookup::Found), Some("Bearer not.a.token".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_token");
    }

    #[tokio::test]
    async fn vanished_identity_is_unauthorized() {
        let token = tokens().issue(UserId::new(), "gone@example.com").unwrap();
        let (status, body) = call(app(Lookup::Missing), Some(format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
    }

    #[tokio::test]
    async fn store_outage_is_a_server_error() {
        let token = tokens().issue(UserId::new(), "a@example.com").unwrap();
        let (status, body) = call(app(Lookup::Outage), Some(format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "storage_error");
        assert!(!body["message"].as_str().unwrap().contains("connection refused"));
    }
}
