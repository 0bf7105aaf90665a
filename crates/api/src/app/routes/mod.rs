use axum::{Router, routing::get};

pub mod auth;
pub mod permissions;
pub mod roles;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints (mounted under `/api`).
pub fn router() -> Router {
    Router::new()
        .route("/me", get(auth::me))
        .route("/me/explain", get(auth::explain))
        .route("/me/roles/:name", get(auth::check_role))
        .nest("/users", users::router())
        .nest("/roles", roles::router())
        .nest("/permissions", permissions::router())
}
