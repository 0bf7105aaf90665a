use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use warden_api::app::{AppServices, build_app};
use warden_auth::{PasswordHasher, TokenConfig, TokenService};
use warden_infra::{CredentialStore, InMemoryCredentialStore, seed_default_data};

const JWT_SECRET: &str = "black-box-test-secret-with-enough-bytes";
const ADMIN_PASSWORD: &str = "adminpassword";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over a seeded in-memory store, on an ephemeral port.
        let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
        let hasher = PasswordHasher::new(4).expect("valid bcrypt cost");
        seed_default_data(store.as_ref(), &hasher, ADMIN_PASSWORD)
            .await
            .expect("seed default data");

        let tokens = TokenService::new(TokenConfig::new(JWT_SECRET, "warden", ChronoDuration::hours(1)))
            .expect("token service");
        let services = AppServices::new(store, hasher, tokens).expect("services");
        let app = build_app(Arc::new(services));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, client: &reqwest::Client, username: &str, password: &str) -> reqwest::Response {
        client
            .post(self.url("/api/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap()
    }

    async fn token_for(&self, client: &reqwest::Client, username: &str, password: &str) -> String {
        let res = self.login(client, username, password).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn role_id(&self, client: &reqwest::Client, token: &str, name: &str) -> String {
        let res = client
            .get(self.url("/api/roles"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["items"]
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["name"] == name)
            .and_then(|r| r["id"].as_str())
            .unwrap_or_else(|| panic!("role {name} not seeded"))
            .to_string()
    }

    /// Create a user through the API and return its id.
    async fn create_user(&self, client: &reqwest::Client, admin: &str, username: &str, password: &str) -> String {
        let res = client
            .post(self.url("/api/users"))
            .bearer_auth(admin)
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": password,
                "full_name": username,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_with(algorithm: Algorithm, sub: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = json!({
        "sub": sub,
        "email": "admin@example.com",
        "iss": "warden",
        "iat": now,
        "nbf": now,
        "exp": now + 600,
    });

    jsonwebtoken::encode(
        &Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for path in ["/api/me", "/api/users", "/api/roles", "/api/permissions"] {
        let res = client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "missing_token");
    }
}

#[tokio::test]
async fn admin_login_and_me() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = srv.login(&client, "admin", ADMIN_PASSWORD).await;
    assert_eq!(res.status(), StatusCode::OK);
    let login: Value = res.json().await.unwrap();
    assert_eq!(login["token_type"], "Bearer");
    assert_eq!(login["user"]["username"], "admin");
    assert!(login["user"].get("password").is_none());

    let token = login["access_token"].as_str().unwrap();
    let res = client
        .get(srv.url("/api/me"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["user"]["email"], "admin@example.com");
    assert_eq!(me["session"]["issuer"], "warden");
    let permissions: Vec<&str> = me["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p.as_str())
        .collect();
    assert!(permissions.contains(&"users:read"));
    assert!(permissions.contains(&"permissions:write"));
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_indistinguishable() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let wrong = srv.login(&client, "admin", "not-the-password").await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let wrong: Value = wrong.json().await.unwrap();

    let unknown = srv.login(&client, "nobody", "whatever").await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let unknown: Value = unknown.json().await.unwrap();

    assert_eq!(wrong, unknown);
    assert_eq!(wrong["error"], "invalid_credentials");
}

#[tokio::test]
async fn viewer_can_read_but_not_write() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = srv.token_for(&client, "admin", ADMIN_PASSWORD).await;

    let user_id = srv.create_user(&client, &admin, "vera", "vera-password").await;
    let viewer = srv.role_id(&client, &admin, "viewer").await;

    let res = client
        .post(srv.url(&format!("/api/users/{user_id}/roles")))
        .bearer_auth(&admin)
        .json(&json!({ "role_id": viewer }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let token = srv.token_for(&client, "vera", "vera-password").await;

    let res = client
        .get(srv.url("/api/users"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(srv.url("/api/permissions"))
        .bearer_auth(&token)
        .json(&json!({ "resource": "articles", "action": "read" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");

    let res = client
        .get(srv.url("/api/me/roles/viewer"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url("/api/me/roles/admin"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn revoked_grant_takes_effect_without_new_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = srv.token_for(&client, "admin", ADMIN_PASSWORD).await;

    let user_id = srv.create_user(&client, &admin, "rita", "rita-password").await;
    let viewer = srv.role_id(&client, &admin, "viewer").await;
    client
        .post(srv.url(&format!("/api/users/{user_id}/roles")))
        .bearer_auth(&admin)
        .json(&json!({ "role_id": viewer }))
        .send()
        .await
        .unwrap();

    let token = srv.token_for(&client, "rita", "rita-password").await;
    let res = client.get(srv.url("/api/roles")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .delete(srv.url(&format!("/api/users/{user_id}/roles/{viewer}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/api/roles")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn explain_reports_granting_roles_and_denials() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = srv.token_for(&client, "admin", ADMIN_PASSWORD).await;

    let res = client
        .get(srv.url("/api/me/explain?resource=users&action=read"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["explanation"]["granted"], true);
    assert!(
        body["explanation"]["granting_roles"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r == "admin")
    );

    let res = client
        .get(srv.url("/api/me/explain?resource=users&action=delete"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["explanation"]["granted"], false);
}

#[tokio::test]
async fn duplicate_permission_is_a_conflict() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = srv.token_for(&client, "admin", ADMIN_PASSWORD).await;

    let create = || {
        client
            .post(srv.url("/api/permissions"))
            .bearer_auth(&admin)
            .json(&json!({ "resource": "articles", "action": "read", "description": "Read articles" }))
            .send()
    };

    let res = create().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = create().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn malformed_ids_and_missing_records() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = srv.token_for(&client, "admin", ADMIN_PASSWORD).await;

    let res = client
        .get(srv.url("/api/users/not-a-uuid"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(srv.url(&format!("/api/roles/{}", uuid::Uuid::now_v7())))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tampered_and_foreign_algorithm_tokens_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = srv.token_for(&client, "admin", ADMIN_PASSWORD).await;

    // Flip the first signature character.
    let mut tampered = admin.clone().into_bytes();
    let sig = admin.rfind('.').unwrap() + 1;
    tampered[sig] = if tampered[sig] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered).unwrap();

    let res = client.get(srv.url("/api/me")).bearer_auth(&tampered).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_token");

    let res = client.get(srv.url("/api/me")).bearer_auth(&admin).send().await.unwrap();
    let me: Value = res.json().await.unwrap();
    let admin_id = me["user"]["id"].as_str().unwrap();

    let hs512 = mint_with(Algorithm::HS512, admin_id);
    let res = client.get(srv.url("/api/me")).bearer_auth(&hs512).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Control: the same claims signed with HS256 are accepted.
    let hs256 = mint_with(Algorithm::HS256, admin_id);
    let res = client.get(srv.url("/api/me")).bearer_auth(&hs256).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn token_of_deleted_user_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = srv.token_for(&client, "admin", ADMIN_PASSWORD).await;

    let user_id = srv.create_user(&client, &admin, "gone", "gone-password").await;
    let token = srv.token_for(&client, "gone", "gone-password").await;

    let res = client.get(srv.url("/api/me")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .delete(srv.url(&format!("/api/users/{user_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client.get(srv.url("/api/me")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn permission_is_checked_before_the_body_is_parsed() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = srv.token_for(&client, "admin", ADMIN_PASSWORD).await;

    let user_id = srv.create_user(&client, &admin, "nora", "nora-password").await;
    let viewer = srv.role_id(&client, &admin, "viewer").await;
    let res = client
        .post(srv.url(&format!("/api/users/{user_id}/roles")))
        .bearer_auth(&admin)
        .json(&json!({ "role_id": viewer }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let token = srv.token_for(&client, "nora", "nora-password").await;

    // Without write access a malformed body is still a 403.
    for path in ["/api/users", "/api/roles", "/api/permissions"] {
        let res = client
            .post(srv.url(path))
            .bearer_auth(&token)
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{path}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "forbidden");
    }

    // With write access the same body is rejected as a bad request.
    let res = client
        .post(srv.url("/api/permissions"))
        .bearer_auth(&admin)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");
}
