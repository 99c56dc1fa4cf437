//! API Integration Tests
//!
//! Every test runs against the full router with in-memory storage.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use eventhub_api::auth::RegisterRequest;
use eventhub_api::create_router;
use eventhub_api::state::AppState;
use eventhub_api::testing::{create_router_for_testing, create_test_state, test_config};
use eventhub_core::{AppConfig, ClientMeta, InMemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const PASSWORD: &str = "Secret1";

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    store: Arc<InMemoryStore>,
}

impl TestApp {
    fn new() -> Self {
        let (state, store) = create_test_state();
        Self {
            router: create_router(state.clone()),
            state,
            store,
        }
    }

    fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = Arc::new(AppState::with_memory(config, store.clone()));
        Self {
            router: create_router(state.clone()),
            state,
            store,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    async fn register(&self, email: &str, username: &str) -> (StatusCode, Value) {
        self.send(json_request(
            "POST",
            "/api/v1/auth/register",
            None,
            json!({"username": username, "email": email, "password": PASSWORD}),
        ))
        .await
    }

    async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.send(json_request(
            "POST",
            "/api/v1/auth/login",
            None,
            json!({"email": email, "password": password}),
        ))
        .await
    }

    /// Register and log in, returning the login response body
    async fn signed_in(&self, email: &str, username: &str) -> Value {
        let (status, _) = self.register(email, username).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = self.login(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    /// Seed an administrator directly through the service
    async fn seeded_admin(&self) -> Value {
        self.state
            .auth
            .register(
                RegisterRequest {
                    username: "root".to_string(),
                    email: "root@example.com".to_string(),
                    password: PASSWORD.to_string(),
                    role: Some("ADMIN".to_string()),
                },
                &ClientMeta::default(),
            )
            .await
            .unwrap();
        let (status, body) = self.login("root@example.com", PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
        body
    }
}

fn json_request(method: &str, uri: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn bearer_request(method: &str, uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn token<'a>(body: &'a Value, field: &str) -> &'a str {
    body[field].as_str().unwrap()
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let app = TestApp::new();

    let (status, json) = app.send(bearer_request("GET", "/ready", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert!(json["checks"]["database"].is_null());

    app.state.set_ready(false);
    let (status, json) = app.send(bearer_request("GET", "/ready", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["ready"], false);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new();
    app.login("nobody@example.com", PASSWORD).await;

    let response = app
        .router
        .clone()
        .oneshot(bearer_request("GET", "/metrics", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains("eventhub_http_requests_total"));
    assert!(text.contains("eventhub_auth_outcomes_total"));
}

#[tokio::test]
async fn test_unknown_paths_do_not_grow_metric_series() {
    let app = TestApp::new();
    let prefix = format!("nowhere-{}", Uuid::new_v4().simple());

    for i in 0..100 {
        let (status, _) = app
            .send(bearer_request("GET", &format!("/{prefix}-{i}/x"), None))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let text = eventhub_api::metrics::render().unwrap();
    assert!(!text.contains(&prefix));
    assert!(text.contains("endpoint=\"unmatched\""));
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(bearer_request("GET", "/health", None))
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
}

// =============================================================================
// Registration Tests
// =============================================================================

#[tokio::test]
async fn test_register_returns_profile_without_secrets() {
    let app = TestApp::new();

    let (status, body) = app.register("alice@example.com", "alice").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["username"], "alice");
    assert!(body["role"].is_null());
    assert_eq!(body["is_organizer"], false);
    assert!(body.get("password_hash").is_none());
    assert!(Uuid::parse_str(body["id"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = TestApp::new();
    app.register("alice@example.com", "alice").await;

    let (status, body) = app.register("alice@example.com", "alice2").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_rejects_invalid_input() {
    let app = TestApp::new();

    for payload in [
        json!({"username": "bob", "email": "not-an-email", "password": PASSWORD}),
        json!({"username": "bob", "email": "bob@example.com", "password": "short"}),
        json!({"username": "bob", "email": "bob@example.com", "password": "nouppercase1"}),
        json!({"username": "", "email": "bob@example.com", "password": PASSWORD}),
    ] {
        let (status, body) = app
            .send(json_request("POST", "/api/v1/auth/register", None, payload.clone()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
        assert_eq!(body["code"], "BAD_REQUEST");
    }
}

#[tokio::test]
async fn test_register_rejects_behavioral_roles() {
    let app = TestApp::new();

    for role in ["ORGANIZER", "ATTENDEE", "SUPERUSER"] {
        let (status, _) = app
            .send(json_request(
                "POST",
                "/api/v1/auth/register",
                None,
                json!({"username": "bob", "email": "bob@example.com", "password": PASSWORD, "role": role}),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{role}");
    }
}

#[tokio::test]
async fn test_register_admin_requires_admin_caller() {
    let app = TestApp::new();
    let payload = json!({
        "username": "mallory",
        "email": "mallory@example.com",
        "password": PASSWORD,
        "role": "ADMIN"
    });

    // Anonymous
    let (status, _) = app
        .send(json_request("POST", "/api/v1/auth/register", None, payload.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Authenticated, not an administrator
    let session = app.signed_in("bob@example.com", "bob").await;
    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/v1/auth/register",
            Some(token(&session, "access_token")),
            payload.clone(),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Administrator
    let admin = app.seeded_admin().await;
    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/v1/auth/register",
            Some(token(&admin, "access_token")),
            payload,
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "ADMIN");
}

// =============================================================================
// Login Tests
// =============================================================================

#[tokio::test]
async fn test_login_returns_token_pair() {
    let app = TestApp::new();

    let body = app.signed_in("alice@example.com", "alice").await;

    assert_eq!(body["token_type"], "Bearer");
    assert!(body["expires_in"].as_u64().unwrap() > 0);
    assert_ne!(token(&body, "access_token"), token(&body, "refresh_token"));
    assert_eq!(body["user"]["email"], "alice@example.com");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.register("alice@example.com", "alice").await;

    let (wrong_password_status, wrong_password) =
        app.login("alice@example.com", "Wrong1").await;
    let (unknown_status, unknown) = app.login("ghost@example.com", PASSWORD).await;

    assert_eq!(wrong_password_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown);
    assert_eq!(wrong_password["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_login_fails_fast_when_hashing_is_saturated() {
    let mut config = test_config();
    config.hashing.workers = 1;
    config.hashing.max_queue = 0;
    let app = TestApp::with_config(config);
    app.register("alice@example.com", "alice").await;

    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
    let pool = app.state.auth.worker_pool().clone();
    let blocker = tokio::spawn(async move {
        pool.run(move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        })
        .await
    });
    started_rx.await.unwrap();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/auth/login",
            None,
            json!({"email": "alice@example.com", "password": PASSWORD}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().get(header::RETRY_AFTER).is_some());

    release_tx.send(()).unwrap();
    blocker.await.unwrap().unwrap();

    let (status, _) = app.login("alice@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Session Tests
// =============================================================================

#[tokio::test]
async fn test_refresh_rotates_and_old_token_is_rejected() {
    let app = TestApp::new();
    let session = app.signed_in("alice@example.com", "alice").await;
    let first_refresh = token(&session, "refresh_token").to_string();

    let (status, rotated) = app
        .send(bearer_request("POST", "/api/v1/auth/refresh", Some(&first_refresh)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(token(&rotated, "refresh_token"), first_refresh);

    // Reuse of the rotated-out token
    let (status, body) = app
        .send(bearer_request("POST", "/api/v1/auth/refresh", Some(&first_refresh)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    // The new token still works
    let (status, _) = app
        .send(bearer_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(token(&rotated, "refresh_token")),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = TestApp::new();
    let session = app.signed_in("alice@example.com", "alice").await;

    let (status, _) = app
        .send(bearer_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(token(&session, "access_token")),
        ))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_ends_the_session() {
    let app = TestApp::new();
    let session = app.signed_in("alice@example.com", "alice").await;
    let refresh = token(&session, "refresh_token");

    let (status, _) = app
        .send(bearer_request("POST", "/api/v1/auth/logout", Some(refresh)))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(bearer_request("POST", "/api/v1/auth/refresh", Some(refresh)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_requires_a_token() {
    let app = TestApp::new();

    let (status, body) = app
        .send(bearer_request("POST", "/api/v1/auth/logout", None))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_logout_all_ends_every_session() {
    let app = TestApp::new();
    let first = app.signed_in("alice@example.com", "alice").await;
    let (_, second) = app.login("alice@example.com", PASSWORD).await;

    let (status, _) = app
        .send(bearer_request(
            "POST",
            "/api/v1/auth/logout-all",
            Some(token(&first, "refresh_token")),
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for session in [&first, &second] {
        let (status, _) = app
            .send(bearer_request(
                "POST",
                "/api/v1/auth/refresh",
                Some(token(session, "refresh_token")),
            ))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let user_id = Uuid::parse_str(first["user"]["id"].as_str().unwrap()).unwrap();
    assert!(app
        .store
        .tokens_for(user_id)
        .await
        .iter()
        .all(|record| record.revoked));
}

// =============================================================================
// Profile and Role Tests
// =============================================================================

#[tokio::test]
async fn test_me_requires_access_token() {
    let app = TestApp::new();

    let (status, _) = app.send(bearer_request("GET", "/api/v1/auth/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(bearer_request("GET", "/api/v1/auth/me", Some("not.a.jwt")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_reflects_current_relationships() {
    let app = TestApp::new();
    let session = app.signed_in("alice@example.com", "alice").await;
    let access = token(&session, "access_token");

    let (status, body) = app
        .send(bearer_request("GET", "/api/v1/auth/me", Some(access)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_organizer"], false);
    assert_eq!(body["is_attendee"], false);

    // Facts change after the token was issued
    let user_id = Uuid::parse_str(body["id"].as_str().unwrap()).unwrap();
    app.store.add_event_owner(user_id).await;
    app.store.add_registration(user_id).await;

    let (_, body) = app
        .send(bearer_request("GET", "/api/v1/auth/me", Some(access)))
        .await;
    assert_eq!(body["is_organizer"], true);
    assert_eq!(body["is_attendee"], true);
}

// =============================================================================
// Admin Tests
// =============================================================================

#[tokio::test]
async fn test_revoke_sessions_is_admin_only() {
    let app = TestApp::new();
    let alice = app.signed_in("alice@example.com", "alice").await;
    let alice_id = alice["user"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/admin/users/{alice_id}/sessions");

    // Organizer facts do not grant admin operations
    app.store
        .add_event_owner(Uuid::parse_str(&alice_id).unwrap())
        .await;
    let (status, body) = app
        .send(bearer_request("DELETE", &uri, Some(token(&alice, "access_token"))))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let admin = app.seeded_admin().await;
    let (status, _) = app
        .send(bearer_request("DELETE", &uri, Some(token(&admin, "access_token"))))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(bearer_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(token(&alice, "refresh_token")),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_revoke_sessions_unknown_user() {
    let app = TestApp::new();
    let admin = app.seeded_admin().await;

    let (status, body) = app
        .send(bearer_request(
            "DELETE",
            &format!("/api/v1/admin/users/{}/sessions", Uuid::new_v4()),
            Some(token(&admin, "access_token")),
        ))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = TestApp::new();

    let (status, body) = app
        .send(bearer_request("GET", "/api-docs/openapi.json", None))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/auth/login"].is_object());
}
