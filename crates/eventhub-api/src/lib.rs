//! EventHub API - authentication and session server
//!
//! Provides HTTP endpoints for account registration, credential login,
//! refresh-token rotation, logout and administrative session revocation.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI document for every REST endpoint
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::auth::refresh_handler,
        handlers::auth::logout_handler,
        handlers::auth::logout_all_handler,
        handlers::auth::me_handler,
        handlers::auth::revoke_sessions_handler,
    ),
    components(schemas(
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::AuthResponse,
        auth::UserInfo,
        auth::BehavioralRoles,
        auth::RequiredRole,
        error::ApiError,
        handlers::health::HealthResponse,
        handlers::health::ReadinessResponse,
        handlers::health::ReadinessChecks,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and readiness checks"),
        (name = "auth", description = "Registration, login and session tokens"),
        (name = "admin", description = "Administrator operations")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state);
    let max_body_size = state.config.server.max_body_size;

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::prometheus_metrics))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::metrics_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS restricted to the configured origins; no origin is allowed when the
/// list is empty or CORS is disabled
fn cors_layer(state: &AppState) -> CorsLayer {
    let server = &state.config.server;
    if !server.cors_enabled || server.cors_origins.is_empty() {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Helpers for tests that need a fully wired application without PostgreSQL
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;
    use eventhub_core::config::{AppConfig, HashingConfig, StorageBackend};
    use eventhub_core::InMemoryStore;

    /// In-memory storage and cheap hashing parameters
    pub fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.database.storage = StorageBackend::Memory;
        config.hashing = HashingConfig::lightweight();
        config
    }

    pub fn create_test_state() -> (Arc<AppState>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let state = Arc::new(AppState::with_memory(test_config(), store.clone()));
        (state, store)
    }

    pub fn create_router_for_testing() -> Router {
        let (state, _) = create_test_state();
        create_router(state)
    }
}
