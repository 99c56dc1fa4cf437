//! API route definitions

use crate::auth::{
    auth_middleware, optional_auth_middleware, refresh_middleware, require_roles, RequiredRole,
};
use crate::handlers::auth;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new().route("/auth/login", post(auth::login_handler));

    // Anonymous or authenticated; an access token only matters when ADMIN is requested
    let registration_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ));

    // Routes authenticated by a refresh token
    let session_routes = Router::new()
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/logout-all", post(auth::logout_all_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            refresh_middleware,
        ));

    let admin_routes = Router::new()
        .route(
            "/admin/users/:id/sessions",
            delete(auth::revoke_sessions_handler),
        )
        .route_layer(middleware::from_fn(require_roles(&[RequiredRole::Admin])));

    // Routes authenticated by an access token
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    // Combine routes
    Router::new()
        .merge(public_routes)
        .merge(registration_routes)
        .merge(session_routes)
        .merge(protected_routes)
}
