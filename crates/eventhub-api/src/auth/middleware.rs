/// Authentication middleware for protecting routes
///
/// Extracts Bearer tokens from the Authorization header and resolves them
/// through [`AuthService`](super::service::AuthService). On success the
/// resolved principal is added to request extensions:
///
/// - [`auth_middleware`] inserts a [`SessionIdentity`] (access token)
/// - [`refresh_middleware`] inserts a [`RefreshPrincipal`] (refresh token)
/// - [`optional_auth_middleware`] inserts a [`SessionIdentity`] when a valid
///   access token is present and passes anonymous requests through
use super::guard::{authorize, join_roles, RequiredRole, SessionIdentity};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

/// Refresh-token holder, added to extensions by [`refresh_middleware`]
#[derive(Debug, Clone)]
pub struct RefreshPrincipal {
    pub user_id: Uuid,
    /// The raw presented token, needed to find the matching session
    pub token: String,
}

/// The token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::MissingToken)
}

fn audit_invalid_token(headers: &HeaderMap, error: &AppError) {
    if error.is_authentication_failure() {
        audit_log(&AuditEvent::InvalidToken {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
            reason: error.to_string(),
        });
    }
}

/// Require a valid access token
///
/// ```ignore
/// let app = Router::new()
///     .route("/auth/me", get(me_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;

    let identity = match state.auth.authenticate_access(token).await {
        Ok(identity) => identity,
        Err(e) => {
            audit_invalid_token(request.headers(), &e);
            return Err(e);
        }
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Require a signature-valid refresh token
///
/// Only the stateless checks happen here; whether the session is still
/// active is decided by the handler's service call.
pub async fn refresh_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?.to_owned();

    let user_id = match state.auth.authenticate_refresh(&token) {
        Ok(user_id) => user_id,
        Err(e) => {
            audit_log(&AuditEvent::RefreshRejected {
                user_id: None,
                reason: e.to_string(),
                ip_address: extract_ip_address(request.headers()),
                user_agent: extract_user_agent(request.headers()),
            });
            return Err(e);
        }
    };

    request
        .extensions_mut()
        .insert(RefreshPrincipal { user_id, token });
    Ok(next.run(request).await)
}

/// Attach the caller's identity if a valid access token is present.
///
/// Unlike [`auth_middleware`] this never rejects; an invalid or missing
/// token leaves the request anonymous.
pub async fn optional_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok().map(str::to_owned);

    if let Some(token) = token {
        match state.auth.authenticate_access(&token).await {
            Ok(identity) => {
                request.extensions_mut().insert(identity);
            }
            Err(AppError::Busy) => return Err(AppError::Busy),
            Err(e) => tracing::debug!(error = %e, "Ignoring invalid optional token"),
        }
    }

    Ok(next.run(request).await)
}

/// Type alias for role middleware future
type RoleMiddlewareFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AppError>> + Send>>;

/// Middleware factory for role-based access control
///
/// Must run inside [`auth_middleware`]. Passes if the caller holds any of
/// `required_roles`; `ADMIN` passes every check.
///
/// ```ignore
/// let app = Router::new()
///     .route("/admin/users/:id/sessions", delete(revoke_sessions_handler))
///     .route_layer(middleware::from_fn(require_roles(&[RequiredRole::Admin])))
///     .route_layer(middleware::from_fn_with_state(state, auth_middleware));
/// ```
pub fn require_roles(
    required_roles: &'static [RequiredRole],
) -> impl Fn(Request<Body>, Next) -> RoleMiddlewareFuture + Clone {
    move |request: Request<Body>, next: Next| {
        Box::pin(async move {
            let identity = request.extensions().get::<SessionIdentity>();

            if let Err(e) = authorize(required_roles, identity) {
                audit_log(&AuditEvent::AccessDenied {
                    user_id: identity.map(|i| i.user_id),
                    resource: request.uri().path().to_string(),
                    required_roles: join_roles(required_roles),
                    ip_address: extract_ip_address(request.headers()),
                    user_agent: extract_user_agent(request.headers()),
                });
                return Err(e);
            }

            Ok(next.run(request).await)
        })
    }
}
