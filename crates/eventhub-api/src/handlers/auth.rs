//! Authentication API handlers
//!
//! HTTP endpoints for registration, login, token refresh, logout and the
//! administrative session revocation.

use crate::audit::{audit_log, client_meta, AuditEvent};
use crate::auth::{
    authorize, AuthResponse, BehavioralRoles, LoginRequest, RefreshPrincipal, RegisterRequest,
    RequiredRole, SessionIdentity, UserInfo,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use eventhub_core::StaticRole;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Register a new user account
///
/// Without a role the account starts with no static role. Requesting
/// `ADMIN` requires the caller to be authenticated as an administrator.
///
/// # Responses
///
/// * `201 Created` - User registered
/// * `400 Bad Request` - Invalid input or unsupported role
/// * `403 Forbidden` - `ADMIN` requested by a non-administrator
/// * `409 Conflict` - Email already in use
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = UserInfo),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 403, description = "Role not permitted", body = crate::error::ApiError),
        (status = 409, description = "Email already registered", body = crate::error::ApiError),
        (status = 503, description = "Hashing capacity exhausted", body = crate::error::ApiError),
    ),
    security((), ("bearer_auth" = []))
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    caller: Option<Extension<SessionIdentity>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let client = client_meta(&headers);

    // Unparseable roles fall through to the service, which rejects them
    if let Some(Ok(StaticRole::Admin)) = request.role.as_deref().map(str::parse::<StaticRole>) {
        let caller = caller.as_ref().map(|Extension(identity)| identity);
        if let Err(e) = authorize(&[RequiredRole::Admin], caller) {
            audit_log(&AuditEvent::AccessDenied {
                user_id: caller.map(|i| i.user_id),
                resource: "/api/v1/auth/register".to_string(),
                required_roles: RequiredRole::Admin.to_string(),
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            });
            return Err(e);
        }
    }

    let identity = state.auth.register(request, &client).await?;

    Ok((
        StatusCode::CREATED,
        Json(UserInfo::new(&identity, BehavioralRoles::default())),
    ))
}

/// Login with email and password
///
/// Returns a fresh access and refresh token pair. Unknown email and wrong
/// password produce the same response.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 503, description = "Hashing capacity exhausted", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let client = client_meta(&headers);
    let identity = state
        .auth
        .validate_credentials(&request.email, &request.password, &client)
        .await?;
    let response = state.auth.login(&identity, client).await?;

    Ok(Json(response))
}

/// Exchange a refresh token for a new token pair
///
/// The presented refresh token is revoked; presenting it again fails.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "Token refreshed successfully", body = AuthResponse),
        (status = 401, description = "Invalid refresh token", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<RefreshPrincipal>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let response = state
        .auth
        .refresh(principal.user_id, &principal.token, client_meta(&headers))
        .await?;

    Ok(Json(response))
}

/// End the session behind the presented refresh token
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 204, description = "Logged out"),
        (status = 401, description = "Missing or invalid refresh token", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<RefreshPrincipal>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    state
        .auth
        .logout(principal.user_id, &principal.token, &client_meta(&headers))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// End every session of the refresh token's owner
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout-all",
    tag = "auth",
    responses(
        (status = 204, description = "All sessions ended"),
        (status = 401, description = "Missing or invalid refresh token", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_all_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<RefreshPrincipal>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    state
        .auth
        .logout_all(principal.user_id, &client_meta(&headers))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Get current user profile with resolved roles
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserInfo),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state.auth.get_identity(session.user_id).await?;
    let roles = BehavioralRoles {
        is_organizer: session.is_organizer,
        is_attendee: session.is_attendee,
    };

    Ok(Json(UserInfo::new(&identity, roles)))
}

/// Revoke every session of a user (administrators only)
#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{id}/sessions",
    tag = "admin",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Sessions revoked"),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 403, description = "Not an administrator", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn revoke_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionIdentity>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let revoked = state
        .auth
        .revoke_sessions(user_id, Some(session.user_id))
        .await?;
    tracing::info!(%user_id, revoked, "Sessions revoked by administrator");

    Ok(StatusCode::NO_CONTENT)
}
