//! API error handling
//!
//! Every failure leaving a handler is an [`AppError`]. Authentication
//! failures keep their precise kind for logging but share one response body,
//! so a client cannot tell a bad password from an expired or revoked token.

use crate::auth::jwt::JwtError;
use crate::auth::password::PasswordError;
use crate::auth::pool::PoolError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use eventhub_core::CoreError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Seconds a client should wait after a `BUSY` response
const RETRY_AFTER_SECS: &str = "1";

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new("UNAUTHORIZED", "Unauthorized")
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL", "Internal server error")
    }
}

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token invalid: {0}")]
    TokenInvalid(String),

    #[error("token expired")]
    TokenExpired,

    #[error("session not found")]
    SessionNotFound,

    #[error("missing bearer token")]
    MissingToken,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("worker pool saturated")]
    Busy,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(String),
}

impl AppError {
    /// Stable machine-readable kind, used in logs and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::TokenInvalid(_) => "TOKEN_INVALID",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::SessionNotFound => "SESSION_NOT_FOUND",
            AppError::MissingToken => "MISSING_TOKEN",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Busy => "BUSY",
            AppError::Internal(_) | AppError::Database(_) => "INTERNAL",
        }
    }

    /// True for every kind rendered as a bare 401
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            AppError::InvalidCredentials
                | AppError::TokenInvalid(_)
                | AppError::TokenExpired
                | AppError::SessionNotFound
                | AppError::MissingToken
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            e if e.is_authentication_failure() => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if self.is_authentication_failure() {
            tracing::debug!(kind = self.kind(), error = %self, "Authentication failed");
            return (status, Json(ApiError::unauthorized())).into_response();
        }

        let error = match self {
            AppError::Forbidden(msg) => ApiError::new("FORBIDDEN", msg),
            AppError::Conflict(msg) => ApiError::new("CONFLICT", msg),
            AppError::NotFound(msg) => ApiError::new("NOT_FOUND", format!("{msg} not found")),
            AppError::BadRequest(msg) => ApiError::new("BAD_REQUEST", msg),
            AppError::Busy => {
                let body = ApiError::new("BUSY", "Server is busy, retry later");
                return (
                    status,
                    [(header::RETRY_AFTER, RETRY_AFTER_SECS)],
                    Json(body),
                )
                    .into_response();
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ApiError::internal_error()
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                ApiError::internal_error()
            }
            // authentication failures returned above
            _ => ApiError::unauthorized(),
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(msg) => AppError::NotFound(msg),
            CoreError::Conflict(msg) => AppError::Conflict(msg),
            CoreError::ValidationError(msg) => AppError::BadRequest(msg),
            CoreError::DatabaseError(msg) => AppError::Database(msg),
            CoreError::ConfigError(msg) => AppError::Internal(format!("Configuration error: {msg}")),
            CoreError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::ExpiredToken => AppError::TokenExpired,
            JwtError::InvalidToken | JwtError::InvalidSignature => {
                AppError::TokenInvalid(err.to_string())
            }
            JwtError::EncodingError(e) => AppError::Internal(format!("Token encoding failed: {e}")),
            JwtError::SystemTimeError(e) => AppError::Internal(format!("System time error: {e}")),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Busy => AppError::Busy,
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<PoolError> for AppError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Saturated => AppError::Busy,
            PoolError::Join(msg) => AppError::Internal(format!("Worker task failed: {msg}")),
        }
    }
}
