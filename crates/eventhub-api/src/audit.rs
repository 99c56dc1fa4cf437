//! Security audit logging for authentication events
//!
//! Every event is emitted at INFO level on the `audit` target, so it can be
//! filtered and routed separately from application logs. Failure reasons are
//! recorded here and never returned to the client.
//!
//! # Example
//!
//! ```ignore
//! use eventhub_api::audit::{audit_log, AuditEvent};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     user_id: identity.id,
//!     email: identity.email.clone(),
//!     ip_address: client.ip_address.clone(),
//!     user_agent: client.user_agent.clone(),
//! });
//! ```

use axum::http::HeaderMap;
use chrono::Utc;
use eventhub_core::ClientMeta;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    LoginSuccess {
        user_id: Uuid,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    LoginFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    RegistrationSuccess {
        user_id: Uuid,
        email: String,
        role: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    RegistrationFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Refresh token rotated
    TokenRefresh {
        user_id: Uuid,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Refresh token presented but not accepted
    RefreshRejected {
        user_id: Option<Uuid>,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    Logout {
        user_id: Uuid,
        ip_address: Option<String>,
        all_sessions: bool,
        revoked: u64,
    },

    /// Sessions revoked by an operator or administrator
    SessionsRevoked {
        user_id: Uuid,
        revoked_by: Option<Uuid>,
        revoked: u64,
    },

    AccessDenied {
        user_id: Option<Uuid>,
        resource: String,
        required_roles: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    InvalidToken {
        ip_address: Option<String>,
        user_agent: Option<String>,
        reason: String,
    },
}

/// Log a security audit event with structured fields.
///
/// The full event is also attached as JSON for log aggregators:
///
/// ```json
/// {"event_type":"login_success","user_id":"550e8400-...","email":"user@example.com",
///  "ip_address":"192.168.1.1","user_agent":"Mozilla/5.0..."}
/// ```
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::LoginSuccess {
            user_id,
            email,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                ip_address = ?ip_address,
                "Login successful"
            );
        }
        AuditEvent::LoginFailure {
            email,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = ?ip_address,
                "Login failed"
            );
        }
        AuditEvent::RegistrationSuccess {
            user_id,
            email,
            role,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                role = ?role,
                ip_address = ?ip_address,
                "Registration successful"
            );
        }
        AuditEvent::RegistrationFailure {
            email,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = ?ip_address,
                "Registration failed"
            );
        }
        AuditEvent::TokenRefresh {
            user_id,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                ip_address = ?ip_address,
                "Token refresh"
            );
        }
        AuditEvent::RefreshRejected {
            user_id,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = ?user_id,
                reason = %reason,
                ip_address = ?ip_address,
                "Refresh rejected"
            );
        }
        AuditEvent::Logout {
            user_id,
            ip_address,
            all_sessions,
            revoked,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                ip_address = ?ip_address,
                all_sessions = %all_sessions,
                revoked = %revoked,
                "User logout"
            );
        }
        AuditEvent::SessionsRevoked {
            user_id,
            revoked_by,
            revoked,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                revoked_by = ?revoked_by,
                revoked = %revoked,
                "Sessions revoked"
            );
        }
        AuditEvent::AccessDenied {
            user_id,
            resource,
            required_roles,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = ?user_id,
                resource = %resource,
                required_roles = %required_roles,
                ip_address = ?ip_address,
                "Access denied"
            );
        }
        AuditEvent::InvalidToken {
            ip_address, reason, ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                ip_address = ?ip_address,
                reason = %reason,
                "Invalid token"
            );
        }
    }
}

/// Extract the client IP from proxy headers.
///
/// Checks X-Forwarded-For (first hop) then X-Real-IP.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return Some(first_ip.to_string());
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

/// Client metadata recorded with refresh tokens and audit events
pub fn client_meta(headers: &HeaderMap) -> ClientMeta {
    ClientMeta {
        ip_address: extract_ip_address(headers),
        user_agent: extract_user_agent(headers),
    }
}
