//! EventHub Core - Domain models, storage traits, and shared types
//!
//! This crate defines the abstractions the authentication subsystem is built on:
//! - Identity and refresh-token records
//! - The static role model (`ADMIN` only)
//! - Repository traits for identities, refresh tokens and relationship facts
//! - Common error types
//! - Configuration management
//! - PostgreSQL and in-memory storage backends

pub mod config;
pub mod memory;
pub mod store;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, HashingConfig, LoggingConfig,
    ServerConfig, StorageBackend,
};
pub use memory::InMemoryStore;
pub use store::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for storage and domain operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================================================
// Roles
// ============================================================================

/// Privilege level stored directly on an identity.
///
/// `ADMIN` is the only static role. Organizer and attendee privileges are
/// derived from relationship facts at authentication time and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StaticRole {
    Admin,
}

impl StaticRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaticRole::Admin => "ADMIN",
        }
    }
}

impl std::str::FromStr for StaticRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Ok(StaticRole::Admin),
            other => Err(CoreError::ValidationError(format!(
                "'{other}' is not an assignable role; only ADMIN may be set explicitly"
            ))),
        }
    }
}

impl std::fmt::Display for StaticRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Identity
// ============================================================================

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    /// Argon2id PHC string; never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Option<StaticRole>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Some(StaticRole::Admin)
    }
}

/// Data required to create an identity. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: Option<StaticRole>,
}

// ============================================================================
// Refresh tokens
// ============================================================================

/// Client information captured when a refresh token is issued.
///
/// Kept for audit purposes only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Persisted refresh-token record.
///
/// The raw token is never stored, only its one-way hash. `revoked` only ever
/// moves from `false` to `true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Not revoked and not expired
    pub fn is_active(&self) -> bool {
        !self.revoked && !self.is_expired()
    }
}

/// Data required to persist a refresh token.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub client: ClientMeta,
}

// ============================================================================
// Repository traits
// ============================================================================

/// Identity storage owned by the user-management layer
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>>;

    /// Create an identity.
    ///
    /// Fails with [`CoreError::Conflict`] if the email or username is taken.
    async fn create(&self, identity: NewIdentity) -> Result<Identity>;
}

/// Refresh-token persistence
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord>;

    /// Unrevoked, unexpired records for a user, newest first.
    async fn list_active(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>>;

    /// Mark a record revoked. Revoking an already revoked or missing record is a no-op.
    async fn revoke(&self, id: Uuid) -> Result<()>;

    /// Revoke every active record of a user, returning how many were flipped.
    async fn revoke_all(&self, user_id: Uuid) -> Result<u64>;

    /// Retention: delete revoked or expired records created before `before`.
    async fn delete_stale(&self, before: DateTime<Utc>) -> Result<u64>;
}

/// Relationship facts owned by the event CRUD layer
#[async_trait]
pub trait RelationshipLookup: Send + Sync {
    /// Does the user organize at least one event?
    async fn owns_any_event(&self, user_id: Uuid) -> Result<bool>;

    /// Does the user hold at least one event registration?
    async fn has_any_registration(&self, user_id: Uuid) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_role_parse() {
        assert_eq!("ADMIN".parse::<StaticRole>().unwrap(), StaticRole::Admin);
        assert_eq!("admin".parse::<StaticRole>().unwrap(), StaticRole::Admin);
        assert!("ORGANIZER".parse::<StaticRole>().is_err());
        assert!("ATTENDEE".parse::<StaticRole>().is_err());
        assert!("".parse::<StaticRole>().is_err());
    }

    #[test]
    fn test_static_role_serde() {
        let json = serde_json::to_string(&StaticRole::Admin).unwrap();
        assert_eq!(json, "\"ADMIN\"");
    }

    #[test]
    fn test_identity_hides_password_hash() {
        let now = Utc::now();
        let identity = Identity {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&identity).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
        assert!(!identity.is_admin());
    }

    #[test]
    fn test_refresh_token_record_state() {
        let now = Utc::now();
        let mut record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "hash".to_string(),
            expires_at: now + chrono::Duration::days(7),
            revoked: false,
            created_at: now,
            ip_address: None,
            user_agent: None,
        };
        assert!(record.is_active());

        record.expires_at = now - chrono::Duration::seconds(1);
        assert!(record.is_expired());
        assert!(!record.is_active());

        record.expires_at = now + chrono::Duration::days(7);
        record.revoked = true;
        assert!(!record.is_active());
    }
}
