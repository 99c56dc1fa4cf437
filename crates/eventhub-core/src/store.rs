//! PostgreSQL store
//!
//! Implements the identity, refresh-token and relationship repositories on top
//! of SQLx and PostgreSQL. The schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    CoreError, Identity, IdentityRepository, NewIdentity, NewRefreshToken, RefreshTokenRecord,
    RefreshTokenRepository, RelationshipLookup, Result, StaticRole,
};

/// PostgreSQL-backed store for all auth collaborators
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a connection pool
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| CoreError::DatabaseError(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CoreError::DatabaseError(format!("Migration failed: {e}")))
    }

    /// Cheap connectivity check for readiness checks
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    password_hash: String,
    role: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for Identity {
    fn from(row: UserRow) -> Self {
        let role = row.role.as_deref().and_then(|r| match r.parse::<StaticRole>() {
            Ok(role) => Some(role),
            Err(_) => {
                tracing::warn!(user_id = %row.id, role = r, "Ignoring unknown stored role");
                None
            }
        });

        Identity {
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Refresh token row from database
#[derive(Debug, FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    user_id: Uuid,
    token_hash: String,
    expires_at: DateTime<Utc>,
    revoked: bool,
    created_at: DateTime<Utc>,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl From<RefreshTokenRow> for RefreshTokenRecord {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshTokenRecord {
            id: row.id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            revoked: row.revoked,
            created_at: row.created_at,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
        }
    }
}

const USER_COLUMNS: &str = "id, email, username, password_hash, role, created_at, updated_at";

const TOKEN_COLUMNS: &str =
    "id, user_id, token_hash, expires_at, revoked, created_at, ip_address, user_agent";

#[async_trait]
impl IdentityRepository for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| CoreError::DatabaseError(format!("Failed to fetch user: {e}")))?;

        Ok(row.map(Identity::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| CoreError::DatabaseError(format!("Failed to fetch user: {e}")))?;

        Ok(row.map(Identity::from))
    }

    async fn create(&self, identity: NewIdentity) -> Result<Identity> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (id, email, username, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&identity.email)
        .bind(&identity.username)
        .bind(&identity.password_hash)
        .bind(identity.role.map(|r| r.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                CoreError::Conflict("Email or username already registered".to_string())
            }
            other => CoreError::DatabaseError(format!("Failed to create user: {other}")),
        })?;

        Ok(row.into())
    }
}

#[async_trait]
impl RefreshTokenRepository for PgStore {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord> {
        let row: RefreshTokenRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO refresh_tokens (
                id, user_id, token_hash, expires_at, revoked, created_at, ip_address, user_agent
            ) VALUES ($1, $2, $3, $4, FALSE, NOW(), $5, $6)
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(&token.client.ip_address)
        .bind(&token.client.user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CoreError::DatabaseError(format!("Failed to store refresh token: {e}")))?;

        Ok(row.into())
    }

    async fn list_active(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>> {
        let rows: Vec<RefreshTokenRow> = sqlx::query_as(&format!(
            r#"
            SELECT {TOKEN_COLUMNS}
            FROM refresh_tokens
            WHERE user_id = $1 AND revoked = FALSE AND expires_at > NOW()
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::DatabaseError(format!("Failed to list refresh tokens: {e}")))?;

        Ok(rows.into_iter().map(RefreshTokenRecord::from).collect())
    }

    async fn revoke(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1 AND revoked = FALSE")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::DatabaseError(format!("Failed to revoke refresh token: {e}")))?;

        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::DatabaseError(format!("Failed to revoke refresh tokens: {e}")))?;

        Ok(result.rows_affected())
    }

    async fn delete_stale(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM refresh_tokens
            WHERE created_at < $1 AND (revoked = TRUE OR expires_at <= NOW())
            "#,
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::DatabaseError(format!("Failed to prune refresh tokens: {e}")))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RelationshipLookup for PgStore {
    async fn owns_any_event(&self, user_id: Uuid) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM events WHERE organizer_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CoreError::DatabaseError(format!("Failed to check event ownership: {e}")))
    }

    async fn has_any_registration(&self, user_id: Uuid) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM registrations WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CoreError::DatabaseError(format!("Failed to check registrations: {e}")))
    }
}
