//! Refresh-token persistence
//!
//! Raw refresh tokens are never stored. Each record holds an Argon2 hash of
//! the token, so lookup loads a user's active records newest-first and
//! verifies the presented token against each until one matches.

use super::password::PasswordHasher;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use eventhub_core::{ClientMeta, NewRefreshToken, RefreshTokenRecord, RefreshTokenRepository};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct RefreshTokenStore {
    repo: Arc<dyn RefreshTokenRepository>,
    hasher: PasswordHasher,
}

impl RefreshTokenStore {
    pub fn new(repo: Arc<dyn RefreshTokenRepository>, hasher: PasswordHasher) -> Self {
        Self { repo, hasher }
    }

    /// Hash `raw_token` and persist it as an active record
    pub async fn store(
        &self,
        user_id: Uuid,
        raw_token: &str,
        expires_at: DateTime<Utc>,
        client: ClientMeta,
    ) -> Result<RefreshTokenRecord, AppError> {
        let token_hash = self.hasher.hash(raw_token).await?;

        let record = self
            .repo
            .insert(NewRefreshToken {
                user_id,
                token_hash,
                expires_at,
                client,
            })
            .await?;

        tracing::debug!(user_id = %user_id, token_id = %record.id, "Stored refresh token");
        Ok(record)
    }

    /// The active record matching `raw_token`.
    ///
    /// No active records and no match are the same failure.
    pub async fn find_valid(
        &self,
        user_id: Uuid,
        raw_token: &str,
    ) -> Result<RefreshTokenRecord, AppError> {
        let candidates = self.repo.list_active(user_id).await?;

        for record in candidates {
            if self.hasher.verify(&record.token_hash, raw_token).await? {
                return Ok(record);
            }
        }

        Err(AppError::SessionNotFound)
    }

    /// Idempotent
    pub async fn revoke_by_id(&self, id: Uuid) -> Result<(), AppError> {
        self.repo.revoke(id).await?;
        Ok(())
    }

    /// Revoke every active record of the identity, returning how many flipped
    pub async fn revoke_all_for_identity(&self, user_id: Uuid) -> Result<u64, AppError> {
        let revoked = self.repo.revoke_all(user_id).await?;
        tracing::debug!(user_id = %user_id, revoked, "Revoked refresh tokens");
        Ok(revoked)
    }
}
