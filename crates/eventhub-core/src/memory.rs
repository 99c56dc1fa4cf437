//! In-memory store
//!
//! Process-local implementation of every repository trait. Used by the test
//! suites and by the API server when `EVENTHUB_STORAGE=memory`. Nothing is
//! persisted across restarts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    CoreError, Identity, IdentityRepository, NewIdentity, NewRefreshToken, RefreshTokenRecord,
    RefreshTokenRepository, RelationshipLookup, Result,
};

#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<Uuid, Identity>>,
    tokens: RwLock<HashMap<Uuid, RefreshTokenRecord>>,
    organizers: RwLock<HashSet<Uuid>>,
    attendees: RwLock<HashSet<Uuid>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `user_id` organizes an event
    pub async fn add_event_owner(&self, user_id: Uuid) {
        self.organizers.write().await.insert(user_id);
    }

    /// Record that `user_id` registered for an event
    pub async fn add_registration(&self, user_id: Uuid) {
        self.attendees.write().await.insert(user_id);
    }

    /// All refresh-token records of a user, in any state
    pub async fn tokens_for(&self, user_id: Uuid) -> Vec<RefreshTokenRecord> {
        self.tokens
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl IdentityRepository for InMemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, identity: NewIdentity) -> Result<Identity> {
        let mut users = self.users.write().await;

        if users
            .values()
            .any(|u| u.email == identity.email || u.username == identity.username)
        {
            return Err(CoreError::Conflict(
                "Email or username already registered".to_string(),
            ));
        }

        let now = Utc::now();
        let created = Identity {
            id: Uuid::new_v4(),
            email: identity.email,
            username: identity.username,
            password_hash: identity.password_hash,
            role: identity.role,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());

        Ok(created)
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryStore {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord> {
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: token.user_id,
            token_hash: token.token_hash,
            expires_at: token.expires_at,
            revoked: false,
            created_at: Utc::now(),
            ip_address: token.client.ip_address,
            user_agent: token.client.user_agent,
        };
        self.tokens.write().await.insert(record.id, record.clone());

        Ok(record)
    }

    async fn list_active(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>> {
        let mut active: Vec<RefreshTokenRecord> = self
            .tokens
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id && t.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(active)
    }

    async fn revoke(&self, id: Uuid) -> Result<()> {
        if let Some(record) = self.tokens.write().await.get_mut(&id) {
            record.revoked = true;
        }
        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<u64> {
        let mut tokens = self.tokens.write().await;
        let mut revoked = 0;
        for record in tokens
            .values_mut()
            .filter(|t| t.user_id == user_id && !t.revoked)
        {
            record.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn delete_stale(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut tokens = self.tokens.write().await;
        let initial = tokens.len();
        tokens.retain(|_, t| !(t.created_at < before && (t.revoked || t.is_expired())));
        Ok((initial - tokens.len()) as u64)
    }
}

#[async_trait]
impl RelationshipLookup for InMemoryStore {
    async fn owns_any_event(&self, user_id: Uuid) -> Result<bool> {
        Ok(self.organizers.read().await.contains(&user_id))
    }

    async fn has_any_registration(&self, user_id: Uuid) -> Result<bool> {
        Ok(self.attendees.read().await.contains(&user_id))
    }
}
