//! Application state management

use crate::auth::AuthService;
use eventhub_core::config::AppConfig;
use eventhub_core::{InMemoryStore, PgStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Ready status
    pub is_ready: AtomicBool,
    /// Authentication service
    pub auth: AuthService,
    /// PostgreSQL store, absent when running in memory
    pub database: Option<PgStore>,
}

impl AppState {
    /// State backed by PostgreSQL
    pub fn with_postgres(config: AppConfig, store: PgStore) -> Self {
        let shared = Arc::new(store.clone());
        let auth = AuthService::new(shared.clone(), shared.clone(), shared, &config);
        Self::new(config, auth, Some(store))
    }

    /// State backed by a process-local store
    pub fn with_memory(config: AppConfig, store: Arc<InMemoryStore>) -> Self {
        let auth = AuthService::new(store.clone(), store.clone(), store, &config);
        Self::new(config, auth, None)
    }

    pub fn new(config: AppConfig, auth: AuthService, database: Option<PgStore>) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(true),
            auth,
            database,
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Database reachability; `None` when no database is configured
    pub async fn database_ready(&self) -> Option<bool> {
        match &self.database {
            Some(store) => Some(store.ping().await),
            None => None,
        }
    }
}
