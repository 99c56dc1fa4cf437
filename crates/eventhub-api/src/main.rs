//! EventHub API Server
//!
//! Authentication and session server for the EventHub platform.

use eventhub_api::{create_router, state::AppState};
use eventhub_core::config::{AppConfig, LoggingConfig, StorageBackend};
use eventhub_core::{InMemoryStore, PgStore};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config.logging);

    if config.auth.uses_development_secrets() {
        if config.database.storage == StorageBackend::Postgres {
            tracing::warn!(
                "JWT signing secrets are the built-in development values; set JWT_ACCESS_SECRET and JWT_REFRESH_SECRET"
            );
        } else {
            tracing::info!("Using development JWT signing secrets");
        }
    }

    let state = match config.database.storage {
        StorageBackend::Postgres => {
            let store = PgStore::new(
                &config.database.postgres_url,
                config.database.postgres_pool_size,
            )
            .await?;
            if config.database.run_migrations {
                store.migrate().await?;
                tracing::info!("Database migrations applied");
            }
            AppState::with_postgres(config.clone(), store)
        }
        StorageBackend::Memory => {
            tracing::warn!("Running with in-memory storage; accounts are lost on restart");
            AppState::with_memory(config.clone(), Arc::new(InMemoryStore::new()))
        }
    };
    let state = Arc::new(state);

    let app = create_router(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("EventHub API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolves on Ctrl+C or SIGTERM and marks the server not ready
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    state.set_ready(false);
    tracing::info!("Shutdown signal received, draining connections");
}
