//! EventHub CLI - operator commands
//!
//! Usage:
//!   eventhub migrate
//!   eventhub create-admin --email <email> --username <name> --password <password>
//!   eventhub revoke-sessions <user-id>
//!   eventhub prune-tokens [--older-than-days <days>]

use anyhow::{bail, Context};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use eventhub_api::auth::{AuthService, RegisterRequest};
use eventhub_core::config::{AppConfig, StorageBackend};
use eventhub_core::{ClientMeta, PgStore, RefreshTokenRepository};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "eventhub")]
#[command(about = "EventHub authentication administration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        /// Read from EVENTHUB_ADMIN_PASSWORD when omitted
        #[arg(long, env = "EVENTHUB_ADMIN_PASSWORD")]
        password: String,
    },
    /// Revoke every refresh token of a user
    RevokeSessions {
        /// User ID
        user_id: Uuid,
    },
    /// Delete refresh-token records that expired or were revoked long ago
    PruneTokens {
        #[arg(long, default_value_t = 30)]
        older_than_days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventhub=info,eventhub_api=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("loading configuration")?;

    if config.database.storage != StorageBackend::Postgres {
        bail!("operator commands require EVENTHUB_STORAGE=postgres");
    }

    let store = PgStore::new(
        &config.database.postgres_url,
        config.database.postgres_pool_size,
    )
    .await
    .context("connecting to PostgreSQL")?;

    match cli.command {
        Commands::Migrate => {
            store.migrate().await?;
            println!("Migrations applied");
        }
        Commands::CreateAdmin {
            email,
            username,
            password,
        } => {
            let service = auth_service(&store, &config);
            let identity = service
                .register(
                    RegisterRequest {
                        username,
                        email,
                        password,
                        role: Some("ADMIN".to_string()),
                    },
                    &ClientMeta::default(),
                )
                .await?;
            println!("Created administrator {} ({})", identity.email, identity.id);
        }
        Commands::RevokeSessions { user_id } => {
            let service = auth_service(&store, &config);
            let revoked = service.revoke_sessions(user_id, None).await?;
            println!("Revoked {revoked} session(s) for {user_id}");
        }
        Commands::PruneTokens { older_than_days } => {
            if older_than_days < 0 {
                bail!("--older-than-days must not be negative");
            }
            let before = Utc::now() - Duration::days(older_than_days);
            let deleted = store.delete_stale(before).await?;
            tracing::info!(deleted, %before, "Pruned refresh tokens");
            println!("Deleted {deleted} stale refresh token(s)");
        }
    }

    Ok(())
}

fn auth_service(store: &PgStore, config: &AppConfig) -> AuthService {
    let shared = Arc::new(store.clone());
    AuthService::new(shared.clone(), shared.clone(), shared, config)
}
