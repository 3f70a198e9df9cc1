//! Command handlers.

use portcullis_database::{MemoryGatewayStore, PgGatewayStore, establish_pool, run_migrations};
use portcullis_error::PortcullisResult;
use portcullis_gateway::PortcullisConfig;
use portcullis_interface::GatewayStore;
use portcullis_social::PortcullisBot;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

fn load_config(path: Option<&Path>) -> PortcullisResult<PortcullisConfig> {
    match path {
        Some(path) => PortcullisConfig::from_file(path),
        None => PortcullisConfig::load(),
    }
}

fn open_store(
    database_url: Option<&str>,
    memory_store: bool,
    config: &PortcullisConfig,
) -> PortcullisResult<Arc<dyn GatewayStore>> {
    match database_url {
        Some(url) if !memory_store => {
            let pool = establish_pool(url, config.database.pool_size)?;
            let applied = run_migrations(&pool)?;
            info!(applied, "Database ready");
            Ok(Arc::new(PgGatewayStore::new(pool)))
        }
        _ => {
            warn!("Using the in-memory store, state is lost on exit");
            Ok(Arc::new(MemoryGatewayStore::new()))
        }
    }
}

/// Connect to Discord and serve until CTRL+C or a fatal client error.
pub async fn run_bot(
    config_path: Option<&Path>,
    token: &str,
    database_url: Option<&str>,
    memory_store: bool,
) -> PortcullisResult<()> {
    let config = load_config(config_path)?;
    info!(
        sweep_interval = ?config.gateway.sweep_interval(),
        commit_interval = ?config.gateway.commit_interval(),
        "Configuration loaded"
    );

    let store = open_store(database_url, memory_store, &config)?;
    let mut bot = PortcullisBot::new(token, store, &config).await?;

    let shard_manager = bot.shard_manager();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping gracefully...");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!(error = %e, "Failed to listen for CTRL+C"),
        }
    });

    bot.start().await?;
    info!("Portcullis stopped");
    Ok(())
}

/// Apply migrations and report how many ran.
pub fn migrate(config_path: Option<&Path>, database_url: &str) -> PortcullisResult<()> {
    let config = load_config(config_path)?;
    let pool = establish_pool(database_url, config.database.pool_size)?;
    let applied = run_migrations(&pool)?;
    info!(applied, "Migrations complete");
    Ok(())
}
