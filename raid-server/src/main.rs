use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, warn};

use raid_core::config::ServerConfig;
use raid_core::data::{DataStore, DataWatcher};
use raid_core::logging::{init_tracing, TracingConfig};
use raid_server::{api, storage, tick, RaidService};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::load().context("Failed to load server configuration")?;
    init_tracing(&TracingConfig::with_level(config.log_level));

    info!("Starting raid server v{}", env!("CARGO_PKG_VERSION"));

    // ========================================================================
    // 1. Data files (maps, bosses, skills)
    // ========================================================================
    let data = Arc::new(DataStore::new(&config.data_dir));
    let _watcher = if config.hot_reload {
        match DataWatcher::spawn(Arc::clone(&data)) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(error = %e, "Hot reload unavailable, relying on mtime checks");
                None
            }
        }
    } else {
        None
    };

    // ========================================================================
    // 2. Storage (PostgreSQL when configured, memory otherwise)
    // ========================================================================
    let storage = storage::init_storage(config.database_url.as_deref(), config.pg_max_connections)
        .await
        .map_err(|e| anyhow!(e))
        .context("Failed to initialize storage")?;

    // ========================================================================
    // 3. Tick driver + API
    // ========================================================================
    let bind_addr = config.bind_addr();
    let service = RaidService::new(config, data, storage);
    let ticker = tick::spawn_tick_loop(service.clone());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown signal received");
    };

    let served = api::start_api_server(service, &bind_addr, shutdown).await;
    ticker.abort();
    served
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("API server on {bind_addr} failed"))?;

    info!("Raid server stopped");
    Ok(())
}
