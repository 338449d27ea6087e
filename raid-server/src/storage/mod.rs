//! Storage Layer - persistence behind the raid lifecycle
//!
//! Implements the Repository pattern with two backends:
//! - **PostgreSQL**: teams, characters, battle results, rewards
//! - **Memory**: a process-local stand-in for development and tests
//!
//! ## Architecture
//! ```text
//! [Raid Lifecycle / Rewards]
//!       ↓
//! [Repository Traits]
//!       ↓
//! ┌──────────────┬──────────────┐
//! │ PostgresStore│ MemoryStore  │
//! │ + Adapters   │              │
//! └──────────────┴──────────────┘
//! ```

pub mod memory;
pub mod migrations;
pub mod postgres;
pub mod postgres_repo_adapter;
pub mod repository;

use std::sync::Arc;
use tracing::{info, warn};

use self::memory::MemoryStore;
use self::postgres::PostgresStore;
use self::postgres_repo_adapter::{PgRewardRepo, PgTeamRepo};
use self::repository::StorageManager;

/// Connect to PostgreSQL and wrap it in repository adapters
pub async fn init_postgres(
    postgres_url: &str,
    pg_max_connections: u32,
) -> Result<StorageManager, Box<dyn std::error::Error + Send + Sync>> {
    let pg = Arc::new(PostgresStore::new(postgres_url, pg_max_connections).await?);
    info!("PostgreSQL raid store initialized");

    Ok(StorageManager {
        teams: Box::new(PgTeamRepo::new(pg.clone())),
        rewards: Box::new(PgRewardRepo::new(pg)),
    })
}

/// Storage for the configured backend; falls back to memory without a URL
pub async fn init_storage(
    database_url: Option<&str>,
    pg_max_connections: u32,
) -> Result<StorageManager, Box<dyn std::error::Error + Send + Sync>> {
    match database_url {
        Some(url) => init_postgres(url, pg_max_connections).await,
        None => {
            warn!("DATABASE_URL not set, using in-memory storage (results are not persisted)");
            Ok(MemoryStore::new().manager())
        }
    }
}
