use anyhow::Result;
use booking::BookingManager;
use booking_ledger::{BookingLedger, IdempotencyStore, InMemoryBookingLedger, PostgresBookingLedger};
use common::config::{AppConfig, StorageBackend};
use inventory_store::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: BookingManager,
    pub idempotency: Option<Arc<IdempotencyStore>>,
    pub storage: StorageBackend,
}

impl AppState {
    /// Create a new application state
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let (inventory, ledger): (Arc<dyn InventoryStore>, Arc<dyn BookingLedger>) =
            match config.storage {
                StorageBackend::Postgres => {
                    info!(
                        host = %config.database.host,
                        database = %config.database.database,
                        max_connections = config.database.max_connections,
                        "Connecting to database"
                    );
                    let pool = PgPoolOptions::new()
                        .max_connections(config.database.max_connections)
                        .acquire_timeout(Duration::from_secs(5))
                        .connect(&config.database.url())
                        .await?;

                    if config.run_migrations {
                        info!("Running database migrations");
                        sqlx::migrate!("../../migrations").run(&pool).await?;
                    }

                    (
                        Arc::new(PostgresInventoryStore::new(pool.clone())),
                        Arc::new(PostgresBookingLedger::new(pool)),
                    )
                }
                StorageBackend::Memory => {
                    warn!("Using in-memory storage; data is lost on restart");
                    (
                        Arc::new(InMemoryInventoryStore::new()),
                        Arc::new(InMemoryBookingLedger::new()),
                    )
                }
            };

        // Initialize idempotency store if enabled
        let idempotency = if config.idempotency.enabled {
            info!("Initializing idempotency keys with Redis");
            match IdempotencyStore::new(&config.idempotency.redis_url, config.idempotency.ttl_seconds)
            {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    warn!(
                        error = %e,
                        "Failed to initialize idempotency store. Continuing without idempotency."
                    );
                    None
                }
            }
        } else {
            info!("Idempotency keys disabled");
            None
        };

        Ok(Self {
            manager: BookingManager::new(inventory, ledger),
            idempotency,
            storage: config.storage,
        })
    }

    /// State over in-memory stores with idempotency off
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            manager: BookingManager::new(
                Arc::new(InMemoryInventoryStore::new()),
                Arc::new(InMemoryBookingLedger::new()),
            ),
            idempotency: None,
            storage: StorageBackend::Memory,
        }
    }
}
