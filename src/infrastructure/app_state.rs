use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::domain::ports::Clock;
use crate::domain::repositories::PartyStore;
use crate::infrastructure::auth::JwtService;
use crate::infrastructure::config::{AppConfig, StoreBackend};
use crate::infrastructure::services::SystemClock;
use crate::infrastructure::store::{MemoryPartyStore, SqlitePartyStore};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,

    /// Shared party document store
    pub store: Arc<dyn PartyStore>,

    /// JWT service for token management
    pub jwt_service: Arc<JwtService>,

    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(AppConfig::from_env()).await
    }

    pub async fn with_config(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn PartyStore> = match config.store_backend {
            StoreBackend::Memory => {
                tracing::info!("Using in-memory party store");
                Arc::new(MemoryPartyStore::new(config.snapshot_channel_capacity))
            }
            StoreBackend::Sqlite => {
                tracing::info!("Connecting to database: {}", config.database_url);

                let options: SqliteConnectOptions = config.database_url.parse()?;
                let db = SqlitePoolOptions::new()
                    .connect_with(options.create_if_missing(true))
                    .await?;

                let store = SqlitePartyStore::new(db, config.snapshot_channel_capacity);
                store.migrate().await?;
                Arc::new(store)
            }
        };

        let jwt_service = Arc::new(JwtService::new(config.jwt_secret.clone()));

        Ok(Self {
            config,
            store,
            jwt_service,
            clock: Arc::new(SystemClock),
        })
    }
}
