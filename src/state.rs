use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::config::{AppConfig, StoreBackend};
use crate::store::{MemoryUserStore, PgUserStore, UserStore};

/// Shared per-process handles, cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let store = match config.store {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL must be set for the postgres store")?;
                let pg = PgUserStore::connect(url, config.db_max_connections).await?;
                if config.run_migrations {
                    if let Err(e) = pg.migrate().await {
                        warn!(error = %e, "migration failed; continuing");
                    }
                }
                info!("using postgres user store");
                Arc::new(pg) as Arc<dyn UserStore>
            }
            StoreBackend::Memory => {
                warn!("using in-memory user store; data is lost on exit");
                Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };

        Ok(Self { store, config })
    }

    pub fn from_parts(store: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// State over a fresh in-memory store, for tests.
    pub fn in_memory(store: MemoryUserStore) -> Self {
        Self::from_parts(Arc::new(store), Arc::new(AppConfig::in_memory()))
    }
}
