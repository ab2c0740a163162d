//! Backend Selection
//!
//! Builds the cache backend named by [`Config`] and tears it down again
//! on shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx_core::pool::PoolOptions;
use sqlx_postgres::Postgres;
use tracing::{info, warn};

use crate::cache::{Cache, Creator, MemoryEngine, Task};
use crate::config::{BackendKind, Config};
use crate::error::Result;
use crate::persistence::{DatabaseAdapter, FileAdapter, PgRowStore};
use crate::remote::{RedisStore, RemoteStoreAdapter};

/// Connections held by the database backend's pool
const MAX_DB_CONNECTIONS: u32 = 5;

// == Backend ==
/// The cache backend a server process runs on.
pub enum Backend {
    Memory(MemoryEngine),
    File(FileAdapter),
    Database(DatabaseAdapter),
    Remote(RemoteStoreAdapter),
}

impl Backend {
    /// Opens the backend selected by `config.backend`.
    ///
    /// # Errors
    ///
    /// Fails when the database or Redis cannot be reached, or the database
    /// backend is selected without a `DATABASE_URL`.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let backend = match config.backend {
            BackendKind::Memory => Backend::Memory(MemoryEngine::from_options(&config.cache)),
            BackendKind::File => {
                Backend::File(FileAdapter::new(config.snapshot_path.clone(), &config.cache).await)
            }
            BackendKind::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is required for the postgres backend")?;
                let pool = PoolOptions::<Postgres>::new()
                    .max_connections(MAX_DB_CONNECTIONS)
                    .acquire_timeout(Duration::from_secs(5))
                    .connect(url)
                    .await
                    .context("connecting to PostgreSQL")?;
                let store = PgRowStore::new(pool, config.table_name.as_str()).await?;
                Backend::Database(DatabaseAdapter::new(Arc::new(store), &config.cache).await)
            }
            BackendKind::Redis => {
                let store = RedisStore::connect(&config.redis_url).await?;
                Backend::Remote(RemoteStoreAdapter::new(store))
            }
        };

        info!(backend = ?backend.kind(), "Cache backend ready");
        Ok(backend)
    }

    /// Which kind of backend this is.
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Memory(_) => BackendKind::Memory,
            Backend::File(_) => BackendKind::File,
            Backend::Database(_) => BackendKind::Postgres,
            Backend::Remote(_) => BackendKind::Redis,
        }
    }

    /// Stops background work and writes out anything still pending.
    pub async fn close(self) {
        match self {
            Backend::Memory(engine) => engine.shutdown().await,
            Backend::File(adapter) => match adapter.close().await {
                Ok(saved) => info!("Final snapshot saved with {} entries", saved),
                Err(e) => warn!(error = %e, "Final snapshot save failed"),
            },
            Backend::Database(adapter) => adapter.close().await,
            Backend::Remote(_) => {}
        }
        info!("Cache backend closed");
    }

    fn as_cache(&self) -> &dyn Cache {
        match self {
            Backend::Memory(engine) => engine,
            Backend::File(adapter) => adapter,
            Backend::Database(adapter) => adapter,
            Backend::Remote(adapter) => adapter,
        }
    }
}

#[async_trait]
impl Cache for Backend {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.as_cache().get(key).await
    }

    async fn set(&self, key: &str, create: Creator<'_>) -> Result<()> {
        self.as_cache().set(key, create).await
    }

    async fn get_or_set(&self, key: &str, create: Creator<'_>) -> Result<Vec<u8>> {
        self.as_cache().get_or_set(key, create).await
    }

    async fn remove(&self, key: &str) {
        self.as_cache().remove(key).await
    }

    async fn lock_run(&self, id: &str, window: Duration, task: Task<'_>) -> Result<()> {
        self.as_cache().lock_run(id, window, task).await
    }
}
