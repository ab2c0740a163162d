//! Database Adapter
//!
//! A `MemoryEngine` with row-level write-through and a periodic
//! authoritative reload from the backing table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde::de::IgnoredAny;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{
    current_timestamp_ms, Cache, CacheEntry, Creator, MemoryCore, MemoryEngine, Task,
};
use crate::config::CacheOptions;
use crate::error::{CacheError, Result};
use crate::persistence::{PersistenceAdapter, WriteBehind};
use crate::tasks::{spawn_periodic, PeriodicTask};

// == Database Adapter ==
/// Memory-backed cache mirrored to a relational store.
///
/// Writes land in memory first and reach the store through a bounded
/// write-behind queue. Every reload purges expired rows and then replaces
/// the whole in-memory map with what the store holds, except for keys
/// written while the reload was reading.
///
/// Payloads must be JSON: rows keep them as structured values, so a
/// creator producing anything else fails with `CacheError::Serialization`.
/// Reloaded payloads are re-encoded, so object key order and whitespace
/// are not preserved byte for byte.
pub struct DatabaseAdapter {
    engine: MemoryEngine,
    writes: WriteBehind,
    reloader: PeriodicTask,
    rows: RowReload,
}

impl DatabaseAdapter {
    // == Constructor ==
    /// Loads the store into memory and starts the reload loop.
    ///
    /// A failed initial load is logged and the cache starts empty.
    pub async fn new(store: Arc<dyn PersistenceAdapter>, options: &CacheOptions) -> Self {
        let engine = MemoryEngine::from_options(options);
        let writes = WriteBehind::spawn(store.clone(), options.write_queue_capacity);
        let rows = RowReload {
            core: engine.core().clone(),
            store,
            writes: writes.clone(),
            gate: Arc::new(Mutex::new(())),
        };

        match rows.run().await {
            Ok(restored) => info!("Database cache: loaded {} entries", restored),
            Err(e) => warn!(error = %e, "Database cache load failed"),
        }

        let reloader = spawn_reloader(rows.clone(), options.reload_interval);

        Self {
            engine,
            writes,
            reloader,
            rows,
        }
    }

    /// Flushes pending writes, then reloads memory from the store.
    ///
    /// Returns the number of entries now in memory.
    pub async fn reload(&self) -> Result<usize> {
        self.rows.run().await
    }

    /// Waits until every write issued so far has reached the store.
    pub async fn flush(&self) {
        self.writes.flush().await;
    }

    /// Stops the reload loop and drains pending writes.
    pub async fn close(self) {
        let Self {
            engine,
            writes,
            reloader,
            ..
        } = self;

        reloader.shutdown().await;
        writes.flush().await;
        engine.shutdown().await;
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &MemoryEngine {
        &self.engine
    }

    /// The write-behind queue, for its drop and failure counters.
    pub fn writes(&self) -> &WriteBehind {
        &self.writes
    }
}

// == Row Reload ==
/// Everything one authoritative reload touches. Shared by the adapter and
/// its reload loop; `gate` keeps their reloads from overlapping.
#[derive(Clone)]
struct RowReload {
    core: Arc<MemoryCore>,
    store: Arc<dyn PersistenceAdapter>,
    writes: WriteBehind,
    gate: Arc<Mutex<()>>,
}

impl RowReload {
    /// Purges expired rows, then swaps the live rows in as the new contents.
    ///
    /// Keys written after tracking starts keep their in-memory state, and
    /// writes queued before it are flushed so the load sees them.
    async fn run(&self) -> Result<usize> {
        let _gate = self.gate.lock().await;

        self.core.begin_reload().await;
        self.writes.flush().await;

        match load_live_rows(self.store.as_ref()).await {
            Ok(entries) => Ok(self.core.finish_reload(entries).await),
            Err(e) => {
                self.core.abort_reload().await;
                Err(e)
            }
        }
    }
}

async fn load_live_rows(store: &dyn PersistenceAdapter) -> Result<HashMap<String, CacheEntry>> {
    let now = current_timestamp_ms();

    match store.purge_expired(now).await {
        Ok(0) => {}
        Ok(purged) => info!("Database cache: purged {} expired rows", purged),
        Err(e) => warn!(error = %e, "Database cache: purging expired rows failed"),
    }

    Ok(store
        .load_all()
        .await?
        .into_iter()
        .filter(|(_, entry)| !entry.is_expired_at(now))
        .collect())
}

fn spawn_reloader(rows: RowReload, interval: Duration) -> PeriodicTask {
    spawn_periodic("row-reload", interval, move || {
        let rows = rows.clone();
        async move {
            match rows.run().await {
                Ok(restored) => debug!("Database cache: reloaded {} entries", restored),
                Err(e) => warn!(error = %e, "Database cache reload failed"),
            }
        }
    })
}

/// Rejects creator output that is not a JSON document.
fn json_payload(create: Creator<'_>) -> Creator<'_> {
    Box::new(move || {
        async move {
            let item = create().await?;
            serde_json::from_slice::<IgnoredAny>(&item.value)?;
            Ok::<_, CacheError>(item)
        }
        .boxed()
    })
}

#[async_trait]
impl Cache for DatabaseAdapter {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.engine.get(key).await
    }

    async fn set(&self, key: &str, create: Creator<'_>) -> Result<()> {
        let writes = &self.writes;
        self.engine
            .core()
            .set_with(key, json_payload(create), |key, entry| writes.save(key, entry))
            .await
    }

    async fn get_or_set(&self, key: &str, create: Creator<'_>) -> Result<Vec<u8>> {
        let writes = &self.writes;
        self.engine
            .core()
            .get_or_set_with(key, json_payload(create), |key, entry| writes.save(key, entry))
            .await
    }

    async fn remove(&self, key: &str) {
        self.engine.core().remove(key).await;
        self.writes.delete(key);
    }

    async fn lock_run(&self, id: &str, window: Duration, task: Task<'_>) -> Result<()> {
        self.engine.lock_run(id, window, task).await
    }
}
