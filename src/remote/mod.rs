//! Remote Store Module
//!
//! A cache backend where a remote key-value store is the source of truth.
//! Nothing is mirrored locally; the store expires entries itself.

mod redis_store;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cache::{Cache, Creator, LockRegistry, Task};
use crate::error::{CacheError, Result};

pub use redis_store::RedisStore;

/// Value stored under a `lock_run` marker key
const LOCK_MARKER: &[u8] = b"ok";

// == Remote Store ==
/// The key-value operations the remote backend needs.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads a value; `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes a value. A zero `ttl` stores it without expiry.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Writes a value only if the key is absent. Returns whether it was written.
    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool>;

    /// Deletes a key. Deleting a missing key is not an error.
    async fn del(&self, key: &str) -> Result<()>;
}

// == Remote Store Adapter ==
/// Cache backend over a [`RemoteStore`].
///
/// The local lock registry only stops duplicate creation from within this
/// process; other processes sharing the store may still race.
pub struct RemoteStoreAdapter {
    store: Box<dyn RemoteStore>,
    locks: LockRegistry,
}

impl RemoteStoreAdapter {
    /// Wraps `store`.
    pub fn new(store: impl RemoteStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            locks: LockRegistry::new(),
        }
    }

    /// Number of keys with a population currently in flight or queued.
    pub fn pending_locks(&self) -> usize {
        self.locks.len()
    }
}

#[async_trait]
impl Cache for RemoteStoreAdapter {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, create: Creator<'_>) -> Result<()> {
        let _guard = self.locks.lock(key).await;

        let item = create().await?;
        self.store.set(key, &item.value, item.ttl).await
    }

    async fn get_or_set(&self, key: &str, create: Creator<'_>) -> Result<Vec<u8>> {
        let _guard = self.locks.lock(key).await;

        // The store never returns expired values
        if let Some(payload) = self.store.get(key).await? {
            return Ok(payload);
        }

        let item = create().await?;
        self.store.set(key, &item.value, item.ttl).await?;
        Ok(item.value)
    }

    async fn remove(&self, key: &str) {
        if let Err(e) = self.store.del(key).await {
            warn!(key = %key, error = %e, "Remote cache: delete failed");
        }
    }

    /// Holds a marker key for `window`. Unlike the in-memory engine this
    /// excludes other processes too. If the holder dies mid-task, the
    /// marker is only released when its expiry elapses.
    async fn lock_run(&self, id: &str, window: Duration, task: Task<'_>) -> Result<()> {
        if !self.store.set_nx(id, LOCK_MARKER, window).await? {
            debug!(id = %id, "lock_run rejected, marker present");
            return Err(CacheError::Busy(id.to_string()));
        }

        let result = task().await;

        if let Err(e) = self.store.del(id).await {
            warn!(id = %id, error = %e, "Remote cache: releasing lock marker failed");
        }
        result
    }
}
