//! Cache Module
//!
//! Defines the unified cache contract shared by every backend and the
//! in-memory engine the file and database tiers are built on.

mod entry;
mod locks;
mod memory;


use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CacheError, Result};

// Re-export public types
pub use entry::{current_timestamp_ms, expiration_after, CacheEntry};
pub use locks::{KeyGuard, LockRegistry};
pub use memory::{MemoryCore, MemoryEngine};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

// == Creation Result ==
/// What a creator produces: the value and how long it stays fresh.
///
/// The TTL becomes an absolute expiration only when the entry is written.
#[derive(Debug, Clone, PartialEq)]
pub struct Item<T> {
    /// The value to cache
    pub value: T,
    /// Time to live, zero = never expires
    pub ttl: Duration,
}

impl<T> Item<T> {
    /// Creates an item expiring `ttl` after it is stored.
    pub fn new(value: T, ttl: Duration) -> Self {
        Self { value, ttl }
    }

    /// Creates an item that never expires.
    pub fn immortal(value: T) -> Self {
        Self::new(value, Duration::ZERO)
    }
}

/// Creation result carrying an already encoded payload.
pub type RawItem = Item<Vec<u8>>;

/// Population callback handed to `Cache::set` and `Cache::get_or_set`.
pub type Creator<'a> = Box<dyn FnOnce() -> BoxFuture<'a, Result<RawItem>> + Send + 'a>;

/// Critical section handed to `Cache::lock_run`.
pub type Task<'a> = Box<dyn FnOnce() -> BoxFuture<'a, Result<()>> + Send + 'a>;

// == Cache Contract ==
/// Operations every backend exposes over encoded payloads.
///
/// Object safe, so a process can pick its backend at runtime and hold an
/// `Arc<dyn Cache>`. Typed access lives in [`CacheExt`].
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the payload if present and not expired.
    ///
    /// Missing and expired keys are both reported as `CacheError::NotFound`.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Always runs `create` and overwrites the entry with its result.
    async fn set(&self, key: &str, create: Creator<'_>) -> Result<()>;

    /// Returns the live payload, or runs `create` once and stores its result.
    ///
    /// Concurrent calls for one key in this process never both run `create`.
    async fn get_or_set(&self, key: &str, create: Creator<'_>) -> Result<Vec<u8>>;

    /// Deletes the entry. Removing a missing key is a no-op.
    async fn remove(&self, key: &str);

    /// Runs `task` unless another `lock_run` for `id` is inside its window.
    ///
    /// Fails fast with `CacheError::Busy` instead of waiting.
    async fn lock_run(&self, id: &str, window: Duration, task: Task<'_>) -> Result<()>;
}

// == Typed Access ==
/// JSON-typed convenience layer over any [`Cache`].
#[async_trait]
pub trait CacheExt: Cache {
    /// Reads and decodes a value.
    async fn get_value<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let payload = self.get(key).await?;
        Ok(serde_json::from_slice(&payload)?)
    }

    /// Creates, encodes and stores a value unconditionally.
    async fn set_value<T, F, Fut>(&self, key: &str, create: F) -> Result<()>
    where
        T: Serialize + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Item<T>>> + Send,
    {
        self.set(key, encode_creator(create)).await
    }

    /// Returns the cached value or creates, stores and returns a new one.
    async fn get_or_set_value<T, F, Fut>(&self, key: &str, create: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Item<T>>> + Send,
    {
        let payload = self.get_or_set(key, encode_creator(create)).await?;
        Ok(serde_json::from_slice(&payload)?)
    }

    /// Runs `task` under the named lock; its error comes back as `CacheError::Task`.
    async fn lock_run_with<F, Fut>(&self, id: &str, window: Duration, task: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<()>> + Send,
    {
        let task: Task<'_> =
            Box::new(move || async move { task().await.map_err(CacheError::Task) }.boxed());
        self.lock_run(id, window, task).await
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

/// Wraps a typed creator so its value is JSON-encoded before storage.
fn encode_creator<'a, T, F, Fut>(create: F) -> Creator<'a>
where
    T: Serialize + Send + 'a,
    F: FnOnce() -> Fut + Send + 'a,
    Fut: Future<Output = anyhow::Result<Item<T>>> + Send + 'a,
{
    Box::new(move || {
        async move {
            let item = create().await.map_err(CacheError::Creator)?;
            let payload = serde_json::to_vec(&item.value)?;
            Ok(Item::new(payload, item.ttl))
        }
        .boxed()
    })
}
