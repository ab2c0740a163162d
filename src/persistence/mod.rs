//! Persistence Module
//!
//! Durable tiers layered on a `MemoryEngine`. Memory stays authoritative
//! for reads; the durable copy trails it and failures are only logged.
//!
//! # Backends
//! - `FileAdapter`: periodic full snapshot to a JSON file
//! - `DatabaseAdapter`: row write-through plus periodic authoritative reload

mod database;
mod file;
mod postgres;
mod queue;
mod snapshot;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::cache::CacheEntry;
use crate::error::Result;

pub use database::DatabaseAdapter;
pub use file::FileAdapter;
pub use postgres::{PersistedRow, PgPool, PgRowStore};
pub use queue::WriteBehind;
pub use snapshot::SnapshotFile;

// == Persistence Adapter ==
/// Durable store a cache tier loads from and writes entries to.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Loads every stored entry.
    async fn load_all(&self) -> Result<HashMap<String, CacheEntry>>;

    /// Inserts or replaces one entry.
    async fn save_entry(&self, key: &str, entry: &CacheEntry) -> Result<()>;

    /// Deletes one entry. Deleting a missing key is not an error.
    async fn delete_entry(&self, key: &str) -> Result<()>;

    /// Deletes entries expired at `now` (Unix milliseconds).
    ///
    /// Stores that never hold expired data can keep the default.
    async fn purge_expired(&self, _now: u64) -> Result<u64> {
        Ok(0)
    }
}
