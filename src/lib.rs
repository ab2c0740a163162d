//! Tiered Cache - TTL caching with stampede protection
//!
//! One cache contract over four backends: plain memory, memory with a
//! snapshot file, memory mirrored to PostgreSQL, and Redis.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod persistence;
pub mod remote;
pub mod tasks;

pub use api::AppState;
pub use backend::Backend;
pub use cache::{Cache, CacheExt, Item, MemoryEngine};
pub use config::{BackendKind, CacheOptions, Config};
pub use error::{CacheError, Result};
pub use persistence::{DatabaseAdapter, FileAdapter, PersistenceAdapter, PgRowStore};
pub use remote::{RedisStore, RemoteStore, RemoteStoreAdapter};
