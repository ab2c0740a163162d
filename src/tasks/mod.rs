//! Background Tasks Module
//!
//! Contains the machinery for background loops that run periodically
//! alongside the cache.
//!
//! # Tasks
//! - Expiry sweep: removes expired entries from a `MemoryEngine`
//! - Snapshot save: rewrites the `FileAdapter` snapshot
//! - Row reload: refreshes a `DatabaseAdapter` from its table

mod periodic;

pub use periodic::{spawn_periodic, PeriodicTask};
