//! Configuration Module
//!
//! Cache tuning knobs shared by every backend, plus the server
//! configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// == Defaults ==
/// Expiry sweep cadence of the memory engine
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);
/// Snapshot save cadence of the file adapter
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(30);
/// Authoritative reload cadence of the database adapter
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(30 * 60);
/// Pending persistence writes held before new ones are dropped
pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 1024;

// == Cache Options ==
/// Background cadences and queue sizes for the cache backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Interval between expiry sweeps
    pub sweep_interval: Duration,
    /// Interval between snapshot saves (file backend)
    pub save_interval: Duration,
    /// Interval between table reloads (database backend)
    pub reload_interval: Duration,
    /// Capacity of the write-behind queue (database backend)
    pub write_queue_capacity: usize,
}

impl CacheOptions {
    /// Sets the expiry sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the snapshot save interval.
    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    /// Sets the table reload interval.
    pub fn with_reload_interval(mut self, interval: Duration) -> Self {
        self.reload_interval = interval;
        self
    }

    /// Sets the write-behind queue capacity (minimum 1).
    pub fn with_write_queue_capacity(mut self, capacity: usize) -> Self {
        self.write_queue_capacity = capacity.max(1);
        self
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            save_interval: DEFAULT_SAVE_INTERVAL,
            reload_interval: DEFAULT_RELOAD_INTERVAL,
            write_queue_capacity: DEFAULT_WRITE_QUEUE_CAPACITY,
        }
    }
}

// == Backend Kind ==
/// Which cache backend the server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Memory only, lost on restart
    Memory,
    /// Memory with periodic snapshot file
    File,
    /// Memory with PostgreSQL write-through and reload
    Postgres,
    /// Redis as the source of truth
    Redis,
}

impl BackendKind {
    /// Lowercase name as accepted by `CACHE_BACKEND`.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::File => "file",
            BackendKind::Postgres => "postgres",
            BackendKind::Redis => "redis",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            "postgres" | "database" | "db" => Ok(BackendKind::Postgres),
            "redis" => Ok(BackendKind::Redis),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Active cache backend
    pub backend: BackendKind,
    /// HTTP server port
    pub server_port: u16,
    /// Background cadences and queue sizes
    pub cache: CacheOptions,
    /// Snapshot file for the file backend
    pub snapshot_path: PathBuf,
    /// PostgreSQL connection string for the database backend
    pub database_url: Option<String>,
    /// Table backing the database backend
    pub table_name: String,
    /// Redis connection string for the redis backend
    pub redis_url: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - memory, file, postgres or redis (default: memory)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Expiry sweep frequency in seconds (default: 600)
    /// - `SAVE_INTERVAL` - Snapshot save frequency in seconds (default: 30)
    /// - `RELOAD_INTERVAL` - Table reload frequency in seconds (default: 1800)
    /// - `WRITE_QUEUE_CAPACITY` - Pending database writes (default: 1024)
    /// - `SNAPSHOT_PATH` - Snapshot file (default: data/cache.json)
    /// - `DATABASE_URL` - PostgreSQL connection string (no default)
    /// - `CACHE_TABLE` - Table name (default: cache_entries)
    /// - `REDIS_URL` - Redis connection string (default: redis://127.0.0.1:6379)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let options = defaults.cache.clone();

        Self {
            backend: parse_env("CACHE_BACKEND").unwrap_or(defaults.backend),
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
            cache: CacheOptions {
                sweep_interval: parse_env("SWEEP_INTERVAL")
                    .map(Duration::from_secs)
                    .unwrap_or(options.sweep_interval),
                save_interval: parse_env("SAVE_INTERVAL")
                    .map(Duration::from_secs)
                    .unwrap_or(options.save_interval),
                reload_interval: parse_env("RELOAD_INTERVAL")
                    .map(Duration::from_secs)
                    .unwrap_or(options.reload_interval),
                write_queue_capacity: parse_env::<usize>("WRITE_QUEUE_CAPACITY")
                    .map(|capacity| capacity.max(1))
                    .unwrap_or(options.write_queue_capacity),
            },
            snapshot_path: env::var("SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_path),
            database_url: env::var("DATABASE_URL").ok().or(defaults.database_url),
            table_name: env::var("CACHE_TABLE").unwrap_or(defaults.table_name),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
        }
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            server_port: 3000,
            cache: CacheOptions::default(),
            snapshot_path: PathBuf::from("data/cache.json"),
            database_url: None,
            table_name: "cache_entries".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}
