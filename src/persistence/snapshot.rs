//! Snapshot File
//!
//! Reads and rewrites the JSON snapshot of a whole store:
//! `{ "<key>": { "payload": [..], "expiration": <ms> }, .. }`.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

/// A snapshot file on disk.
///
/// Every save rewrites the file in place; there is no atomic replace.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Points at `path`; nothing is touched until `load` or `write`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the parent directory if it does not exist.
    pub async fn ensure_dir(&self) -> Result<()> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| io_error("create directory", dir, e)),
            _ => Ok(()),
        }
    }

    /// Reads the snapshot. A missing file is an empty snapshot.
    pub async fn load(&self) -> Result<HashMap<String, CacheEntry>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(io_error("read", &self.path, e)),
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            CacheError::Persistence(format!(
                "corrupt snapshot {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Rewrites the snapshot with `entries`.
    pub async fn write(&self, entries: &HashMap<String, CacheEntry>) -> Result<()> {
        let bytes = serde_json::to_vec(entries)?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| io_error("write", &self.path, e))
    }
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> CacheError {
    CacheError::Persistence(format!("{} {}: {}", action, path.display(), e))
}
