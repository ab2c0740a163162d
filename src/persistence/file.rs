//! File Adapter
//!
//! A `MemoryEngine` whose contents are periodically written to a snapshot
//! file and merged back in at startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::cache::{Cache, Creator, MemoryCore, MemoryEngine, Task};
use crate::config::CacheOptions;
use crate::error::Result;
use crate::persistence::SnapshotFile;
use crate::tasks::{spawn_periodic, PeriodicTask};

// == File Adapter ==
/// Memory-backed cache with best-effort snapshot persistence.
///
/// Reads and writes are served from memory. The snapshot trails memory by
/// up to one save interval.
#[derive(Debug)]
pub struct FileAdapter {
    engine: MemoryEngine,
    snapshot: SnapshotFile,
    saver: PeriodicTask,
}

impl FileAdapter {
    // == Constructor ==
    /// Opens the snapshot at `path` and starts the periodic saver.
    ///
    /// A missing directory is created. A missing, unreadable or corrupt
    /// snapshot is logged and the cache starts empty.
    pub async fn new(path: impl Into<PathBuf>, options: &CacheOptions) -> Self {
        let engine = MemoryEngine::from_options(options);
        let snapshot = SnapshotFile::new(path);

        if let Err(e) = snapshot.ensure_dir().await {
            warn!(error = %e, "File cache: cannot prepare snapshot directory");
        }
        match snapshot.load().await {
            Ok(entries) => {
                let restored = engine.core().merge(entries).await;
                info!(
                    path = %snapshot.path().display(),
                    "File cache: restored {} entries", restored
                );
            }
            Err(e) => warn!(error = %e, "File cache load failed"),
        }

        let saver = spawn_saver(
            engine.core().clone(),
            snapshot.clone(),
            options.save_interval,
        );

        Self {
            engine,
            snapshot,
            saver,
        }
    }

    /// Writes the snapshot now. Returns the number of entries saved.
    pub async fn save(&self) -> Result<usize> {
        save_snapshot(self.engine.core(), &self.snapshot).await
    }

    /// Halts the periodic saver. The last snapshot stays on disk.
    pub fn stop_saving(&self) {
        self.saver.stop();
    }

    /// Stops every background loop and writes a final snapshot.
    pub async fn close(self) -> Result<usize> {
        let Self {
            engine,
            snapshot,
            saver,
        } = self;

        saver.shutdown().await;
        let saved = save_snapshot(engine.core(), &snapshot).await;
        engine.shutdown().await;
        saved
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &MemoryEngine {
        &self.engine
    }

    /// The snapshot location.
    pub fn path(&self) -> &Path {
        self.snapshot.path()
    }
}

async fn save_snapshot(core: &MemoryCore, snapshot: &SnapshotFile) -> Result<usize> {
    let entries = core.snapshot().await;
    snapshot.write(&entries).await?;
    Ok(entries.len())
}

fn spawn_saver(core: Arc<MemoryCore>, snapshot: SnapshotFile, interval: Duration) -> PeriodicTask {
    spawn_periodic("snapshot-save", interval, move || {
        let core = core.clone();
        let snapshot = snapshot.clone();
        async move {
            match save_snapshot(&core, &snapshot).await {
                Ok(saved) => debug!("File cache: saved {} entries", saved),
                Err(e) => warn!(error = %e, "File cache save failed"),
            }
        }
    })
}

#[async_trait]
impl Cache for FileAdapter {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.engine.get(key).await
    }

    async fn set(&self, key: &str, create: Creator<'_>) -> Result<()> {
        self.engine.set(key, create).await
    }

    async fn get_or_set(&self, key: &str, create: Creator<'_>) -> Result<Vec<u8>> {
        self.engine.get_or_set(key, create).await
    }

    async fn remove(&self, key: &str) {
        self.engine.remove(key).await
    }

    async fn lock_run(&self, id: &str, window: Duration, task: Task<'_>) -> Result<()> {
        self.engine.lock_run(id, window, task).await
    }
}
