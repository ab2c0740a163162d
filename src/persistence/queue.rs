//! Write-Behind Queue
//!
//! Carries persistence writes from the cache's request path to a single
//! background worker without ever blocking the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::cache::CacheEntry;
use crate::persistence::PersistenceAdapter;

// == Persist Operation ==
/// One unit of work for the persistence worker.
#[derive(Debug)]
enum PersistOp {
    Save { key: String, entry: CacheEntry },
    Delete { key: String },
    Flush(oneshot::Sender<()>),
}

impl PersistOp {
    fn key(&self) -> &str {
        match self {
            PersistOp::Save { key, .. } | PersistOp::Delete { key } => key,
            PersistOp::Flush(_) => "",
        }
    }
}

#[derive(Debug, Default)]
struct QueueStats {
    dropped: AtomicU64,
    failed: AtomicU64,
}

// == Write Behind ==
/// Bounded queue in front of a [`PersistenceAdapter`].
///
/// Enqueueing never waits: when the queue is full the write is dropped and
/// counted. The worker exits once every clone of the queue is dropped,
/// after draining what was already queued.
#[derive(Debug, Clone)]
pub struct WriteBehind {
    tx: mpsc::Sender<PersistOp>,
    stats: Arc<QueueStats>,
}

impl WriteBehind {
    /// Starts the worker and returns the queue feeding it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(adapter: Arc<dyn PersistenceAdapter>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(QueueStats::default());

        tokio::spawn(run_worker(adapter, rx, stats.clone()));

        Self { tx, stats }
    }

    /// Queues an upsert of `entry` under `key`.
    pub fn save(&self, key: &str, entry: &CacheEntry) {
        self.submit(PersistOp::Save {
            key: key.to_string(),
            entry: entry.clone(),
        });
    }

    /// Queues a delete of `key`.
    pub fn delete(&self, key: &str) {
        self.submit(PersistOp::Delete {
            key: key.to_string(),
        });
    }

    fn submit(&self, op: PersistOp) {
        match self.tx.try_send(op) {
            Ok(()) => {}
            Err(TrySendError::Full(op)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(key = %op.key(), "Write-behind queue full, dropping persistence write");
            }
            Err(TrySendError::Closed(op)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(key = %op.key(), "Persistence worker stopped, dropping write");
            }
        }
    }

    /// Waits until every operation queued before this call has been applied.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(PersistOp::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Writes dropped because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }

    /// Writes the adapter rejected.
    pub fn failed(&self) -> u64 {
        self.stats.failed.load(Ordering::Relaxed)
    }

    /// Operations waiting for the worker.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

async fn run_worker(
    adapter: Arc<dyn PersistenceAdapter>,
    mut rx: mpsc::Receiver<PersistOp>,
    stats: Arc<QueueStats>,
) {
    debug!("Write-behind worker started");

    while let Some(op) = rx.recv().await {
        let result = match op {
            PersistOp::Save { key, entry } => adapter
                .save_entry(&key, &entry)
                .await
                .map_err(|e| (key, "save", e)),
            PersistOp::Delete { key } => adapter
                .delete_entry(&key)
                .await
                .map_err(|e| (key, "delete", e)),
            PersistOp::Flush(ack) => {
                let _ = ack.send(());
                Ok(())
            }
        };

        if let Err((key, action, error)) = result {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!(key = %key, action, error = %error, "Persistence write failed");
        }
    }

    debug!("Write-behind worker stopped");
}
