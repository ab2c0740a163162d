//! Memory Engine Module
//!
//! The authoritative in-process store: TTL expiration, per-key stampede
//! protection, a time-window named lock and a periodic expiry sweep.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::cache::{
    current_timestamp_ms, expiration_after, Cache, CacheEntry, Creator, LockRegistry, Task,
};
use crate::config::CacheOptions;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_periodic, PeriodicTask};

// == Lock Window ==
/// A `lock_run` holder: when its window closes and which call it was.
#[derive(Debug, Clone, Copy)]
struct LockWindow {
    /// Window end in Unix milliseconds, 0 = held until the task returns
    until: u64,
    ticket: u64,
}

impl LockWindow {
    fn is_open_at(&self, now: u64) -> bool {
        self.until == 0 || now < self.until
    }
}

type Windows = StdMutex<HashMap<String, LockWindow>>;

/// Clears a holder's window when its `lock_run` call ends, including when
/// the call's future is dropped before the task returns.
struct WindowRelease<'a> {
    windows: &'a Windows,
    id: &'a str,
    ticket: u64,
}

impl Drop for WindowRelease<'_> {
    fn drop(&mut self) {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        if windows.get(self.id).is_some_and(|held| held.ticket == self.ticket) {
            windows.remove(self.id);
        }
    }
}

// == Memory Core ==
/// Shared state behind a [`MemoryEngine`].
///
/// Lock order is always per-key lock first, then `storage`, then
/// `touched`. The expiry sweep only ever takes `storage`, so it cannot
/// deadlock against a population in progress.
#[derive(Debug, Default)]
pub struct MemoryCore {
    /// Key-value storage, guarded by the coarse lock
    storage: RwLock<HashMap<String, CacheEntry>>,
    /// Per-key population locks
    locks: LockRegistry,
    /// Active `lock_run` windows by id, never held across an await
    windows: Windows,
    /// Source of `lock_run` tickets
    tickets: AtomicU64,
    /// Keys written since a reload began, `None` outside a reload
    touched: Mutex<Option<HashSet<String>>>,
}

impl MemoryCore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Get ==
    /// Returns the payload if present and not expired.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.live_payload(key)
            .await
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    async fn live_payload(&self, key: &str) -> Option<Vec<u8>> {
        let storage = self.storage.read().await;
        storage
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.payload.clone())
    }

    // == Set ==
    /// Runs `create` under the key's lock and overwrites the entry.
    ///
    /// `on_write` sees the new entry while the key lock is still held, so
    /// writes for one key reach it in the same order they reach memory.
    pub async fn set_with<W>(&self, key: &str, create: Creator<'_>, on_write: W) -> Result<()>
    where
        W: FnOnce(&str, &CacheEntry) + Send,
    {
        let _guard = self.locks.lock(key).await;

        let entry = create_entry(create).await?;
        on_write(key, &entry);
        self.store(key, entry).await;

        Ok(())
    }

    // == Get Or Set ==
    /// Returns the live payload, or populates the key exactly once.
    ///
    /// The key lock is taken before the presence check and held through
    /// population, so concurrent callers for the same key queue behind the
    /// first and then find its result.
    pub async fn get_or_set_with<W>(
        &self,
        key: &str,
        create: Creator<'_>,
        on_write: W,
    ) -> Result<Vec<u8>>
    where
        W: FnOnce(&str, &CacheEntry) + Send,
    {
        let _guard = self.locks.lock(key).await;

        if let Some(payload) = self.live_payload(key).await {
            return Ok(payload);
        }

        let entry = create_entry(create).await?;
        on_write(key, &entry);
        let payload = entry.payload.clone();
        self.store(key, entry).await;

        Ok(payload)
    }

    async fn store(&self, key: &str, entry: CacheEntry) {
        let mut storage = self.storage.write().await;
        storage.insert(key.to_string(), entry);
        self.touch(key).await;
    }

    /// Records a write for an in-flight reload. Called with `storage` held.
    async fn touch(&self, key: &str) {
        if let Some(touched) = self.touched.lock().await.as_mut() {
            touched.insert(key.to_string());
        }
    }

    // == Remove ==
    /// Deletes the entry, returning whether one was present.
    pub async fn remove(&self, key: &str) -> bool {
        let mut storage = self.storage.write().await;
        let removed = storage.remove(key).is_some();
        self.touch(key).await;
        removed
    }

    // == Lock Run ==
    /// Runs `task` unless another call for `id` started less than `window` ago.
    ///
    /// This is a time-window approximation: once a holder's window has
    /// passed, a new caller may enter even if the holder is still running.
    /// A zero `window` holds the id until the task returns.
    pub async fn lock_run(&self, id: &str, window: Duration, task: Task<'_>) -> Result<()> {
        let now = current_timestamp_ms();
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);

        {
            let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
            if windows.get(id).is_some_and(|held| held.is_open_at(now)) {
                debug!(id = %id, "lock_run rejected, window still active");
                return Err(CacheError::Busy(id.to_string()));
            }
            let until = expiration_after(window, now);
            windows.insert(id.to_string(), LockWindow { until, ticket });
        }

        let _release = WindowRelease {
            windows: &self.windows,
            id,
            ticket,
        };
        task().await
    }

    // == Clear Expired ==
    /// Removes every expired entry. Returns the number removed.
    pub async fn clear_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut storage = self.storage.write().await;

        let before = storage.len();
        storage.retain(|_, entry| !entry.is_expired_at(now));
        before - storage.len()
    }

    // == Clear ==
    /// Wipes the store.
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }

    // == Length ==
    /// Number of stored entries, expired ones included until swept.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Returns true if the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.storage.read().await.is_empty()
    }

    /// Number of keys with a population currently in flight or queued.
    pub fn pending_locks(&self) -> usize {
        self.locks.len()
    }

    // == Snapshot Support ==
    /// Copies every unexpired entry.
    pub async fn snapshot(&self) -> HashMap<String, CacheEntry> {
        let now = current_timestamp_ms();
        let storage = self.storage.read().await;

        storage
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Adds loaded entries without clobbering live ones.
    ///
    /// A loaded entry wins only if the key is absent or its current entry
    /// has already expired. Returns the number of entries taken.
    pub async fn merge(&self, entries: HashMap<String, CacheEntry>) -> usize {
        let now = current_timestamp_ms();
        let mut storage = self.storage.write().await;
        let mut merged = 0;

        for (key, entry) in entries {
            if entry.is_expired_at(now) {
                continue;
            }
            let replace = storage
                .get(&key)
                .map_or(true, |current| current.is_expired_at(now));
            if replace {
                storage.insert(key, entry);
                merged += 1;
            }
        }

        merged
    }

    /// Swaps in `entries` as the complete new contents.
    pub async fn replace(&self, entries: HashMap<String, CacheEntry>) {
        *self.storage.write().await = entries;
    }

    // == Authoritative Reload ==
    /// Starts recording written keys so [`finish_reload`](Self::finish_reload)
    /// can keep them. Callers must not run two reloads at once.
    pub async fn begin_reload(&self) {
        *self.touched.lock().await = Some(HashSet::new());
    }

    /// Swaps in `loaded`, except for keys written or removed since
    /// [`begin_reload`](Self::begin_reload): those keep their in-memory state.
    ///
    /// Returns the number of entries now stored.
    pub async fn finish_reload(&self, mut loaded: HashMap<String, CacheEntry>) -> usize {
        let mut storage = self.storage.write().await;
        let touched = self.touched.lock().await.take().unwrap_or_default();

        for key in touched {
            match storage.remove(&key) {
                Some(current) => {
                    loaded.insert(key, current);
                }
                None => {
                    loaded.remove(&key);
                }
            }
        }

        *storage = loaded;
        storage.len()
    }

    /// Stops recording written keys after a failed reload.
    pub async fn abort_reload(&self) {
        self.touched.lock().await.take();
    }
}

async fn create_entry(create: Creator<'_>) -> Result<CacheEntry> {
    let item = create().await?;
    Ok(CacheEntry::new(item.value, item.ttl))
}

// == Memory Engine ==
/// In-memory cache backend with a background expiry sweep.
///
/// The sweep stops when the engine is dropped.
#[derive(Debug)]
pub struct MemoryEngine {
    core: Arc<MemoryCore>,
    sweeper: PeriodicTask,
}

impl MemoryEngine {
    // == Constructor ==
    /// Creates an engine sweeping expired entries every `sweep_interval`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(sweep_interval: Duration) -> Self {
        let core = Arc::new(MemoryCore::new());
        let sweeper = spawn_sweeper(core.clone(), sweep_interval);

        Self { core, sweeper }
    }

    /// Creates an engine from shared cache options.
    pub fn from_options(options: &CacheOptions) -> Self {
        Self::new(options.sweep_interval)
    }

    /// Shared store, for adapters and their background loops.
    pub fn core(&self) -> &Arc<MemoryCore> {
        &self.core
    }

    /// Runs one expiry sweep immediately.
    pub async fn clear_expired(&self) -> usize {
        self.core.clear_expired().await
    }

    /// Wipes the store.
    pub async fn clear(&self) {
        self.core.clear().await
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.core.len().await
    }

    /// Returns true if the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.core.is_empty().await
    }

    /// Stops the background sweep. Entries are still checked on read.
    pub fn stop_sweeping(&self) {
        self.sweeper.stop();
    }

    /// Restarts the background sweep with a new cadence.
    ///
    /// The first sweep runs one full `interval` after this call.
    pub fn reset_sweep_interval(&mut self, interval: Duration) {
        self.sweeper.stop();
        self.sweeper = spawn_sweeper(self.core.clone(), interval);
    }

    /// Stops the background sweep and waits for it to exit.
    pub async fn shutdown(self) {
        self.sweeper.shutdown().await;
    }
}

fn spawn_sweeper(core: Arc<MemoryCore>, interval: Duration) -> PeriodicTask {
    spawn_periodic("expiry-sweep", interval, move || {
        let core = core.clone();
        async move {
            let removed = core.clear_expired().await;
            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}

#[async_trait]
impl Cache for MemoryEngine {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.core.get(key).await
    }

    async fn set(&self, key: &str, create: Creator<'_>) -> Result<()> {
        self.core.set_with(key, create, |_, _| {}).await
    }

    async fn get_or_set(&self, key: &str, create: Creator<'_>) -> Result<Vec<u8>> {
        self.core.get_or_set_with(key, create, |_, _| {}).await
    }

    async fn remove(&self, key: &str) {
        self.core.remove(key).await;
    }

    async fn lock_run(&self, id: &str, window: Duration, task: Task<'_>) -> Result<()> {
        self.core.lock_run(id, window, task).await
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheExt, Item};
    use futures_util::FutureExt;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;
    use tokio::time::sleep;

    const HOUR: Duration = Duration::from_secs(3600);

    fn engine() -> MemoryEngine {
        MemoryEngine::new(HOUR)
    }

    async fn created<T>(item: Item<T>) -> anyhow::Result<Item<T>> {
        Ok(item)
    }

    fn raw(value: &'static [u8]) -> Creator<'static> {
        Box::new(move || async move { Ok::<_, CacheError>(Item::immortal(value.to_vec())) }.boxed())
    }

    #[tokio::test]
    async fn test_set_immortal_and_get() {
        let engine = engine();

        engine
            .set_value("key1", || created(Item::immortal("value1")))
            .await
            .unwrap();

        let value: String = engine.get_value("key1").await.unwrap();
        assert_eq!(value, "value1");
        assert_eq!(engine.core().get("key1").await.unwrap(), b"\"value1\"");
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let engine = engine();

        let result = engine.get("nonexistent").await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let engine = engine();

        engine
            .set_value("key1", || created(Item::new(1u32, Duration::from_millis(50))))
            .await
            .unwrap();
        assert!(engine.get("key1").await.is_ok());

        sleep(Duration::from_millis(80)).await;

        let result = engine.get("key1").await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let engine = engine();

        engine.set_value("key1", || created(Item::immortal(1u32))).await.unwrap();
        engine.set_value("key1", || created(Item::immortal(2u32))).await.unwrap();

        assert_eq!(engine.get_value::<u32>("key1").await.unwrap(), 2);
        assert_eq!(engine.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_or_set_keeps_live_value() {
        let engine = engine();
        engine.set_value("key1", || created(Item::immortal(1u32))).await.unwrap();

        let value: u32 = engine
            .get_or_set_value("key1", || created(Item::immortal(99u32)))
            .await
            .unwrap();

        assert_eq!(value, 1);
    }

    #[tokio::test]
    async fn test_get_or_set_repopulates_expired() {
        let engine = engine();
        engine
            .set_value("key1", || created(Item::new(1u32, Duration::from_millis(20))))
            .await
            .unwrap();
        sleep(Duration::from_millis(40)).await;

        let value: u32 = engine
            .get_or_set_value("key1", || created(Item::immortal(2u32)))
            .await
            .unwrap();

        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_concurrent_get_or_set_creates_once() {
        let engine = Arc::new(engine());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let engine = engine.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .get_or_set_value("hot", move || async move {
                        sleep(Duration::from_millis(30)).await;
                        let n = calls.fetch_add(1, Ordering::SeqCst) as u64 + 1;
                        anyhow::Ok(Item::immortal(n))
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| *v == 1));
        assert_eq!(engine.core().pending_locks(), 0);
    }

    #[tokio::test]
    async fn test_slow_creator_does_not_block_other_keys() {
        let engine = Arc::new(engine());
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let slow = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .set_value("slow", move || async move {
                        let _ = release_rx.await;
                        anyhow::Ok(Item::immortal(0u8))
                    })
                    .await
            })
        };
        sleep(Duration::from_millis(10)).await;

        let fast = tokio::time::timeout(
            Duration::from_millis(200),
            engine.get_or_set_value("fast", || created(Item::immortal(1u8))),
        )
        .await;
        assert_eq!(fast.unwrap().unwrap(), 1);

        release_tx.send(()).unwrap();
        slow.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_creator_error_propagates() {
        let engine = engine();

        let result = engine
            .get_or_set_value("key1", || async {
                Err::<Item<u32>, _>(anyhow::anyhow!("db down"))
            })
            .await;

        match result {
            Err(CacheError::Creator(e)) => assert_eq!(e.to_string(), "db down"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(engine.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove() {
        let engine = engine();
        engine.set_value("key1", || created(Item::immortal(1u32))).await.unwrap();

        engine.remove("key1").await;
        engine.remove("key1").await;

        assert!(matches!(engine.get("key1").await, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_lock_run_busy_inside_window() {
        let engine = Arc::new(engine());
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let holder = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .lock_run_with("job", Duration::from_secs(60), move || async move {
                        let _ = release_rx.await;
                        Ok(())
                    })
                    .await
            })
        };
        sleep(Duration::from_millis(20)).await;

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        let second = engine
            .lock_run_with("job", Duration::from_secs(60), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(second, Err(CacheError::Busy(_))));
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        release_tx.send(()).unwrap();
        holder.await.unwrap().unwrap();

        // Released on return
        engine
            .lock_run_with("job", Duration::from_secs(60), || async { Ok(()) })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lock_run_after_window_elapses() {
        let engine = Arc::new(engine());
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let holder = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .lock_run_with("job", Duration::from_millis(30), move || async move {
                        let _ = release_rx.await;
                        Ok(())
                    })
                    .await
            })
        };
        sleep(Duration::from_millis(60)).await;

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        engine
            .lock_run_with("job", Duration::from_millis(30), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        release_tx.send(()).unwrap();
        holder.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_lock_run_releases_on_error() {
        let engine = engine();

        let result = engine
            .lock_run_with("job", Duration::from_secs(60), || async {
                Err(anyhow::anyhow!("failed"))
            })
            .await;
        assert!(matches!(result, Err(CacheError::Task(_))));

        engine
            .lock_run_with("job", Duration::from_secs(60), || async { Ok(()) })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lock_run_zero_window_holds_until_return() {
        let engine = Arc::new(engine());
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let holder = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .lock_run_with("job", Duration::ZERO, move || async move {
                        let _ = release_rx.await;
                        Ok(())
                    })
                    .await
            })
        };
        sleep(Duration::from_millis(50)).await;

        let busy = engine
            .lock_run_with("job", Duration::ZERO, || async { Ok(()) })
            .await;
        assert!(busy.unwrap_err().is_busy());

        release_tx.send(()).unwrap();
        holder.await.unwrap().unwrap();
        engine
            .lock_run_with("job", Duration::ZERO, || async { Ok(()) })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lock_run_released_when_caller_gives_up() {
        let engine = engine();

        let timed_out = tokio::time::timeout(
            Duration::from_millis(20),
            engine.lock_run_with("job", Duration::ZERO, || async {
                sleep(Duration::from_secs(10)).await;
                Ok(())
            }),
        )
        .await;
        assert!(timed_out.is_err());

        engine
            .lock_run_with("job", Duration::ZERO, || async { Ok(()) })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reset_sweep_interval() {
        let mut engine = engine();
        engine
            .set_value("short", || created(Item::new(1u32, Duration::from_millis(10))))
            .await
            .unwrap();

        engine.reset_sweep_interval(Duration::from_millis(20));
        sleep(Duration::from_millis(80)).await;

        // Only the sweep removes entries from storage
        assert_eq!(engine.len().await, 0);
    }

    #[tokio::test]
    async fn test_reload_keeps_keys_written_meanwhile() {
        let core = MemoryCore::new();
        core.set_with("kept", raw(b"1"), |_, _| {})
            .await
            .unwrap();
        core.set_with("dropped", raw(b"2"), |_, _| {})
            .await
            .unwrap();

        core.begin_reload().await;
        core.set_with("written", raw(b"new"), |_, _| {})
            .await
            .unwrap();
        core.remove("kept").await;

        let loaded = HashMap::from([
            ("kept".to_string(), CacheEntry::new(b"old".to_vec(), Duration::ZERO)),
            ("written".to_string(), CacheEntry::new(b"old".to_vec(), Duration::ZERO)),
            ("other".to_string(), CacheEntry::new(b"3".to_vec(), Duration::ZERO)),
        ]);
        assert_eq!(core.finish_reload(loaded).await, 2);

        assert!(core.get("kept").await.is_err());
        assert!(core.get("dropped").await.is_err());
        assert_eq!(core.get("written").await.unwrap(), b"new");
        assert_eq!(core.get("other").await.unwrap(), b"3");

        // Tracking ends with the reload
        core.remove("other").await;
        assert!(core.touched.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_clear_expired_and_clear() {
        let engine = engine();
        engine
            .set_value("short", || created(Item::new(1u32, Duration::from_millis(20))))
            .await
            .unwrap();
        engine
            .set_value("long", || created(Item::new(2u32, HOUR)))
            .await
            .unwrap();
        engine.set_value("forever", || created(Item::immortal(3u32))).await.unwrap();

        sleep(Duration::from_millis(40)).await;

        assert_eq!(engine.clear_expired().await, 1);
        assert_eq!(engine.len().await, 2);

        engine.clear().await;
        assert!(engine.is_empty().await);
    }

    #[tokio::test]
    async fn test_background_sweep_removes_expired() {
        let engine = MemoryEngine::new(Duration::from_millis(20));
        engine
            .set_value("short", || created(Item::new(1u32, Duration::from_millis(10))))
            .await
            .unwrap();

        sleep(Duration::from_millis(100)).await;

        assert!(engine.is_empty().await, "Expired entry should have been swept");
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_merge_never_clobbers_live_entries() {
        let core = MemoryCore::new();
        let now = current_timestamp_ms();
        core.replace(HashMap::from([
            ("live".to_string(), CacheEntry { payload: b"1".to_vec(), expiration: 0 }),
            ("stale".to_string(), CacheEntry { payload: b"2".to_vec(), expiration: now - 1 }),
        ]))
        .await;

        let loaded = HashMap::from([
            ("live".to_string(), CacheEntry { payload: b"9".to_vec(), expiration: 0 }),
            ("stale".to_string(), CacheEntry { payload: b"8".to_vec(), expiration: 0 }),
            ("new".to_string(), CacheEntry { payload: b"7".to_vec(), expiration: 0 }),
            ("dead".to_string(), CacheEntry { payload: b"6".to_vec(), expiration: now - 1 }),
        ]);

        assert_eq!(core.merge(loaded).await, 2);
        assert_eq!(core.get("live").await.unwrap(), b"1");
        assert_eq!(core.get("stale").await.unwrap(), b"8");
        assert_eq!(core.get("new").await.unwrap(), b"7");
        assert!(core.get("dead").await.is_err());
    }
}
