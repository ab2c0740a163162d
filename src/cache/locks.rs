//! Per-Key Lock Registry
//!
//! Serializes population of a single key while leaving other keys free.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

// == Lock Registry ==
/// Lazily created exclusive locks, one per key.
///
/// A handle lives only while some task holds or waits on it: releasing the
/// last guard evicts the key, so the registry stays proportional to the
/// number of keys currently being populated.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LockRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let handle = self.locks.entry(key.to_string()).or_default().clone();
        let guard = handle.lock_owned().await;

        KeyGuard {
            registry: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of keys with a live lock handle.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no key is locked or awaited.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

// == Key Guard ==
/// Exclusive access to one key; released on drop.
pub struct KeyGuard<'a> {
    registry: &'a LockRegistry,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the registry's own reference left: nobody holds or waits.
        self.registry
            .locks
            .remove_if(&self.key, |_, handle| Arc::strong_count(handle) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_handle_evicted_after_release() {
        let registry = LockRegistry::new();

        {
            let _guard = registry.lock("a").await;
            assert_eq!(registry.len(), 1);
        }

        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let registry = Arc::new(LockRegistry::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = registry.lock("shared").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let registry = LockRegistry::new();

        let _a = registry.lock("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), registry.lock("b")).await;

        assert!(b.is_ok(), "Lock on another key should not wait");
    }

    #[tokio::test]
    async fn test_waiter_keeps_handle_alive() {
        let registry = Arc::new(LockRegistry::new());
        let first = registry.lock("k").await;

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move {
                let _guard = registry.lock("k").await;
                registry.len()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(first);

        // The waiter acquired the same handle, which was still registered.
        assert_eq!(waiter.await.unwrap(), 1);
        assert!(registry.is_empty());
    }
}
