//! # Keyed Mutation Locks
//!
//! One async mutex per product id. A stock mutation holds its product's lock
//! from the read of the stock record until the ledger entry is committed, so
//! two mutations on the same product never interleave inside this process.
//! Mutations on different products take different locks and run
//! concurrently.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  remove 7 (p-1) ──► lock(p-1) ──► read v3 → write v4 → append #4 ──┐   │
//! │  remove 5 (p-1) ──► lock(p-1) ········ waits ·························▼   │
//! │                                       read v4 → write v5 → append #5   │
//! │  add 2    (p-2) ──► lock(p-2) ──► runs in parallel                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The store's version compare-and-set still guards against writers in
//! other processes.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map of per-key async mutexes. Clone shares the map.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        KeyedLocks::default()
    }

    /// Waits for and takes the lock for `key`.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().await;
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }

    /// Drops the entry for `key` when nobody holds or waits on it.
    ///
    /// Call after releasing the guard so the map does not grow with every
    /// product ever touched.
    pub async fn release(&self, key: &str) {
        let mut map = self.inner.lock().await;
        if let Some(slot) = map.get(key) {
            // Only the map's own reference is left.
            if Arc::strong_count(slot) == 1 {
                map.remove(key);
            }
        }
    }

    /// Number of keys currently tracked.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = KeyedLocks::new();
        let guard = locks.lock("p-1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock("p-1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock("p-1").await;
        let _b = locks.lock("p-2").await;
        assert_eq!(locks.len().await, 2);
    }

    #[tokio::test]
    async fn test_release_prunes_idle_keys() {
        let locks = KeyedLocks::new();
        let guard = locks.lock("p-1").await;

        // Held: stays
        locks.release("p-1").await;
        assert_eq!(locks.len().await, 1);

        drop(guard);
        locks.release("p-1").await;
        assert!(locks.is_empty().await);
    }
}
