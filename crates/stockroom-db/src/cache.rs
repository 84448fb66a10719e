//! # TTL Cache
//!
//! In-process cache for revenue answers. Entries older than the TTL are
//! never served; a zero TTL turns the cache off entirely.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get(key)                                                               │
//! │    ├── ttl == 0            → None (disabled)                            │
//! │    ├── missing             → None                                       │
//! │    ├── age >= ttl          → None                                       │
//! │    └── fresh               → Some(value.clone())                        │
//! │                                                                         │
//! │  insert(key, value)   also sweeps expired entries                       │
//! │  invalidate()         drops everything (new sale recorded)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Shared TTL cache. Clone shares the underlying map.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<K, (Instant, V)>>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        TtlCache {
            ttl: self.ttl,
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    pub async fn insert(&self, key: K, value: V) {
        if !self.is_enabled() {
            return;
        }
        let ttl = self.ttl;
        let mut entries = self.entries.write().await;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        entries.insert(key, (Instant::now(), value));
    }

    pub async fn invalidate(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
