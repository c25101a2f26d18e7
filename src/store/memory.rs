//! In-process LRU store.

use super::KvStore;
use crate::{Error, Result};
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

const DEFAULT_CAPACITY: usize = 1024;

/// Bounded in-memory store. Least recently used records are evicted once
/// `capacity` is reached, standing in for a real store's retention policy.
pub struct MemoryStore {
    entries: Mutex<LruCache<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| Error::store_unavailable("memory store poisoned"))
    }

    /// Snapshot read that does not touch recency; intended for inspection.
    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().ok()?.peek(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().map(|e| e.contains(key)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }
    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.lock()?.put(key.to_string(), value.to_vec());
        Ok(())
    }
    fn name(&self) -> &'static str {
        "memory"
    }
}
