//! Key-value store adapters.
//!
//! The generation cache is written against the narrowest contract a text-keyed
//! edge store offers: [`KvStore::get`] and [`KvStore::put`]. There is no delete,
//! no listing, no transactions and no conditional write, so the cache must never
//! rely on any of them.
//!
//! | Adapter | Description |
//! |---------|-------------|
//! | [`MemoryStore`] | Bounded in-process LRU store, for tests and single-node use |
//! | [`WorkersKvStore`] | Workers KV namespace over its REST API |

mod memory;
mod workers_kv;

pub use memory::MemoryStore;
pub use workers_kv::{WorkersKvStore, WorkersKvStoreBuilder};

use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Eventually-consistent key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `Ok(None)` when the key has never been written (or was expired by the store).
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key).await
    }
    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).put(key, value).await
    }
    fn name(&self) -> &'static str {
        (**self).name()
    }
}
