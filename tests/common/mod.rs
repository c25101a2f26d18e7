//! Shared stubs for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use imagine_cache::store::MemoryStore;
use imagine_cache::{Error, ImageGenerator, KvStore, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Deterministic fake image for a prompt: PNG magic followed by the prompt bytes
/// and a byte that is not valid UTF-8.
pub fn fake_image(prompt: &str) -> Vec<u8> {
    let mut image = PNG_MAGIC.to_vec();
    image.extend_from_slice(prompt.as_bytes());
    image.push(0xfe);
    image
}

/// Generator stub that counts calls and can be told to fail or stall.
#[derive(Default)]
pub struct CountingGenerator {
    calls: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
}

impl CountingGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_on(&self, prompt: &str) {
        self.failing.lock().unwrap().insert(prompt.to_string());
    }

    pub fn recover(&self, prompt: &str) {
        self.failing.lock().unwrap().remove(prompt);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for CountingGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(prompt) {
            return Err(Error::generation_failed(format!("model refused {:?}", prompt)));
        }
        Ok(fake_image(prompt))
    }

    fn name(&self) -> &str {
        "counting-stub"
    }
}

/// Generator that fails with a non-generation error, as an adapter bug might.
pub struct MisbehavingGenerator;

#[async_trait]
impl ImageGenerator for MisbehavingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<Vec<u8>> {
        Err(Error::configuration("adapter misconfigured"))
    }

    fn name(&self) -> &str {
        "misbehaving"
    }
}

/// Store whose every call fails as a transient outage.
pub struct UnavailableStore;

#[async_trait]
impl KvStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(Error::store_unavailable("connection reset"))
    }

    async fn put(&self, _key: &str, _value: &[u8]) -> Result<()> {
        Err(Error::store_unavailable("connection reset"))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// In-memory store that refuses writes to keys containing `reject`, as a KV
/// namespace with a per-key write limit would.
pub struct RejectingWritesStore {
    pub inner: MemoryStore,
    reject: String,
}

impl RejectingWritesStore {
    pub fn new(reject: &str) -> Self {
        Self {
            inner: MemoryStore::default(),
            reject: reject.to_string(),
        }
    }
}

#[async_trait]
impl KvStore for RejectingWritesStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        if key.contains(&self.reject) {
            return Err(Error::store_unavailable(format!("write to {} timed out", key)));
        }
        self.inner.put(key, value).await
    }

    fn name(&self) -> &'static str {
        "rejecting-writes"
    }
}
