//! Generation cache: get-or-generate over a two-record store layout.

use super::codec::{Base64Codec, BinaryCodec};
use super::config::{CacheConfig, WriteMode};
use super::inflight::InflightGate;
use super::key::{Fingerprint, KeyDeriver};
use crate::error::{CodecError, GenerationError};
use crate::generator::ImageGenerator;
use crate::store::KvStore;
use crate::types::{CacheOutcome, Resolved};
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Which records exist for a fingerprint. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    NoRecord,
    PromptOnly,
    PromptAndArtifact,
    /// Artifact written by a lazy-mode cache; not reachable through `lookup_existing`.
    ArtifactOnly,
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub generations: u64,
    pub generation_failures: u64,
    pub corrupt_artifacts: u64,
    pub store_errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 { let total = self.hits + self.misses; if total == 0 { 0.0 } else { self.hits as f64 / total as f64 } }
}

#[derive(Default)]
struct AtomicStats { hits: AtomicU64, misses: AtomicU64, generations: AtomicU64, generation_failures: AtomicU64, corrupt_artifacts: AtomicU64, store_errors: AtomicU64 }

impl AtomicStats {
    fn bump(counter: &AtomicU64) { counter.fetch_add(1, Ordering::Relaxed); }
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            generations: self.generations.load(Ordering::Relaxed),
            generation_failures: self.generation_failures.load(Ordering::Relaxed),
            corrupt_artifacts: self.corrupt_artifacts.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }
}

/// Content-addressed cache in front of an image generator.
///
/// Per fingerprint the store holds at most a prompt record (`key`) and an
/// artifact record (`derive(key)`). The artifact is written once, after a
/// successful generation, and is never written for a failed one.
pub struct GenerationCache {
    config: CacheConfig,
    keys: KeyDeriver,
    store: Arc<dyn KvStore>,
    generator: Arc<dyn ImageGenerator>,
    codec: Arc<dyn BinaryCodec>,
    inflight: Option<InflightGate>,
    stats: AtomicStats,
}

impl GenerationCache {
    pub fn new(config: CacheConfig, store: Arc<dyn KvStore>, generator: Arc<dyn ImageGenerator>) -> Result<Self> {
        config.validate()?;
        let mut keys = KeyDeriver::new().with_artifact_prefix(config.artifact_prefix.clone());
        if let Some(ref ns) = config.namespace {
            keys = keys.with_namespace(ns.clone());
        }
        let inflight = config.single_flight.then(InflightGate::new);
        Ok(Self { config, keys, store, generator, codec: Arc::new(Base64Codec::new()), inflight, stats: AtomicStats::default() })
    }

    pub fn with_codec(mut self, codec: Arc<dyn BinaryCodec>) -> Self { self.codec = codec; self }

    pub fn config(&self) -> &CacheConfig { &self.config }
    pub fn keys(&self) -> &KeyDeriver { &self.keys }
    pub fn stats(&self) -> CacheStats { self.stats.to_stats() }
    pub fn store_name(&self) -> &'static str { self.store.name() }
    /// Fingerprints currently generating (or waiting to) behind the single-flight gate.
    pub fn in_flight(&self) -> usize { self.inflight.as_ref().map_or(0, InflightGate::active) }

    /// Return the image for `prompt`, generating and caching it on a miss.
    ///
    /// In [`WriteMode::Eager`] the prompt record is written first, so the
    /// result is also reachable later through [`lookup_existing`](Self::lookup_existing).
    pub async fn resolve(&self, prompt: &str) -> Result<Resolved> {
        let fp = self.admit(prompt)?;
        if self.config.write_mode == WriteMode::Eager {
            self.write_prompt(&fp, prompt).await?;
        }
        self.get_or_generate(&fp, prompt).await
    }

    /// Record the prompt without generating anything; returns the shareable key.
    pub async fn submit(&self, prompt: &str) -> Result<Fingerprint> {
        let fp = self.admit(prompt)?;
        self.write_prompt(&fp, prompt).await?;
        Ok(fp)
    }

    /// Fetch by fingerprint (or by either derived record key) alone.
    ///
    /// `Ok(None)` when no prompt record exists; the generator is not called in
    /// that case. When the prompt is known but its artifact is not, the image
    /// is generated from the stored prompt text.
    pub async fn lookup_existing(&self, key: &str) -> Result<Option<Resolved>> {
        let fp = self.keys.fingerprint_from_key(key)?;
        let raw = match self.store_get(&self.keys.prompt_key(&fp)).await? {
            Some(raw) => raw,
            None => {
                debug!(fingerprint = %fp, "lookup: no prompt record");
                return Ok(None);
            }
        };
        let prompt = match String::from_utf8(raw) {
            Ok(p) if Fingerprint::of(&p) == fp => p,
            _ => {
                // Never generate from text that does not hash to the requested key.
                warn!(fingerprint = %fp, "lookup: prompt record does not match its key");
                return Ok(None);
            }
        };
        self.get_or_generate(&fp, &prompt).await.map(Some)
    }

    pub async fn state(&self, fp: &Fingerprint) -> Result<PromptState> {
        let prompt = self.store_get(&self.keys.prompt_key(fp)).await?.is_some();
        let artifact = self.store_get(&self.keys.artifact_key(fp)).await?.is_some();
        Ok(match (prompt, artifact) {
            (false, false) => PromptState::NoRecord,
            (true, false) => PromptState::PromptOnly,
            (true, true) => PromptState::PromptAndArtifact,
            (false, true) => PromptState::ArtifactOnly,
        })
    }

    fn admit(&self, prompt: &str) -> Result<Fingerprint> {
        if prompt.len() > self.config.max_prompt_bytes {
            return Err(Error::invalid_input_with_context(
                format!("prompt is {} bytes, limit is {}", prompt.len(), self.config.max_prompt_bytes),
                ErrorContext::new().with_field_path("prompt").with_source("generation_cache"),
            ));
        }
        Ok(Fingerprint::of(prompt))
    }

    async fn get_or_generate(&self, fp: &Fingerprint, prompt: &str) -> Result<Resolved> {
        let artifact_key = self.keys.artifact_key(fp);
        if let Some(image) = self.read_artifact(fp, &artifact_key).await? {
            return Ok(self.hit(fp, image));
        }

        let _guard = match &self.inflight {
            Some(gate) => {
                let guard = gate.acquire(fp).await;
                // Another holder may have produced it while we waited.
                if let Some(image) = self.read_artifact(fp, &artifact_key).await? {
                    return Ok(self.hit(fp, image));
                }
                Some(guard)
            }
            None => None,
        };

        // A miss is only counted once the gated re-read also came up empty.
        AtomicStats::bump(&self.stats.misses);
        self.generate_and_store(fp, prompt, &artifact_key).await
    }

    fn hit(&self, fp: &Fingerprint, image: Vec<u8>) -> Resolved {
        AtomicStats::bump(&self.stats.hits);
        debug!(fingerprint = %fp, bytes = image.len(), "cache hit");
        Resolved { fingerprint: fp.clone(), image: Bytes::from(image), outcome: CacheOutcome::Hit }
    }

    /// A record that fails to decode is reported as absent so it gets regenerated.
    async fn read_artifact(&self, fp: &Fingerprint, artifact_key: &str) -> Result<Option<Vec<u8>>> {
        let Some(raw) = self.store_get(artifact_key).await? else {
            return Ok(None);
        };
        let decoded = std::str::from_utf8(&raw)
            .map_err(|e| Error::from(CodecError::MalformedEncoding(e.to_string())))
            .and_then(|text| self.codec.decode(text));
        match decoded {
            Ok(image) => Ok(Some(image)),
            Err(e) => {
                AtomicStats::bump(&self.stats.corrupt_artifacts);
                warn!(fingerprint = %fp, codec = self.codec.name(), error = %e, "corrupt artifact record, regenerating");
                Ok(None)
            }
        }
    }

    async fn generate_and_store(&self, fp: &Fingerprint, prompt: &str, artifact_key: &str) -> Result<Resolved> {
        AtomicStats::bump(&self.stats.generations);
        let started = Instant::now();
        info!(fingerprint = %fp, generator = self.generator.name(), "cache miss, generating");

        let generated = match self.config.generation_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.generator.generate(prompt)).await {
                Ok(result) => result,
                Err(_) => Err(GenerationError::TimedOut { after: limit }.into()),
            },
            None => self.generator.generate(prompt).await,
        };
        let image = match generated {
            Ok(image) => image,
            Err(e) => {
                AtomicStats::bump(&self.stats.generation_failures);
                warn!(fingerprint = %fp, error = %e, elapsed_ms = started.elapsed().as_millis() as u64, "generation failed");
                return Err(match e {
                    Error::Generation(_) => e,
                    other => Error::generation_failed(other.to_string()),
                });
            }
        };

        let encoded = self.codec.encode(&image);
        self.store_put(artifact_key, encoded.as_bytes()).await?;
        info!(
            fingerprint = %fp,
            bytes = image.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "image generated and cached"
        );
        Ok(Resolved { fingerprint: fp.clone(), image: Bytes::from(image), outcome: CacheOutcome::Generated })
    }

    // Re-submitting identical text overwrites identical content.
    async fn write_prompt(&self, fp: &Fingerprint, prompt: &str) -> Result<()> {
        self.store_put(&self.keys.prompt_key(fp), prompt.as_bytes()).await
    }

    async fn store_get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.store.get(key).await.map_err(|e| {
            AtomicStats::bump(&self.stats.store_errors);
            e
        })
    }

    async fn store_put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.store.put(key, value).await.map_err(|e| {
            AtomicStats::bump(&self.stats.store_errors);
            e
        })
    }
}
