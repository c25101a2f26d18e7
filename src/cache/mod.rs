//! 生成缓存模块：以提示词指纹为键的内容寻址图像缓存。
//!
//! # Generation Cache Module
//!
//! Image generation is slow, billed and non-deterministic in latency, so every
//! prompt is generated at most once per store (modulo the concurrent-miss race
//! described below). The cache is content addressed: the key is a SHA-256
//! fingerprint of the prompt text and nothing else.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`GenerationCache`] | Get-or-generate orchestration, write-back and statistics |
//! | [`CacheConfig`] | Write mode, namespace, timeout and single-flight settings |
//! | [`Fingerprint`] | 64-char lowercase hex SHA-256 of the prompt |
//! | [`KeyDeriver`] | Prompt record and artifact record keys for a fingerprint |
//! | [`BinaryCodec`] | Text-safe artifact encoding, [`Base64Codec`] by default |
//!
//! ## Record Layout
//!
//! | Record | Key | Value |
//! |--------|-----|-------|
//! | Prompt | `{namespace}{fingerprint}` | prompt text, UTF-8 |
//! | Artifact | `{namespace}image_{fingerprint}` | base64 of the image bytes |
//!
//! Per fingerprint the records only ever appear, in the order
//! `NoRecord -> PromptOnly -> PromptAndArtifact`; the cache never deletes.
//!
//! ## Concurrency
//!
//! The store has no conditional write. Two concurrent misses for the same
//! prompt may therefore both call the generator; both write the same key and
//! either write is an acceptable final state. Set
//! [`CacheConfig::single_flight`] to collapse such misses inside one process.
//!
//! ## Example
//!
//! ```rust,no_run
//! use imagine_cache::cache::{CacheConfig, GenerationCache};
//! use imagine_cache::generator::WorkersAiGenerator;
//! use imagine_cache::store::WorkersKvStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> imagine_cache::Result<()> {
//! let store = Arc::new(WorkersKvStore::builder().build()?);
//! let generator = Arc::new(WorkersAiGenerator::builder().build()?);
//! let cache = GenerationCache::new(CacheConfig::from_env()?, store, generator)?;
//!
//! let resolved = cache.resolve("An astronaut riding a horse").await?;
//! println!("{} ({:?})", resolved.fingerprint, resolved.outcome);
//! # Ok(())
//! # }
//! ```

mod codec;
mod config;
mod inflight;
mod key;
mod manager;

pub use codec::{Base64Codec, BinaryCodec};
pub use config::{CacheConfig, WriteMode};
pub use key::{fingerprint, Fingerprint, KeyDeriver, DEFAULT_ARTIFACT_PREFIX, FINGERPRINT_LEN};
pub use manager::{CacheStats, GenerationCache, PromptState};
