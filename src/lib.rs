//! # imagine-cache
//!
//! 内容寻址的图像生成缓存：相同的提示词只生成一次图像。
//!
//! Content-addressed generation cache for prompt-to-image services.
//!
//! ## Overview
//!
//! A prompt arrives as free text. Its SHA-256 fingerprint names two records in
//! a plain key-value store: the prompt itself and the generated image. A
//! request whose image record already exists is served from the store; only a
//! miss reaches the (slow, billed, fallible) generator, and only a successful
//! generation is written back.
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Fingerprints, codec, configuration and the [`GenerationCache`] |
//! | [`store`] | [`KvStore`] contract plus in-memory and Workers KV adapters |
//! | [`generator`] | [`ImageGenerator`] contract plus the Workers AI client |
//! | [`types`] | Prompt input gate, image format sniffing, resolution results |
//! | [`transport`] | Shared HTTP client and account endpoint helpers |
//!
//! ## Quick Start
//!
//! ```rust
//! use imagine_cache::cache::{CacheConfig, GenerationCache};
//! use imagine_cache::generator::ImageGenerator;
//! use imagine_cache::store::MemoryStore;
//! use std::sync::Arc;
//!
//! struct Solid;
//!
//! #[async_trait::async_trait]
//! impl ImageGenerator for Solid {
//!     async fn generate(&self, _prompt: &str) -> imagine_cache::Result<Vec<u8>> {
//!         Ok(vec![0x89, b'P', b'N', b'G'])
//!     }
//!     fn name(&self) -> &str { "solid" }
//! }
//!
//! # tokio_test::block_on(async {
//! let cache = GenerationCache::new(
//!     CacheConfig::default(),
//!     Arc::new(MemoryStore::default()),
//!     Arc::new(Solid),
//! )?;
//! let first = cache.resolve("a red bicycle").await?;
//! let second = cache.resolve("a red bicycle").await?;
//! assert!(!first.is_hit() && second.is_hit());
//! assert_eq!(first.image, second.image);
//! # Ok::<(), imagine_cache::Error>(())
//! # }).unwrap();
//! ```

pub mod cache;
pub mod generator;
pub mod store;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use cache::{fingerprint, CacheConfig, Fingerprint, GenerationCache, PromptState, WriteMode};
pub use generator::ImageGenerator;
pub use store::KvStore;
pub use types::{CacheOutcome, ImageFormat, PromptInput, Resolved};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{CodecError, Error, ErrorContext, GenerationError, StoreError};
