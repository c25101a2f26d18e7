//! Image generator adapters.
//!
//! A generator is an opaque, slow and fallible function from prompt text to raw
//! image bytes. It knows nothing about caching and offers no retry, timeout or
//! idempotency key of its own; the generation cache layers those on top.

mod workers_ai;

pub use workers_ai::{WorkersAiGenerator, WorkersAiGeneratorBuilder, DEFAULT_MODEL, DEFAULT_NUM_STEPS};

use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>>;
    /// Model or backend identifier, for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<G: ImageGenerator + ?Sized> ImageGenerator for Arc<G> {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        (**self).generate(prompt).await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}
