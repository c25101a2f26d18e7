//! Binary-to-text codec for storing artifacts in a text-oriented store.

use crate::error::CodecError;
use crate::Result;
use base64::Engine as _;

/// Lossless transform between raw bytes and a text-safe representation.
pub trait BinaryCodec: Send + Sync {
    fn encode(&self, bytes: &[u8]) -> String;
    /// Must reject input outside the codec's alphabet instead of truncating it.
    fn decode(&self, text: &str) -> Result<Vec<u8>>;
    fn name(&self) -> &'static str;
}

/// Standard padded base64 (RFC 4648 §4).
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Codec;

impl Base64Codec {
    pub fn new() -> Self {
        Self
    }
}

impl BinaryCodec for Base64Codec {
    fn encode(&self, bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    fn decode(&self, text: &str) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(text)
            .map_err(|e| CodecError::MalformedEncoding(e.to_string()).into())
    }

    fn name(&self) -> &'static str {
        "base64"
    }
}
