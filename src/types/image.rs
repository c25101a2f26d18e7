use crate::cache::{Base64Codec, BinaryCodec, Fingerprint};
use bytes::Bytes;

/// Image container, detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
    Gif,
    Unknown,
}

impl ImageFormat {
    pub fn sniff(bytes: &[u8]) -> Self {
        match bytes {
            [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, ..] => Self::Png,
            [0xff, 0xd8, 0xff, ..] => Self::Jpeg,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Self::Webp,
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Self::Gif,
            _ => Self::Unknown,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Unknown => "application/octet-stream",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Served from an existing artifact record.
    Hit,
    /// Produced by the generator during this call and written back.
    Generated,
}

/// Result of resolving a prompt (or a fingerprint) to image bytes.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub fingerprint: Fingerprint,
    pub image: Bytes,
    pub outcome: CacheOutcome,
}

impl Resolved {
    pub fn is_hit(&self) -> bool {
        self.outcome == CacheOutcome::Hit
    }

    pub fn bytes(&self) -> &[u8] {
        &self.image
    }

    pub fn into_bytes(self) -> Bytes {
        self.image
    }

    pub fn format(&self) -> ImageFormat {
        ImageFormat::sniff(&self.image)
    }

    /// `data:<mime>;base64,<payload>` for inlining into markup.
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format().mime_type(),
            Base64Codec::new().encode(&self.image)
        )
    }
}
