//! Fingerprint and record key derivation.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a rendered fingerprint (SHA-256, lowercase hex).
pub const FINGERPRINT_LEN: usize = 64;

/// Default prefix marking a record as "the image for this prompt".
pub const DEFAULT_ARTIFACT_PREFIX: &str = "image_";

/// SHA-256 digest of a prompt, rendered as 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint the UTF-8 bytes of `text`. Empty text is hashed like any other.
    pub fn of(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self(hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect())
    }

    /// Accept an already-rendered fingerprint, e.g. from a shareable link.
    pub fn parse(s: &str) -> Result<Self> {
        let well_formed = s.len() == FINGERPRINT_LEN
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !well_formed {
            return Err(Error::invalid_input_with_context(
                format!("not a fingerprint: {:?}", s),
                ErrorContext::new()
                    .with_details("expected 64 lowercase hex characters")
                    .with_source("fingerprint"),
            ));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

impl TryFrom<String> for Fingerprint {
    type Error = Error;
    fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self { fp.0 }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str { &self.0 }
}

/// Shorthand for [`Fingerprint::of`].
pub fn fingerprint(text: &str) -> Fingerprint { Fingerprint::of(text) }

/// Derives the store keys of both records from a fingerprint.
///
/// The prompt record lives at `namespace + fingerprint`, the artifact record at
/// `namespace + artifact_prefix + fingerprint`. Both mappings are reversible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDeriver {
    namespace: String,
    artifact_prefix: String,
}

impl KeyDeriver {
    pub fn new() -> Self { Self { namespace: String::new(), artifact_prefix: DEFAULT_ARTIFACT_PREFIX.to_string() } }
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self { self.namespace = ns.into(); self }
    pub fn with_artifact_prefix(mut self, prefix: impl Into<String>) -> Self { self.artifact_prefix = prefix.into(); self }

    pub fn prompt_key(&self, fp: &Fingerprint) -> String { format!("{}{}", self.namespace, fp) }
    pub fn artifact_key(&self, fp: &Fingerprint) -> String { format!("{}{}{}", self.namespace, self.artifact_prefix, fp) }

    /// Recover the fingerprint from a bare fingerprint, a prompt key, or an artifact key.
    ///
    /// A bare fingerprint wins over a namespace-stripped reading, so a hex-looking
    /// namespace never eats the front of a plain fingerprint.
    pub fn fingerprint_from_key(&self, key: &str) -> Result<Fingerprint> {
        if let Ok(fp) = Fingerprint::parse(key) {
            return Ok(fp);
        }
        let derived = key.strip_prefix(self.namespace.as_str()).and_then(|rest| {
            if rest.len() == FINGERPRINT_LEN {
                Some(rest)
            } else {
                rest.strip_prefix(self.artifact_prefix.as_str())
            }
        });
        match derived {
            Some(rest) => Fingerprint::parse(rest),
            None => Fingerprint::parse(key),
        }
    }
}

impl Default for KeyDeriver { fn default() -> Self { Self::new() } }
