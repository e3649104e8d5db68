//! Content hashing for blob payloads.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_128;

/// Supported hashing algorithms for file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "xxh128")]
    Xxh128,
}

impl HashAlgorithm {
    /// Get the string representation of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Xxh128 => "xxh128",
        }
    }

    /// Get the file extension used for blob payloads on disk.
    pub fn extension(&self) -> &'static str {
        match self {
            HashAlgorithm::Xxh128 => "xxh128",
        }
    }

    /// Hash a full content payload.
    pub fn hash_bytes(&self, data: &[u8]) -> ContentHash {
        match self {
            HashAlgorithm::Xxh128 => ContentHash(format!("{:032x}", xxh3_128(data))),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hex-encoded content digest addressing a stored blob.
///
/// Digests produced by [`HashAlgorithm::hash_bytes`] are lowercase hex.
/// Digests arriving from clients are kept as-is and only ever compared,
/// so a malformed claim simply never matches a recorded version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap an existing digest (from persisted state or a client claim).
    pub fn new(digest: impl Into<String>) -> Self {
        ContentHash(digest.into())
    }

    /// Get the digest text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
