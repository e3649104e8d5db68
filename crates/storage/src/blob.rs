//! Content-addressed blob storage.
//!
//! Blobs are immutable payloads keyed by their content hash. Writes are
//! idempotent and atomic (staged then renamed), reads verify the stored
//! bytes against the requested digest.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::fs;
use tracing::debug;

use asset_vault_model::{ContentHash, HashAlgorithm};

use crate::error::StoreError;
use crate::fsio;
use crate::layout::VaultLayout;

/// Store for content-addressed blob payloads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Algorithm blobs in this store are keyed with.
    fn algorithm(&self) -> HashAlgorithm;

    /// Store a payload under its content hash. Storing the same hash
    /// twice is a no-op.
    ///
    /// The caller is responsible for `hash` actually being the digest of
    /// `data`; the vault core computes it right before calling in.
    async fn put(&self, hash: &ContentHash, data: &[u8]) -> Result<(), StoreError>;

    /// Retrieve a payload by hash, verifying the stored bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BlobNotFound`] for unknown hashes and
    /// [`StoreError::BlobCorrupt`] if the stored bytes no longer match
    /// the digest.
    async fn get(&self, hash: &ContentHash) -> Result<Vec<u8>, StoreError>;

    /// Whether a payload exists for the hash.
    async fn contains(&self, hash: &ContentHash) -> Result<bool, StoreError>;

    /// Size in bytes of the stored payload, if present.
    async fn size(&self, hash: &ContentHash) -> Result<Option<u64>, StoreError>;
}

/// Filesystem-backed blob store.
///
/// Payloads live under `blobs/<aa>/<bb>/<hash>.<ext>` inside the vault
/// data directory.
#[derive(Debug)]
pub struct FsBlobStore {
    layout: VaultLayout,
    algorithm: HashAlgorithm,
}

impl FsBlobStore {
    pub fn new(layout: VaultLayout, algorithm: HashAlgorithm) -> Self {
        FsBlobStore { layout, algorithm }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    async fn put(&self, hash: &ContentHash, data: &[u8]) -> Result<(), StoreError> {
        let path = self.layout.blob_file(hash, self.algorithm);

        // Fast path: content-addressed, so an existing file is the same bytes.
        match fs::try_exists(&path).await {
            Ok(true) => {
                debug!("Blob {} already stored, skipping write", hash);
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => return Err(StoreError::io(&path, e)),
        }

        fsio::write_atomic(&self.layout.temp_dir(), &path, data).await?;
        debug!("Stored blob {} ({} bytes)", hash, data.len());
        Ok(())
    }

    async fn get(&self, hash: &ContentHash) -> Result<Vec<u8>, StoreError> {
        let path = self.layout.blob_file(hash, self.algorithm);
        let data: Vec<u8> = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::BlobNotFound {
                    hash: hash.to_string(),
                })
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let actual: ContentHash = self.algorithm.hash_bytes(&data);
        if &actual != hash {
            return Err(StoreError::BlobCorrupt {
                hash: hash.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(data)
    }

    async fn contains(&self, hash: &ContentHash) -> Result<bool, StoreError> {
        let path = self.layout.blob_file(hash, self.algorithm);
        fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }

    async fn size(&self, hash: &ContentHash) -> Result<Option<u64>, StoreError> {
        let path = self.layout.blob_file(hash, self.algorithm);
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}

/// In-memory blob store for tests and experiments.
#[derive(Debug)]
pub struct MemoryBlobStore {
    algorithm: HashAlgorithm,
    blobs: RwLock<HashMap<ContentHash, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        MemoryBlobStore {
            algorithm,
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of distinct blobs stored.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        MemoryBlobStore::new(HashAlgorithm::Xxh128)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    async fn put(&self, hash: &ContentHash, data: &[u8]) -> Result<(), StoreError> {
        self.blobs
            .write()
            .entry(hash.clone())
            .or_insert_with(|| data.to_vec());
        Ok(())
    }

    async fn get(&self, hash: &ContentHash) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .read()
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::BlobNotFound {
                hash: hash.to_string(),
            })
    }

    async fn contains(&self, hash: &ContentHash) -> Result<bool, StoreError> {
        Ok(self.blobs.read().contains_key(hash))
    }

    async fn size(&self, hash: &ContentHash) -> Result<Option<u64>, StoreError> {
        Ok(self.blobs.read().get(hash).map(|data| data.len() as u64))
    }
}
