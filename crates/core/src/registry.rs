//! The virtual file registry: canonical identity, holder and history.
//!
//! Every registered file gets its own async lock in a concurrent arena,
//! so operations on unrelated files never contend. Mutations follow a
//! write-through discipline: the updated record is persisted first and
//! applied to memory only after the durable write succeeds, with no
//! await point between the two, so a cancelled operation leaves both
//! views unchanged.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use asset_vault_model::{
    now_micros, ContentHash, FileRecord, HashAlgorithm, MemberId, Version, VersionSeq,
    VirtualFileId,
};
use asset_vault_storage::{BlobStore, MetaStore};

use crate::error::VaultError;

/// Concurrent arena of file records plus the stores behind them.
pub struct FileRegistry {
    entries: DashMap<VirtualFileId, Arc<RwLock<FileRecord>>>,
    blobs: Arc<dyn BlobStore>,
    meta: Arc<dyn MetaStore>,
}

impl FileRegistry {
    pub fn new(blobs: Arc<dyn BlobStore>, meta: Arc<dyn MetaStore>) -> Self {
        FileRegistry {
            entries: DashMap::new(),
            blobs,
            meta,
        }
    }

    /// Fill the arena from loaded records. Called once while opening.
    pub fn preload(&self, records: Vec<FileRecord>) {
        for record in records {
            self.entries
                .insert(record.id(), Arc::new(RwLock::new(record)));
        }
    }

    /// Number of registered files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: VirtualFileId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Per-file critical section handle.
    pub fn entry(&self, id: VirtualFileId) -> Result<Arc<RwLock<FileRecord>>, VaultError> {
        self.entries
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(VaultError::FileNotFound(id))
    }

    /// Consistent copy of a record, if it exists.
    pub async fn snapshot(&self, id: VirtualFileId) -> Option<FileRecord> {
        let handle: Arc<RwLock<FileRecord>> = self.entry(id).ok()?;
        let guard = handle.read().await;
        Some(guard.clone())
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.blobs.algorithm()
    }

    pub fn hash_bytes(&self, data: &[u8]) -> ContentHash {
        self.blobs.algorithm().hash_bytes(data)
    }

    /// Store a payload under its hash.
    pub async fn store_blob(&self, hash: &ContentHash, data: &[u8]) -> Result<(), VaultError> {
        Ok(self.blobs.put(hash, data).await?)
    }

    /// Write a record through to the metadata store.
    pub async fn persist(&self, record: &FileRecord) -> Result<(), VaultError> {
        Ok(self.meta.put_file(record).await?)
    }

    /// Create a brand-new file with version 1 and the author as holder.
    ///
    /// The mapping into the author's sheet is the caller's job; a record
    /// without any mapping is invisible to non-administrators.
    pub async fn create(
        &self,
        author: &MemberId,
        content: &[u8],
        description: &str,
    ) -> Result<FileRecord, VaultError> {
        let id: VirtualFileId = VirtualFileId::generate();
        let hash: ContentHash = self.hash_bytes(content);
        self.blobs.put(&hash, content).await?;

        let first: Version = Version {
            sequence: 1,
            hash,
            description: description.to_string(),
            created_at: now_micros(),
            author: author.clone(),
        };
        let record: FileRecord = FileRecord::new(id, first)?;
        self.meta.put_file(&record).await?;
        self.entries
            .insert(id, Arc::new(RwLock::new(record.clone())));

        debug!(
            "Created file {} ({} bytes) held by '{}'",
            id,
            content.len(),
            author
        );
        Ok(record)
    }

    /// Drop a record again. Compensation for a registration whose sheet
    /// mapping failed; the blob stays, it is content-addressed.
    pub async fn discard(&self, id: VirtualFileId) -> Result<(), VaultError> {
        self.meta.remove_file(id).await?;
        self.entries.remove(&id);
        debug!("Discarded file record {}", id);
        Ok(())
    }

    /// Publish a new version of a held file.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotHolder`] unless `member` currently holds
    /// the file, and [`VaultError::FileNotFound`] for unknown ids.
    pub async fn commit(
        &self,
        id: VirtualFileId,
        member: &MemberId,
        content: &[u8],
        description: &str,
    ) -> Result<Version, VaultError> {
        let handle: Arc<RwLock<FileRecord>> = self.entry(id)?;
        let mut guard = handle.write().await;
        check_holder(&guard, member)?;

        let hash: ContentHash = self.hash_bytes(content);
        self.blobs.put(&hash, content).await?;

        let version: Version = next_version(&guard, member, hash, description);
        let mut updated: FileRecord = guard.clone();
        updated.append_version(version.clone())?;
        self.meta.put_file(&updated).await?;
        *guard = updated;

        info!(
            "Committed version {} of file {} by '{}' ({} bytes)",
            version.sequence,
            id,
            member,
            content.len()
        );
        Ok(version)
    }

    /// Publish an old version's content as a brand-new version.
    ///
    /// Holder-gated like [`FileRegistry::commit`]. No blob is written;
    /// the new version references the old payload.
    pub async fn restore(
        &self,
        id: VirtualFileId,
        member: &MemberId,
        sequence: VersionSeq,
        description: &str,
    ) -> Result<Version, VaultError> {
        let handle: Arc<RwLock<FileRecord>> = self.entry(id)?;
        let mut guard = handle.write().await;
        check_holder(&guard, member)?;

        let hash: ContentHash = guard
            .history()
            .get(sequence)
            .ok_or(VaultError::VersionNotFound { id, sequence })?
            .hash
            .clone();

        let version: Version = next_version(&guard, member, hash, description);
        let mut updated: FileRecord = guard.clone();
        updated.append_version(version.clone())?;
        self.meta.put_file(&updated).await?;
        *guard = updated;

        info!(
            "Restored version {} of file {} as version {} by '{}'",
            sequence, id, version.sequence, member
        );
        Ok(version)
    }

    /// Payload bytes of the given (default: current) version.
    pub async fn fetch(
        &self,
        id: VirtualFileId,
        sequence: Option<VersionSeq>,
    ) -> Result<Vec<u8>, VaultError> {
        let handle: Arc<RwLock<FileRecord>> = self.entry(id)?;
        let hash: ContentHash = {
            let guard = handle.read().await;
            match sequence {
                None => guard.current_version().hash.clone(),
                Some(sequence) => guard
                    .history()
                    .get(sequence)
                    .ok_or(VaultError::VersionNotFound { id, sequence })?
                    .hash
                    .clone(),
            }
        };
        Ok(self.blobs.get(&hash).await?)
    }
}

/// Version record continuing a file's history.
pub fn next_version(
    record: &FileRecord,
    author: &MemberId,
    hash: ContentHash,
    description: &str,
) -> Version {
    Version {
        sequence: record.next_sequence(),
        hash,
        description: description.to_string(),
        created_at: now_micros(),
        author: author.clone(),
    }
}

/// Reject writes from anyone but the current holder.
pub fn check_holder(record: &FileRecord, member: &MemberId) -> Result<(), VaultError> {
    if record.is_held_by(member) {
        return Ok(());
    }
    Err(VaultError::NotHolder {
        id: record.id(),
        member: member.clone(),
        holder: record.holder().cloned(),
    })
}
