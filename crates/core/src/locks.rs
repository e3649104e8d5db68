//! Holder lock manager: the single-writer acquire/release protocol.
//!
//! Each virtual file is `Unheld` or `Held(member)`. Acquisition runs a
//! freshness check against the registry's current version, so a member
//! can only start editing from the newest state. Holds have no timeout;
//! they end by explicit release, by the holder re-acquiring (a no-op),
//! or by an administrator override.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use asset_vault_model::{
    Actor, AuditAction, AuditRecord, ContentHash, FileRecord, MemberId, Version, VersionSeq,
    VirtualFileId,
};

use crate::audit::AuditLog;
use crate::error::VaultError;
use crate::registry::{check_holder, next_version, FileRegistry};

/// Client claim about the version it holds locally, checked on acquire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionClaim {
    pub version: VersionSeq,
    pub hash: ContentHash,
}

impl VersionClaim {
    pub fn new(version: VersionSeq, hash: ContentHash) -> Self {
        VersionClaim { version, hash }
    }

    /// Claim matching a record's current version.
    pub fn current(record: &FileRecord) -> Self {
        let current: &Version = record.current_version();
        VersionClaim {
            version: current.sequence,
            hash: current.hash.clone(),
        }
    }
}

/// Content published atomically while releasing.
#[derive(Debug, Clone)]
pub struct FinalCommit {
    pub content: Vec<u8>,
    pub description: String,
}

impl FinalCommit {
    pub fn new(content: impl Into<Vec<u8>>, description: impl Into<String>) -> Self {
        FinalCommit {
            content: content.into(),
            description: description.into(),
        }
    }
}

/// Outcome of a successful acquire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldState {
    pub id: VirtualFileId,
    pub holder: MemberId,
    /// Version the holder starts editing from.
    pub version: VersionSeq,
    /// Whether the member already held the file.
    pub reacquired: bool,
}

/// Enforces the per-file state machine on top of the registry.
pub struct HolderLockManager {
    registry: Arc<FileRegistry>,
    audit: Arc<AuditLog>,
}

impl HolderLockManager {
    pub fn new(registry: Arc<FileRegistry>, audit: Arc<AuditLog>) -> Self {
        HolderLockManager { registry, audit }
    }

    /// Take the write hold on a file.
    ///
    /// A re-acquire by the current holder succeeds without a freshness
    /// check; the holder's working copy legitimately differs from the
    /// current version mid-edit.
    ///
    /// # Errors
    ///
    /// * [`VaultError::AlreadyHeld`] - another member holds the file
    /// * [`VaultError::StaleAcquire`] - the claim does not match the
    ///   current version; the error carries the version and hash to
    ///   refresh to
    /// * [`VaultError::FileNotFound`] - unknown id
    pub async fn acquire(
        &self,
        actor: &Actor,
        id: VirtualFileId,
        claim: &VersionClaim,
    ) -> Result<HoldState, VaultError> {
        let handle: Arc<RwLock<FileRecord>> = self.registry.entry(id)?;
        let mut guard = handle.write().await;

        if guard.is_held_by(actor.id()) {
            debug!("File {} re-acquired by holder '{}'", id, actor.id());
            return Ok(HoldState {
                id,
                holder: actor.id().clone(),
                version: guard.current_version().sequence,
                reacquired: true,
            });
        }
        if let Some(holder) = guard.holder() {
            return Err(VaultError::AlreadyHeld {
                id,
                holder: holder.clone(),
            });
        }

        let current: &Version = guard.current_version();
        if claim.version != current.sequence || claim.hash != current.hash {
            return Err(VaultError::StaleAcquire {
                id,
                claimed_version: claim.version,
                current_version: current.sequence,
                current_hash: current.hash.clone(),
            });
        }

        let mut updated: FileRecord = guard.clone();
        updated.set_holder(Some(actor.id().clone()));
        self.registry.persist(&updated).await?;
        *guard = updated;

        info!(
            "File {} acquired by '{}' at version {}",
            id,
            actor.id(),
            claim.version
        );
        Ok(HoldState {
            id,
            holder: actor.id().clone(),
            version: claim.version,
            reacquired: false,
        })
    }

    /// Give the hold back, optionally publishing one last version.
    ///
    /// Release-with-commit is a single durable write: either the new
    /// version and the released hold both land, or neither does.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotHolder`] unless the actor holds the file.
    pub async fn release(
        &self,
        actor: &Actor,
        id: VirtualFileId,
        final_commit: Option<FinalCommit>,
    ) -> Result<Option<Version>, VaultError> {
        let handle: Arc<RwLock<FileRecord>> = self.registry.entry(id)?;
        let mut guard = handle.write().await;
        check_holder(&guard, actor.id())?;

        let mut updated: FileRecord = guard.clone();
        let mut published: Option<Version> = None;
        if let Some(commit) = final_commit {
            let hash: ContentHash = self.registry.hash_bytes(&commit.content);
            self.registry.store_blob(&hash, &commit.content).await?;
            let version: Version = next_version(&updated, actor.id(), hash, &commit.description);
            updated.append_version(version.clone())?;
            published = Some(version);
        }
        updated.set_holder(None);
        self.registry.persist(&updated).await?;
        *guard = updated;

        match &published {
            Some(version) => info!(
                "File {} released by '{}' with final version {}",
                id,
                actor.id(),
                version.sequence
            ),
            None => info!("File {} released by '{}'", id, actor.id()),
        }
        Ok(published)
    }

    /// Administrator override: clear another member's hold.
    ///
    /// Audit-logged. Clearing an unheld file is a no-op and leaves no
    /// audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::PermissionDenied`] for non-administrators.
    pub async fn force_release(&self, actor: &Actor, id: VirtualFileId) -> Result<(), VaultError> {
        if !actor.is_admin() {
            warn!(
                "Member '{}' denied: force-release of file {}",
                actor.id(),
                id
            );
            return Err(VaultError::PermissionDenied {
                member: actor.id().clone(),
                action: "force-release file holds".to_string(),
            });
        }

        let handle: Arc<RwLock<FileRecord>> = self.registry.entry(id)?;
        let mut guard = handle.write().await;
        let Some(previous) = guard.holder().cloned() else {
            debug!("Force release of file {}: not held", id);
            return Ok(());
        };

        let mut updated: FileRecord = guard.clone();
        updated.set_holder(None);
        self.registry.persist(&updated).await?;
        *guard = updated;
        drop(guard);

        warn!(
            "File {} force-released by administrator '{}', was held by '{}'",
            id,
            actor.id(),
            previous
        );
        self.audit
            .record(
                AuditRecord::new(
                    AuditAction::ForceRelease,
                    actor.id().clone(),
                    format!("released hold by '{previous}'"),
                )
                .with_file(id),
            )
            .await?;
        Ok(())
    }
}
