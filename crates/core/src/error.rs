//! Vault error types.

use asset_vault_model::{
    ContentHash, HistoryError, MemberId, SheetError, SheetName, SheetPath, SnapshotError,
    TransferError, TransferId, VersionSeq, VirtualFileId,
};
use asset_vault_storage::StoreError;
use thiserror::Error;

use crate::validate::DriftFinding;

/// Broad classification of a [`VaultError`].
///
/// Clients branch on the class to decide how to react: re-acquire and retry
/// on staleness, surface permission failures to the user, treat internal
/// errors as bugs or outages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The actor is not allowed to perform the operation.
    Permission,
    /// The actor's view of the vault is out of date.
    Staleness,
    /// A named entity does not exist or collides with an existing one.
    Identity,
    /// The operation lost a race and can be retried.
    Concurrency,
    /// Storage or invariant failure inside the vault itself.
    Internal,
}

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A write operation was attempted by a member that does not hold the file.
    #[error("Member '{member}' does not hold file {id} (holder: {holder:?})")]
    NotHolder {
        /// The file being written.
        id: VirtualFileId,
        /// The member that attempted the write.
        member: MemberId,
        /// The current holder, if any.
        holder: Option<MemberId>,
    },

    /// The actor lacks the authority the operation requires.
    #[error("Member '{member}' is not allowed to {action}")]
    PermissionDenied {
        /// The member that attempted the operation.
        member: MemberId,
        /// What was attempted.
        action: String,
    },

    /// The file is not mapped in the named sheet.
    #[error("File {id} is not visible through sheet '{sheet}'")]
    NotVisible {
        /// The file that was requested.
        id: VirtualFileId,
        /// The sheet it was requested through.
        sheet: SheetName,
    },

    /// An acquire claimed a version that is no longer current.
    #[error(
        "Stale acquire of file {id}: claimed version {claimed_version}, current is {current_version} ({current_hash})"
    )]
    StaleAcquire {
        /// The file being acquired.
        id: VirtualFileId,
        /// The version the client claimed to have.
        claimed_version: VersionSeq,
        /// The version the vault records as current.
        current_version: VersionSeq,
        /// Content hash of the current version.
        current_hash: ContentHash,
    },

    /// A member's local structure no longer matches the vault's records.
    #[error("Snapshot of sheet '{sheet}' drifted from vault records ({count} finding(s))", count = .findings.len())]
    StructuralDrift {
        /// The sheet that was validated.
        sheet: SheetName,
        /// Every detected mismatch.
        findings: Vec<DriftFinding>,
    },

    /// File not found, or not visible to the requesting member.
    #[error("File not found: {0}")]
    FileNotFound(VirtualFileId),

    /// Sheet not found.
    #[error("Sheet not found: {0}")]
    SheetNotFound(SheetName),

    /// Member not found.
    #[error("Member not found: {0}")]
    MemberNotFound(MemberId),

    /// Pending transfer not found in the target sheet's queue.
    #[error("Pending transfer not found: {0}")]
    TransferNotFound(TransferId),

    /// The requested version does not exist in the file's history.
    #[error("File {id} has no version {sequence}")]
    VersionNotFound {
        /// The file that was requested.
        id: VirtualFileId,
        /// The missing sequence number.
        sequence: VersionSeq,
    },

    /// The target path is already mapped in the sheet.
    #[error("Path '{path}' is already mapped in sheet '{sheet}'")]
    DuplicateMapping {
        /// The sheet that rejected the mapping.
        sheet: SheetName,
        /// The occupied path.
        path: SheetPath,
    },

    /// A sheet with this name already exists.
    #[error("Sheet already exists: {0}")]
    SheetExists(SheetName),

    /// A member with this id is already registered.
    #[error("Member already registered: {0}")]
    MemberExists(MemberId),

    /// The file is already held by another member.
    #[error("File {id} is already held by '{holder}'")]
    AlreadyHeld {
        /// The contested file.
        id: VirtualFileId,
        /// The member that holds it.
        holder: MemberId,
    },

    /// Sheet-level mapping errors.
    #[error(transparent)]
    Sheet(#[from] SheetError),

    /// Malformed local snapshot.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Version history invariant violation.
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Transfer state machine violation.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VaultError {
    /// Classify this error for client-side handling.
    pub fn class(&self) -> ErrorClass {
        match self {
            VaultError::NotHolder { .. }
            | VaultError::PermissionDenied { .. }
            | VaultError::NotVisible { .. } => ErrorClass::Permission,

            VaultError::StaleAcquire { .. } | VaultError::StructuralDrift { .. } => {
                ErrorClass::Staleness
            }

            VaultError::FileNotFound(_)
            | VaultError::SheetNotFound(_)
            | VaultError::MemberNotFound(_)
            | VaultError::TransferNotFound(_)
            | VaultError::VersionNotFound { .. }
            | VaultError::DuplicateMapping { .. }
            | VaultError::SheetExists(_)
            | VaultError::MemberExists(_)
            | VaultError::Sheet(_)
            | VaultError::Snapshot(_) => ErrorClass::Identity,

            VaultError::AlreadyHeld { .. } => ErrorClass::Concurrency,

            VaultError::History(_) | VaultError::Transfer(_) | VaultError::Store(_) => {
                ErrorClass::Internal
            }
        }
    }
}
