//! Data model for the asset vault.
//!
//! This crate defines the documents the vault records and exchanges:
//!
//! - Identities: [`VirtualFileId`], [`MemberId`], [`SheetName`], [`TransferId`]
//! - Content addressing: [`HashAlgorithm`], [`ContentHash`]
//! - Version history: [`Version`], [`VersionHistory`], [`FileRecord`]
//! - Path projections: [`Sheet`], [`SheetPath`], [`StagedMapping`]
//! - Client claims: [`LocalSnapshot`], [`SnapshotEntry`]
//! - Transfers: [`PendingTransfer`], [`TransferState`]
//! - Membership: [`Member`], [`Role`], [`Actor`]
//!
//! Everything here is plain data with local invariants. Cross-document
//! rules (who may mutate what, and when) live in the vault core.

pub mod audit;
pub mod config;
pub mod error;
pub mod file;
pub mod hash;
pub mod id;
pub mod member;
pub mod path;
pub mod sheet;
pub mod snapshot;
pub mod transfer;
pub mod version;

pub use audit::{AuditAction, AuditRecord};
pub use config::{VaultConfig, REFERENCE_SHEET_NAME};
pub use error::{
    HistoryError, NameError, PathError, SheetError, SnapshotError, TransferError,
};
pub use file::FileRecord;
pub use hash::{ContentHash, HashAlgorithm};
pub use id::{MemberId, SheetName, TransferId, VirtualFileId};
pub use member::{Actor, Member, Role};
pub use path::SheetPath;
pub use sheet::{Sheet, SheetKind, StagedMapping};
pub use snapshot::{LocalSnapshot, SnapshotEntry};
pub use transfer::{PendingTransfer, TransferState};
pub use version::{now_micros, Version, VersionHistory, VersionSeq};
