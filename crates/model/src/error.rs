//! Error types for vault model operations.

use thiserror::Error;

use crate::id::{SheetName, TransferId, VirtualFileId};
use crate::path::SheetPath;
use crate::transfer::TransferState;
use crate::version::VersionSeq;

/// Errors raised while validating a sheet path.
#[derive(Debug, Clone, Error)]
pub enum PathError {
    #[error("Sheet path cannot be empty")]
    Empty,

    #[error("Sheet path must be relative, got '{path}'")]
    Absolute { path: String },

    #[error("Sheet path '{path}' contains an empty component")]
    EmptyComponent { path: String },

    #[error("Sheet path '{path}' contains a '.' or '..' component")]
    Traversal { path: String },
}

/// Errors raised while validating a member id or sheet name.
#[derive(Debug, Clone, Error)]
pub enum NameError {
    #[error("Name cannot be empty")]
    Empty,

    #[error("Name '{name}' contains unsupported characters (allowed: letters, digits, '.', '_', '-')")]
    InvalidCharacters { name: String },
}

/// Errors raised while building or appending to a version history.
#[derive(Debug, Clone, Error)]
pub enum HistoryError {
    #[error("Version history cannot be empty")]
    EmptyHistory,

    #[error("First version must have sequence 1, got {sequence}")]
    FirstSequenceNotOne { sequence: VersionSeq },

    #[error("Version sequence must be contiguous: expected {expected}, got {actual}")]
    NonContiguousSequence {
        expected: VersionSeq,
        actual: VersionSeq,
    },
}

/// Errors raised by sheet mutations.
#[derive(Debug, Clone, Error)]
pub enum SheetError {
    #[error("Path '{path}' is already mapped in sheet '{sheet}'")]
    PathAlreadyMapped { sheet: SheetName, path: SheetPath },

    #[error("File {id} is already mapped at '{existing}' in sheet '{sheet}'")]
    IdAlreadyMapped {
        sheet: SheetName,
        id: VirtualFileId,
        existing: SheetPath,
    },

    #[error("No mapping at '{path}' in sheet '{sheet}'")]
    MappingNotFound { sheet: SheetName, path: SheetPath },

    #[error("Path '{path}' already has a staged proposal in sheet '{sheet}'")]
    AlreadyStaged { sheet: SheetName, path: SheetPath },

    #[error("No staged proposal at '{path}' in sheet '{sheet}'")]
    NotStaged { sheet: SheetName, path: SheetPath },

    #[error("Sheet '{sheet}' does not accept staged proposals")]
    StagingNotSupported { sheet: SheetName },
}

/// Errors raised while validating a client snapshot document.
#[derive(Debug, Clone, Error)]
pub enum SnapshotError {
    #[error("Tracked entry '{path}' is missing the '{field}' field")]
    TrackedEntryMissingField { path: SheetPath, field: &'static str },

    #[error("Untracked entry '{path}' cannot carry the '{field}' field")]
    UntrackedEntryHasField { path: SheetPath, field: &'static str },

    #[error("Snapshot lists path '{path}' more than once")]
    DuplicatePath { path: SheetPath },
}

/// Errors raised by transfer state transitions.
#[derive(Debug, Clone, Error)]
pub enum TransferError {
    #[error("Transfer {id} was already resolved as {state:?}")]
    AlreadyResolved { id: TransferId, state: TransferState },
}
