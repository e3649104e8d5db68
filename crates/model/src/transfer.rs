//! Staged transfer of mapping entries between sheets.

use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::id::{MemberId, SheetName, TransferId, VirtualFileId};
use crate::path::SheetPath;
use crate::version::now_micros;

/// Lifecycle state of a transfer proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    Proposed,
    Accepted,
    Rejected,
}

/// A mapping entry offered from one sheet to another, awaiting the
/// target authority's decision.
///
/// Accepting adds the mapping to the target sheet. Rejecting discards
/// the proposal. Neither touches the source sheet or the file itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransfer {
    pub id: TransferId,
    pub source: SheetName,
    pub target: SheetName,
    pub file_id: VirtualFileId,
    /// Path the entry would take in the target sheet.
    pub proposed_path: SheetPath,
    pub proposed_by: MemberId,
    /// Free-text note shown to the approver.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    /// Proposal time in microseconds since the Unix epoch.
    pub created_at: i64,
    state: TransferState,
}

impl PendingTransfer {
    /// Create a fresh proposal in the `Proposed` state.
    pub fn propose(
        source: SheetName,
        target: SheetName,
        file_id: VirtualFileId,
        proposed_path: SheetPath,
        proposed_by: MemberId,
        note: impl Into<String>,
    ) -> Self {
        PendingTransfer {
            id: TransferId::generate(),
            source,
            target,
            file_id,
            proposed_path,
            proposed_by,
            note: note.into(),
            created_at: now_micros(),
            state: TransferState::Proposed,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == TransferState::Proposed
    }

    /// Mark the transfer accepted.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::AlreadyResolved`] if the transfer left
    /// the `Proposed` state before.
    pub fn accept(&mut self) -> Result<(), TransferError> {
        self.transition(TransferState::Accepted)
    }

    /// Mark the transfer rejected.
    pub fn reject(&mut self) -> Result<(), TransferError> {
        self.transition(TransferState::Rejected)
    }

    fn transition(&mut self, next: TransferState) -> Result<(), TransferError> {
        if self.state != TransferState::Proposed {
            return Err(TransferError::AlreadyResolved {
                id: self.id,
                state: self.state,
            });
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer() -> PendingTransfer {
        PendingTransfer::propose(
            SheetName::parse("alice-main").unwrap(),
            SheetName::parse("reference").unwrap(),
            VirtualFileId::generate(),
            SheetPath::parse("shared/rock.png").unwrap(),
            MemberId::parse("alice").unwrap(),
            "final rock pass",
        )
    }

    #[test]
    fn test_proposal_starts_pending() {
        let t: PendingTransfer = transfer();
        assert_eq!(t.state(), TransferState::Proposed);
        assert!(t.is_pending());
    }

    #[test]
    fn test_accept_resolves_once() {
        let mut t: PendingTransfer = transfer();
        t.accept().unwrap();
        assert_eq!(t.state(), TransferState::Accepted);

        let result = t.reject();
        assert!(matches!(result, Err(TransferError::AlreadyResolved { .. })));
        assert_eq!(t.state(), TransferState::Accepted);
    }

    #[test]
    fn test_reject_resolves_once() {
        let mut t: PendingTransfer = transfer();
        t.reject().unwrap();
        assert_eq!(t.state(), TransferState::Rejected);
        assert!(t.accept().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let t: PendingTransfer = transfer();
        let json: String = serde_json::to_string(&t).unwrap();
        let back: PendingTransfer = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
