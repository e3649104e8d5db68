//! Virtual file records: identity, holder and history in one document.

use serde::{Deserialize, Serialize};

use crate::error::HistoryError;
use crate::id::{MemberId, VirtualFileId};
use crate::version::{Version, VersionHistory, VersionSeq};

/// Canonical registry record of one virtual file.
///
/// The record carries everything the vault knows about a file that is
/// independent of any sheet: its identity, the member currently holding
/// the write lock (if any) and the full version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    id: VirtualFileId,
    /// Member currently allowed to publish new versions, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    holder: Option<MemberId>,
    history: VersionHistory,
}

impl FileRecord {
    /// Create the record for a newly registered file.
    ///
    /// The author of the first version starts out as holder.
    ///
    /// # Errors
    ///
    /// Returns a [`HistoryError`] if the first version does not carry
    /// sequence 1.
    pub fn new(id: VirtualFileId, first: Version) -> Result<Self, HistoryError> {
        let holder: Option<MemberId> = Some(first.author.clone());
        Ok(FileRecord {
            id,
            holder,
            history: VersionHistory::new(first)?,
        })
    }

    pub fn id(&self) -> VirtualFileId {
        self.id
    }

    pub fn holder(&self) -> Option<&MemberId> {
        self.holder.as_ref()
    }

    pub fn is_held(&self) -> bool {
        self.holder.is_some()
    }

    pub fn is_held_by(&self, member: &MemberId) -> bool {
        self.holder.as_ref() == Some(member)
    }

    pub fn history(&self) -> &VersionHistory {
        &self.history
    }

    /// Newest version.
    pub fn current_version(&self) -> &Version {
        self.history.current()
    }

    /// Sequence the next committed version must carry.
    pub fn next_sequence(&self) -> VersionSeq {
        self.history.latest_sequence() + 1
    }

    /// Hand the write lock to a member, or clear it with `None`.
    pub fn set_holder(&mut self, holder: Option<MemberId>) {
        self.holder = holder;
    }

    /// Append the next version to the history.
    ///
    /// # Errors
    ///
    /// Returns a [`HistoryError`] if the sequence is not contiguous.
    pub fn append_version(&mut self, version: Version) -> Result<(), HistoryError> {
        self.history.append(version)
    }
}
