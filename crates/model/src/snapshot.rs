//! Client-reported snapshots of a local working copy.
//!
//! A snapshot is a claim, not a fact: it describes what a client believes
//! its working copy contains. The vault validates it against recorded
//! state and never applies it directly.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::hash::ContentHash;
use crate::id::{SheetName, VirtualFileId};
use crate::path::SheetPath;
use crate::version::VersionSeq;

/// One path's claimed state in a client snapshot.
///
/// Tracked entries carry the file id plus the version and hash the client
/// last synced. Untracked entries carry only the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Path relative to the sheet root.
    pub path: SheetPath,
    /// Claimed file identity. `None` for untracked paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<VirtualFileId>,
    /// Claimed last-synced version sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionSeq>,
    /// Claimed hash of the last-synced version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<ContentHash>,
}

impl SnapshotEntry {
    /// Entry for a path the client tracks.
    pub fn tracked(
        path: SheetPath,
        file_id: VirtualFileId,
        version: VersionSeq,
        hash: ContentHash,
    ) -> Self {
        SnapshotEntry {
            path,
            file_id: Some(file_id),
            version: Some(version),
            hash: Some(hash),
        }
    }

    /// Entry for a local path the client does not track.
    pub fn untracked(path: SheetPath) -> Self {
        SnapshotEntry {
            path,
            file_id: None,
            version: None,
            hash: None,
        }
    }

    pub fn is_untracked(&self) -> bool {
        self.file_id.is_none()
    }

    /// Check field consistency.
    ///
    /// # Errors
    ///
    /// Tracked entries must carry `version` and `hash`; untracked entries
    /// must carry neither.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.file_id.is_some() {
            if self.version.is_none() {
                return Err(SnapshotError::TrackedEntryMissingField {
                    path: self.path.clone(),
                    field: "version",
                });
            }
            if self.hash.is_none() {
                return Err(SnapshotError::TrackedEntryMissingField {
                    path: self.path.clone(),
                    field: "hash",
                });
            }
        } else {
            if self.version.is_some() {
                return Err(SnapshotError::UntrackedEntryHasField {
                    path: self.path.clone(),
                    field: "version",
                });
            }
            if self.hash.is_some() {
                return Err(SnapshotError::UntrackedEntryHasField {
                    path: self.path.clone(),
                    field: "hash",
                });
            }
        }
        Ok(())
    }
}

/// A client's full claim about one sheet's working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSnapshot {
    /// Sheet the snapshot claims to mirror.
    pub sheet: SheetName,
    pub entries: Vec<SnapshotEntry>,
}

impl LocalSnapshot {
    pub fn new(sheet: SheetName, entries: Vec<SnapshotEntry>) -> Self {
        LocalSnapshot { sheet, entries }
    }

    /// Check entry consistency and path uniqueness.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut seen: HashSet<&SheetPath> = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            entry.validate()?;
            if !seen.insert(&entry.path) {
                return Err(SnapshotError::DuplicatePath {
                    path: entry.path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Entry for a path, if listed.
    pub fn entry(&self, path: &SheetPath) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|entry| &entry.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashAlgorithm;

    fn path(text: &str) -> SheetPath {
        SheetPath::parse(text).unwrap()
    }

    fn hash(content: &[u8]) -> ContentHash {
        HashAlgorithm::Xxh128.hash_bytes(content)
    }

    #[test]
    fn test_tracked_entry_validates() {
        let entry: SnapshotEntry =
            SnapshotEntry::tracked(path("a.png"), VirtualFileId::generate(), 3, hash(b"a"));
        assert!(entry.validate().is_ok());
        assert!(!entry.is_untracked());
    }

    #[test]
    fn test_untracked_entry_validates() {
        let entry: SnapshotEntry = SnapshotEntry::untracked(path("new.png"));
        assert!(entry.validate().is_ok());
        assert!(entry.is_untracked());
    }

    #[test]
    fn test_tracked_entry_requires_version_and_hash() {
        let mut entry: SnapshotEntry =
            SnapshotEntry::tracked(path("a.png"), VirtualFileId::generate(), 3, hash(b"a"));
        entry.version = None;
        assert!(matches!(
            entry.validate(),
            Err(SnapshotError::TrackedEntryMissingField { field: "version", .. })
        ));

        let mut entry: SnapshotEntry =
            SnapshotEntry::tracked(path("a.png"), VirtualFileId::generate(), 3, hash(b"a"));
        entry.hash = None;
        assert!(matches!(
            entry.validate(),
            Err(SnapshotError::TrackedEntryMissingField { field: "hash", .. })
        ));
    }

    #[test]
    fn test_untracked_entry_rejects_claim_fields() {
        let mut entry: SnapshotEntry = SnapshotEntry::untracked(path("new.png"));
        entry.version = Some(1);
        assert!(matches!(
            entry.validate(),
            Err(SnapshotError::UntrackedEntryHasField { field: "version", .. })
        ));
    }

    #[test]
    fn test_snapshot_rejects_duplicate_paths() {
        let snapshot: LocalSnapshot = LocalSnapshot::new(
            SheetName::parse("alice-main").unwrap(),
            vec![
                SnapshotEntry::untracked(path("a.png")),
                SnapshotEntry::untracked(path("a.png")),
            ],
        );
        assert!(matches!(
            snapshot.validate(),
            Err(SnapshotError::DuplicatePath { .. })
        ));
    }

    #[test]
    fn test_serde_omits_absent_claim_fields() {
        let entry: SnapshotEntry = SnapshotEntry::untracked(path("new.png"));
        let json: String = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, "{\"path\":\"new.png\"}");
    }
}
