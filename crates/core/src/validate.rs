//! Structural validation of client snapshots.
//!
//! A client submits a [`LocalSnapshot`] describing what it believes its
//! working copy contains. Validation compares that claim against the
//! recorded sheet and the registry's version histories and sorts every
//! path into one of:
//!
//! - **fresh** - tracked at the current version, safe to acquire
//! - **stale** - tracked at an older recorded version, refresh first
//! - **untracked** - new local path with no mapping, eligible for register
//! - **missing** - mapped in the sheet but absent from the snapshot
//! - **drift** - local structure contradicts the recorded mapping
//!
//! Drift is never repaired automatically. The vault refuses to guess
//! intent when physical and recorded structures disagree; the member
//! reconciles by re-mapping or re-tracking, then validates again.

use std::collections::{HashMap, HashSet};

use asset_vault_model::{
    ContentHash, LocalSnapshot, Sheet, SheetPath, SnapshotError, Version, VersionHistory,
    VersionSeq, VirtualFileId,
};
use thiserror::Error;

/// One detected contradiction between a snapshot and the recorded sheet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriftFinding {
    /// The path is tracked locally under a different id than the sheet
    /// records. The file was moved or replaced without a sheet mutation.
    #[error("Path '{path}' is tracked as file {claimed} but the sheet records {recorded}")]
    PathRemapped {
        path: SheetPath,
        claimed: VirtualFileId,
        recorded: VirtualFileId,
    },

    /// The path is tracked locally but the sheet does not map it at all.
    #[error("Path '{path}' is tracked as file {claimed} but the sheet has no mapping for it")]
    UnrecordedMapping {
        path: SheetPath,
        claimed: VirtualFileId,
    },

    /// The claimed version/hash pair matches nothing in the mapped file's
    /// history.
    #[error("Path '{path}' claims version {version} ({hash}) which file {id} never recorded")]
    UnknownVersion {
        path: SheetPath,
        id: VirtualFileId,
        version: VersionSeq,
        hash: ContentHash,
    },

    /// The path is untracked locally while the sheet maps a file there.
    #[error("Path '{path}' is untracked locally but the sheet maps it to file {recorded}")]
    UntrackedCollision {
        path: SheetPath,
        recorded: VirtualFileId,
    },
}

/// A tracked path whose claim matches an older recorded version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleEntry {
    pub path: SheetPath,
    pub id: VirtualFileId,
    /// Version the client last synced.
    pub local_version: VersionSeq,
    /// Version the vault records as current.
    pub current_version: VersionSeq,
}

/// Outcome of validating one snapshot against one sheet.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Paths tracked at the current version.
    pub fresh: Vec<SheetPath>,
    /// Paths tracked at an older recorded version.
    pub stale: Vec<StaleEntry>,
    /// Local paths with no mapping and no claim.
    pub untracked: Vec<SheetPath>,
    /// Mapped paths the snapshot did not mention.
    pub missing: Vec<SheetPath>,
    /// Contradictions between local and recorded structure.
    pub findings: Vec<DriftFinding>,
}

impl ValidationReport {
    /// Whether any contradiction was found.
    pub fn has_drift(&self) -> bool {
        !self.findings.is_empty()
    }

    /// Whether the client should refresh before acquiring anything.
    pub fn needs_refresh(&self) -> bool {
        !self.stale.is_empty() || !self.missing.is_empty()
    }
}

/// Classify a snapshot against the recorded sheet and version histories.
///
/// `histories` carries the history of every file id the sheet maps; ids
/// missing from it are treated as having no recorded versions, so any
/// claim against them is an [`DriftFinding::UnknownVersion`].
///
/// # Errors
///
/// Returns a [`SnapshotError`] if the snapshot itself is malformed
/// (tracked entries missing claim fields, duplicate paths). Drift is not
/// an error at this layer; it is reported through
/// [`ValidationReport::findings`].
pub fn classify(
    snapshot: &LocalSnapshot,
    sheet: &Sheet,
    histories: &HashMap<VirtualFileId, VersionHistory>,
) -> Result<ValidationReport, SnapshotError> {
    snapshot.validate()?;

    let mut report: ValidationReport = ValidationReport::default();
    let mut seen: HashSet<&SheetPath> = HashSet::with_capacity(snapshot.entries.len());

    for entry in &snapshot.entries {
        seen.insert(&entry.path);
        let recorded: Option<VirtualFileId> = sheet.resolve(&entry.path);

        match (entry.file_id, recorded) {
            (None, None) => report.untracked.push(entry.path.clone()),

            (None, Some(recorded)) => report.findings.push(DriftFinding::UntrackedCollision {
                path: entry.path.clone(),
                recorded,
            }),

            (Some(claimed), None) => report.findings.push(DriftFinding::UnrecordedMapping {
                path: entry.path.clone(),
                claimed,
            }),

            (Some(claimed), Some(recorded)) if claimed != recorded => {
                report.findings.push(DriftFinding::PathRemapped {
                    path: entry.path.clone(),
                    claimed,
                    recorded,
                });
            }

            (Some(claimed), Some(_)) => {
                // validate() guarantees tracked entries carry both fields.
                let (Some(version), Some(hash)) = (entry.version, entry.hash.as_ref()) else {
                    continue;
                };
                classify_claim(&mut report, &entry.path, claimed, version, hash, histories);
            }
        }
    }

    for (path, _) in sheet.entries() {
        if !seen.contains(path) {
            report.missing.push(path.clone());
        }
    }

    Ok(report)
}

/// Classify one tracked claim whose id agrees with the sheet.
fn classify_claim(
    report: &mut ValidationReport,
    path: &SheetPath,
    id: VirtualFileId,
    version: VersionSeq,
    hash: &ContentHash,
    histories: &HashMap<VirtualFileId, VersionHistory>,
) {
    let Some(history) = histories.get(&id) else {
        report.findings.push(DriftFinding::UnknownVersion {
            path: path.clone(),
            id,
            version,
            hash: hash.clone(),
        });
        return;
    };

    let current: &Version = history.current();
    if version == current.sequence && *hash == current.hash {
        report.fresh.push(path.clone());
    } else if history.has_version(version, hash) {
        report.stale.push(StaleEntry {
            path: path.clone(),
            id,
            local_version: version,
            current_version: current.sequence,
        });
    } else {
        report.findings.push(DriftFinding::UnknownVersion {
            path: path.clone(),
            id,
            version,
            hash: hash.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset_vault_model::{HashAlgorithm, MemberId, SheetName, SnapshotEntry};

    fn path(text: &str) -> SheetPath {
        SheetPath::parse(text).unwrap()
    }

    fn hash(content: &[u8]) -> ContentHash {
        HashAlgorithm::Xxh128.hash_bytes(content)
    }

    fn version(sequence: VersionSeq, content: &[u8]) -> Version {
        Version {
            sequence,
            hash: hash(content),
            description: String::new(),
            created_at: 0,
            author: MemberId::parse("alice").unwrap(),
        }
    }

    /// Sheet with one file at `assets/rock.png`, two versions recorded.
    fn fixture() -> (Sheet, VirtualFileId, HashMap<VirtualFileId, VersionHistory>) {
        let mut sheet: Sheet = Sheet::member(
            SheetName::parse("alice-main").unwrap(),
            MemberId::parse("alice").unwrap(),
        );
        let id: VirtualFileId = VirtualFileId::generate();
        sheet.insert(path("assets/rock.png"), id).unwrap();

        let mut history: VersionHistory = VersionHistory::new(version(1, b"v1")).unwrap();
        history.append(version(2, b"v2")).unwrap();

        let mut histories: HashMap<VirtualFileId, VersionHistory> = HashMap::new();
        histories.insert(id, history);
        (sheet, id, histories)
    }

    fn snapshot(sheet: &Sheet, entries: Vec<SnapshotEntry>) -> LocalSnapshot {
        LocalSnapshot::new(sheet.name().clone(), entries)
    }

    // ==================== Clean verdicts ====================

    #[test]
    fn test_current_claim_is_fresh() {
        let (sheet, id, histories) = fixture();
        let claim: LocalSnapshot = snapshot(
            &sheet,
            vec![SnapshotEntry::tracked(
                path("assets/rock.png"),
                id,
                2,
                hash(b"v2"),
            )],
        );

        let report: ValidationReport = classify(&claim, &sheet, &histories).unwrap();
        assert!(!report.has_drift());
        assert!(!report.needs_refresh());
        assert_eq!(report.fresh, vec![path("assets/rock.png")]);
    }

    #[test]
    fn test_older_recorded_claim_is_stale() {
        let (sheet, id, histories) = fixture();
        let claim: LocalSnapshot = snapshot(
            &sheet,
            vec![SnapshotEntry::tracked(
                path("assets/rock.png"),
                id,
                1,
                hash(b"v1"),
            )],
        );

        let report: ValidationReport = classify(&claim, &sheet, &histories).unwrap();
        assert!(!report.has_drift());
        assert!(report.needs_refresh());
        assert_eq!(report.stale.len(), 1);
        assert_eq!(report.stale[0].local_version, 1);
        assert_eq!(report.stale[0].current_version, 2);
    }

    #[test]
    fn test_new_path_is_untracked_not_drift() {
        let (sheet, id, histories) = fixture();
        let claim: LocalSnapshot = snapshot(
            &sheet,
            vec![
                SnapshotEntry::tracked(path("assets/rock.png"), id, 2, hash(b"v2")),
                SnapshotEntry::untracked(path("assets/new.png")),
            ],
        );

        let report: ValidationReport = classify(&claim, &sheet, &histories).unwrap();
        assert!(!report.has_drift());
        assert_eq!(report.untracked, vec![path("assets/new.png")]);
    }

    #[test]
    fn test_unlisted_mapped_path_is_missing() {
        let (sheet, _, histories) = fixture();
        let claim: LocalSnapshot = snapshot(&sheet, vec![]);

        let report: ValidationReport = classify(&claim, &sheet, &histories).unwrap();
        assert!(!report.has_drift());
        assert_eq!(report.missing, vec![path("assets/rock.png")]);
    }

    // ==================== Drift ====================

    #[test]
    fn test_claim_under_different_id_is_remap_drift() {
        let (sheet, _, histories) = fixture();
        let other: VirtualFileId = VirtualFileId::generate();
        let claim: LocalSnapshot = snapshot(
            &sheet,
            vec![SnapshotEntry::tracked(
                path("assets/rock.png"),
                other,
                1,
                hash(b"v1"),
            )],
        );

        let report: ValidationReport = classify(&claim, &sheet, &histories).unwrap();
        assert!(report.has_drift());
        assert!(matches!(
            report.findings[0],
            DriftFinding::PathRemapped { claimed, .. } if claimed == other
        ));
    }

    #[test]
    fn test_tracked_claim_at_unmapped_path_is_drift() {
        let (sheet, id, histories) = fixture();
        let claim: LocalSnapshot = snapshot(
            &sheet,
            vec![SnapshotEntry::tracked(
                path("assets/moved.png"),
                id,
                2,
                hash(b"v2"),
            )],
        );

        let report: ValidationReport = classify(&claim, &sheet, &histories).unwrap();
        assert!(matches!(
            report.findings[0],
            DriftFinding::UnrecordedMapping { .. }
        ));
    }

    #[test]
    fn test_unknown_version_pair_is_drift() {
        let (sheet, id, histories) = fixture();
        // Sequence 1 exists but this hash was never recorded for it.
        let claim: LocalSnapshot = snapshot(
            &sheet,
            vec![SnapshotEntry::tracked(
                path("assets/rock.png"),
                id,
                1,
                hash(b"locally-edited"),
            )],
        );

        let report: ValidationReport = classify(&claim, &sheet, &histories).unwrap();
        assert!(matches!(
            report.findings[0],
            DriftFinding::UnknownVersion { version: 1, .. }
        ));
    }

    #[test]
    fn test_untracked_claim_at_mapped_path_is_drift() {
        let (sheet, _, histories) = fixture();
        let claim: LocalSnapshot = snapshot(
            &sheet,
            vec![SnapshotEntry::untracked(path("assets/rock.png"))],
        );

        let report: ValidationReport = classify(&claim, &sheet, &histories).unwrap();
        assert!(matches!(
            report.findings[0],
            DriftFinding::UntrackedCollision { .. }
        ));
    }

    #[test]
    fn test_missing_history_is_drift() {
        let (sheet, id, _) = fixture();
        let empty: HashMap<VirtualFileId, VersionHistory> = HashMap::new();
        let claim: LocalSnapshot = snapshot(
            &sheet,
            vec![SnapshotEntry::tracked(
                path("assets/rock.png"),
                id,
                2,
                hash(b"v2"),
            )],
        );

        let report: ValidationReport = classify(&claim, &sheet, &empty).unwrap();
        assert!(matches!(
            report.findings[0],
            DriftFinding::UnknownVersion { .. }
        ));
    }

    // ==================== Malformed snapshots ====================

    #[test]
    fn test_malformed_snapshot_is_an_error_not_a_verdict() {
        let (sheet, id, histories) = fixture();
        let mut entry: SnapshotEntry =
            SnapshotEntry::tracked(path("assets/rock.png"), id, 2, hash(b"v2"));
        entry.hash = None;
        let claim: LocalSnapshot = snapshot(&sheet, vec![entry]);

        let result = classify(&claim, &sheet, &histories);
        assert!(matches!(
            result,
            Err(SnapshotError::TrackedEntryMissingField { field: "hash", .. })
        ));
    }
}
