//! Version records and per-file history.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::HistoryError;
use crate::hash::ContentHash;
use crate::id::MemberId;

/// Position of a version within one file's history. Starts at 1.
pub type VersionSeq = u64;

/// Immutable record of one published state of a virtual file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Position in the file's history, contiguous from 1.
    pub sequence: VersionSeq,
    /// Content hash of the referenced blob.
    pub hash: ContentHash,
    /// Free-text description supplied by the author.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Creation time in microseconds since the Unix epoch.
    pub created_at: i64,
    /// Member who published this version.
    pub author: MemberId,
}

/// Append-only history of a single virtual file.
///
/// Sequences are contiguous from 1 and the history is never empty, so
/// the current version is always defined. Both invariants are enforced
/// on construction, on append, and when deserializing persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Version>", into = "Vec<Version>")]
pub struct VersionHistory {
    versions: Vec<Version>,
}

impl VersionHistory {
    /// Start a history with its first version.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::FirstSequenceNotOne`] if the version does
    /// not carry sequence 1.
    pub fn new(first: Version) -> Result<Self, HistoryError> {
        if first.sequence != 1 {
            return Err(HistoryError::FirstSequenceNotOne {
                sequence: first.sequence,
            });
        }
        Ok(VersionHistory {
            versions: vec![first],
        })
    }

    /// Newest version.
    pub fn current(&self) -> &Version {
        self.versions.last().expect("history is never empty")
    }

    /// Look up a version by sequence number.
    pub fn get(&self, sequence: VersionSeq) -> Option<&Version> {
        if sequence == 0 {
            return None;
        }
        self.versions.get((sequence - 1) as usize)
    }

    /// Append the next version.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NonContiguousSequence`] if the sequence is
    /// not exactly one past the current version.
    pub fn append(&mut self, version: Version) -> Result<(), HistoryError> {
        let expected: VersionSeq = self.current().sequence + 1;
        if version.sequence != expected {
            return Err(HistoryError::NonContiguousSequence {
                expected,
                actual: version.sequence,
            });
        }
        self.versions.push(version);
        Ok(())
    }

    /// Sequence of the newest version.
    pub fn latest_sequence(&self) -> VersionSeq {
        self.current().sequence
    }

    /// Whether some recorded version carries this sequence and hash pair.
    pub fn has_version(&self, sequence: VersionSeq, hash: &ContentHash) -> bool {
        self.get(sequence).map(|v| &v.hash == hash).unwrap_or(false)
    }

    /// All versions, oldest first.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Version> {
        self.versions.iter()
    }
}

impl TryFrom<Vec<Version>> for VersionHistory {
    type Error = HistoryError;

    fn try_from(versions: Vec<Version>) -> Result<Self, Self::Error> {
        let first: &Version = versions.first().ok_or(HistoryError::EmptyHistory)?;
        if first.sequence != 1 {
            return Err(HistoryError::FirstSequenceNotOne {
                sequence: first.sequence,
            });
        }
        for (index, version) in versions.iter().enumerate() {
            let expected: VersionSeq = index as VersionSeq + 1;
            if version.sequence != expected {
                return Err(HistoryError::NonContiguousSequence {
                    expected,
                    actual: version.sequence,
                });
            }
        }
        Ok(VersionHistory { versions })
    }
}

impl From<VersionHistory> for Vec<Version> {
    fn from(history: VersionHistory) -> Self {
        history.versions
    }
}

/// Current time in microseconds since the Unix epoch.
pub fn now_micros() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_micros() as i64,
        Err(err) => -(err.duration().as_micros() as i64),
    }
}
