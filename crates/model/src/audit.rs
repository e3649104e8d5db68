//! Audit records for privileged operations.

use serde::{Deserialize, Serialize};

use crate::id::{MemberId, SheetName, VirtualFileId};
use crate::version::now_micros;

/// Privileged operations that must leave an audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ForceRelease,
    ApproveStagedMapping,
    DiscardStagedMapping,
    RegisterMember,
}

/// One entry in the vault's privileged-operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: AuditAction,
    /// Administrator who performed the operation.
    pub actor: MemberId,
    /// File the operation touched, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<VirtualFileId>,
    /// Sheet the operation touched, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<SheetName>,
    /// Human-readable context: previous holder, staged path, and so on.
    pub detail: String,
    /// Event time in microseconds since the Unix epoch.
    pub at: i64,
}

impl AuditRecord {
    pub fn new(action: AuditAction, actor: MemberId, detail: impl Into<String>) -> Self {
        AuditRecord {
            action,
            actor,
            file_id: None,
            sheet: None,
            detail: detail.into(),
            at: now_micros(),
        }
    }

    /// Attach the file the operation touched.
    pub fn with_file(mut self, id: VirtualFileId) -> Self {
        self.file_id = Some(id);
        self
    }

    /// Attach the sheet the operation touched.
    pub fn with_sheet(mut self, sheet: SheetName) -> Self {
        self.sheet = Some(sheet);
        self
    }
}
