//! Durable trail of privileged operations.

use std::sync::Arc;

use tracing::info;

use asset_vault_model::AuditRecord;
use asset_vault_storage::MetaStore;

use crate::error::VaultError;

/// Append-only log of administrator overrides.
///
/// Privileged operations append a durable [`AuditRecord`] and emit the
/// same event on the `audit` tracing target, so overrides are visible
/// both live and after the fact.
pub struct AuditLog {
    meta: Arc<dyn MetaStore>,
}

impl AuditLog {
    pub fn new(meta: Arc<dyn MetaStore>) -> Self {
        AuditLog { meta }
    }

    /// Append one record.
    pub async fn record(&self, record: AuditRecord) -> Result<(), VaultError> {
        info!(
            target: "audit",
            "{:?} by '{}': {}",
            record.action,
            record.actor,
            record.detail
        );
        self.meta.append_audit(&record).await?;
        Ok(())
    }

    /// Full trail, oldest first.
    pub async fn trail(&self) -> Result<Vec<AuditRecord>, VaultError> {
        Ok(self.meta.load_audit().await?)
    }
}
