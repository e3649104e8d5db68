//! Durable metadata documents: registry records, sheets, members,
//! transfers and the audit log.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use asset_vault_model::{
    AuditRecord, FileRecord, Member, MemberId, PendingTransfer, Sheet, SheetName, TransferId,
    VaultConfig, VirtualFileId,
};

use crate::error::StoreError;
use crate::fsio;
use crate::layout::VaultLayout;

/// Store for the vault's metadata documents.
///
/// Documents are written whole. The vault core keeps the working set in
/// memory and writes through on every mutation, so load methods are only
/// called when a vault is opened.
#[async_trait]
pub trait MetaStore: Send + Sync {
    async fn load_config(&self) -> Result<Option<VaultConfig>, StoreError>;
    async fn put_config(&self, config: &VaultConfig) -> Result<(), StoreError>;

    async fn put_file(&self, record: &FileRecord) -> Result<(), StoreError>;
    /// Remove a registry record. Removing an absent record is a no-op.
    async fn remove_file(&self, id: VirtualFileId) -> Result<(), StoreError>;
    async fn load_files(&self) -> Result<Vec<FileRecord>, StoreError>;

    async fn put_sheet(&self, sheet: &Sheet) -> Result<(), StoreError>;
    async fn load_sheets(&self) -> Result<Vec<Sheet>, StoreError>;

    async fn put_member(&self, member: &Member) -> Result<(), StoreError>;
    async fn load_members(&self) -> Result<Vec<Member>, StoreError>;

    async fn put_transfer(&self, transfer: &PendingTransfer) -> Result<(), StoreError>;
    /// Remove a resolved transfer. Removing an absent transfer is a no-op.
    async fn remove_transfer(&self, target: &SheetName, id: TransferId) -> Result<(), StoreError>;
    async fn load_transfers(&self) -> Result<Vec<PendingTransfer>, StoreError>;

    /// Append one record to the audit log.
    async fn append_audit(&self, record: &AuditRecord) -> Result<(), StoreError>;
    async fn load_audit(&self) -> Result<Vec<AuditRecord>, StoreError>;
}

/// Filesystem-backed metadata store over a vault data directory.
#[derive(Debug)]
pub struct FsMetaStore {
    layout: VaultLayout,
}

impl FsMetaStore {
    /// Open a metadata store, creating the directory skeleton if needed.
    pub async fn open(layout: VaultLayout) -> Result<Self, StoreError> {
        for dir in [
            layout.root().to_path_buf(),
            layout.files_dir(),
            layout.sheets_dir(),
            layout.members_dir(),
            layout.transfers_dir(),
            layout.temp_dir(),
        ] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(FsMetaStore { layout })
    }

    pub fn layout(&self) -> &VaultLayout {
        &self.layout
    }
}

#[async_trait]
impl MetaStore for FsMetaStore {
    async fn load_config(&self) -> Result<Option<VaultConfig>, StoreError> {
        fsio::read_json(&self.layout.config_file()).await
    }

    async fn put_config(&self, config: &VaultConfig) -> Result<(), StoreError> {
        fsio::write_json(&self.layout.temp_dir(), &self.layout.config_file(), config).await
    }

    async fn put_file(&self, record: &FileRecord) -> Result<(), StoreError> {
        let path: PathBuf = self.layout.file_record(&record.id());
        fsio::write_json(&self.layout.temp_dir(), &path, record).await
    }

    async fn remove_file(&self, id: VirtualFileId) -> Result<(), StoreError> {
        let path: PathBuf = self.layout.file_record(&id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    async fn load_files(&self) -> Result<Vec<FileRecord>, StoreError> {
        fsio::read_json_tree(&self.layout.files_dir(), 2).await
    }

    async fn put_sheet(&self, sheet: &Sheet) -> Result<(), StoreError> {
        let path: PathBuf = self.layout.sheet_file(sheet.name());
        fsio::write_json(&self.layout.temp_dir(), &path, sheet).await
    }

    async fn load_sheets(&self) -> Result<Vec<Sheet>, StoreError> {
        fsio::read_json_tree(&self.layout.sheets_dir(), 0).await
    }

    async fn put_member(&self, member: &Member) -> Result<(), StoreError> {
        let path: PathBuf = self.layout.member_file(&member.id);
        fsio::write_json(&self.layout.temp_dir(), &path, member).await
    }

    async fn load_members(&self) -> Result<Vec<Member>, StoreError> {
        fsio::read_json_tree(&self.layout.members_dir(), 0).await
    }

    async fn put_transfer(&self, transfer: &PendingTransfer) -> Result<(), StoreError> {
        let path: PathBuf = self.layout.transfer_file(&transfer.target, transfer.id);
        fsio::write_json(&self.layout.temp_dir(), &path, transfer).await
    }

    async fn remove_transfer(&self, target: &SheetName, id: TransferId) -> Result<(), StoreError> {
        let path: PathBuf = self.layout.transfer_file(target, id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    async fn load_transfers(&self) -> Result<Vec<PendingTransfer>, StoreError> {
        fsio::read_json_tree(&self.layout.transfers_dir(), 1).await
    }

    async fn append_audit(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let path: PathBuf = self.layout.audit_log();
        let mut line: String = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.flush().await.map_err(|e| StoreError::io(&path, e))?;
        Ok(())
    }

    async fn load_audit(&self) -> Result<Vec<AuditRecord>, StoreError> {
        let path: PathBuf = self.layout.audit_log();
        let text: String = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let mut records: Vec<AuditRecord> = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let record: AuditRecord =
                serde_json::from_str(line).map_err(|e| StoreError::corrupt(&path, e))?;
            records.push(record);
        }
        Ok(records)
    }
}

/// In-memory metadata store for tests and experiments.
#[derive(Debug, Default)]
pub struct MemoryMetaStore {
    config: RwLock<Option<VaultConfig>>,
    files: RwLock<HashMap<VirtualFileId, FileRecord>>,
    sheets: RwLock<HashMap<SheetName, Sheet>>,
    members: RwLock<HashMap<MemberId, Member>>,
    transfers: RwLock<HashMap<TransferId, PendingTransfer>>,
    audit: RwLock<Vec<AuditRecord>>,
}

impl MemoryMetaStore {
    pub fn new() -> Self {
        MemoryMetaStore::default()
    }
}

#[async_trait]
impl MetaStore for MemoryMetaStore {
    async fn load_config(&self) -> Result<Option<VaultConfig>, StoreError> {
        Ok(self.config.read().clone())
    }

    async fn put_config(&self, config: &VaultConfig) -> Result<(), StoreError> {
        *self.config.write() = Some(config.clone());
        Ok(())
    }

    async fn put_file(&self, record: &FileRecord) -> Result<(), StoreError> {
        self.files.write().insert(record.id(), record.clone());
        Ok(())
    }

    async fn remove_file(&self, id: VirtualFileId) -> Result<(), StoreError> {
        self.files.write().remove(&id);
        Ok(())
    }

    async fn load_files(&self) -> Result<Vec<FileRecord>, StoreError> {
        let mut records: Vec<FileRecord> = self.files.read().values().cloned().collect();
        records.sort_by_key(|r| r.id());
        Ok(records)
    }

    async fn put_sheet(&self, sheet: &Sheet) -> Result<(), StoreError> {
        self.sheets.write().insert(sheet.name().clone(), sheet.clone());
        Ok(())
    }

    async fn load_sheets(&self) -> Result<Vec<Sheet>, StoreError> {
        let mut sheets: Vec<Sheet> = self.sheets.read().values().cloned().collect();
        sheets.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(sheets)
    }

    async fn put_member(&self, member: &Member) -> Result<(), StoreError> {
        self.members.write().insert(member.id.clone(), member.clone());
        Ok(())
    }

    async fn load_members(&self) -> Result<Vec<Member>, StoreError> {
        let mut members: Vec<Member> = self.members.read().values().cloned().collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(members)
    }

    async fn put_transfer(&self, transfer: &PendingTransfer) -> Result<(), StoreError> {
        self.transfers.write().insert(transfer.id, transfer.clone());
        Ok(())
    }

    async fn remove_transfer(&self, _target: &SheetName, id: TransferId) -> Result<(), StoreError> {
        self.transfers.write().remove(&id);
        Ok(())
    }

    async fn load_transfers(&self) -> Result<Vec<PendingTransfer>, StoreError> {
        let mut transfers: Vec<PendingTransfer> = self.transfers.read().values().cloned().collect();
        transfers.sort_by_key(|t| (t.created_at, t.id));
        Ok(transfers)
    }

    async fn append_audit(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.audit.write().push(record.clone());
        Ok(())
    }

    async fn load_audit(&self) -> Result<Vec<AuditRecord>, StoreError> {
        Ok(self.audit.read().clone())
    }
}
