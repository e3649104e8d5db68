//! The vault facade.
//!
//! One object tying the registry, holder locks, sheets, transfers and
//! the member directory together behind the visibility rules. Frontends
//! authenticate a member, build an [`Actor`] via [`Vault::actor`] and
//! call operations with it; the facade decides what that actor may see
//! and touch.
//!
//! Visibility is sheet-derived: a member sees a file if one of their own
//! sheets or the reference sheet maps it. Operations on files outside an
//! actor's view fail with [`VaultError::FileNotFound`], indistinguishable
//! from files that do not exist.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use asset_vault_model::{
    Actor, AuditRecord, FileRecord, LocalSnapshot, Member, MemberId, PendingTransfer, Role, Sheet,
    SheetError, SheetName, SheetPath, TransferId, VaultConfig, Version, VersionHistory, VersionSeq,
    VirtualFileId,
};
use asset_vault_storage::{
    BlobStore, FsBlobStore, FsMetaStore, MemoryBlobStore, MemoryMetaStore, MetaStore, VaultLayout,
};

use crate::audit::AuditLog;
use crate::error::VaultError;
use crate::locks::{FinalCommit, HoldState, HolderLockManager, VersionClaim};
use crate::members::MemberDirectory;
use crate::registry::FileRegistry;
use crate::sheets::{actor_sees_sheet, check_sheet_write, SheetStore};
use crate::transfer::TransferQueue;
use crate::validate::{classify, ValidationReport};

/// A running vault over its stores.
pub struct Vault {
    config: VaultConfig,
    registry: Arc<FileRegistry>,
    locks: HolderLockManager,
    sheets: Arc<SheetStore>,
    transfers: TransferQueue,
    members: MemberDirectory,
    audit: Arc<AuditLog>,
}

impl Vault {
    /// Open a vault over a data directory.
    ///
    /// First use writes `default_config` and creates the directory
    /// skeleton; later opens reload all durable state and ignore the
    /// default.
    pub async fn open(
        root: impl AsRef<Path>,
        default_config: VaultConfig,
    ) -> Result<Self, VaultError> {
        let layout: VaultLayout = VaultLayout::new(root.as_ref());
        let meta: Arc<dyn MetaStore> = Arc::new(FsMetaStore::open(layout.clone()).await?);
        let config: VaultConfig = load_or_init_config(meta.as_ref(), default_config).await?;
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(layout, config.hash_algorithm));
        Vault::assemble(config, blobs, meta).await
    }

    /// Vault over in-memory stores, for tests and experiments.
    pub async fn in_memory(config: VaultConfig) -> Result<Self, VaultError> {
        let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new(config.hash_algorithm));
        let meta: Arc<dyn MetaStore> = Arc::new(MemoryMetaStore::new());
        meta.put_config(&config).await?;
        Vault::assemble(config, blobs, meta).await
    }

    /// Vault over caller-provided stores.
    ///
    /// Loads the stored configuration, or writes `default_config` on
    /// first use.
    pub async fn with_stores(
        default_config: VaultConfig,
        blobs: Arc<dyn BlobStore>,
        meta: Arc<dyn MetaStore>,
    ) -> Result<Self, VaultError> {
        let config: VaultConfig = load_or_init_config(meta.as_ref(), default_config).await?;
        if blobs.algorithm() != config.hash_algorithm {
            warn!(
                "Blob store hashes with {} but the configuration says {}",
                blobs.algorithm(),
                config.hash_algorithm
            );
        }
        Vault::assemble(config, blobs, meta).await
    }

    async fn assemble(
        config: VaultConfig,
        blobs: Arc<dyn BlobStore>,
        meta: Arc<dyn MetaStore>,
    ) -> Result<Self, VaultError> {
        let audit: Arc<AuditLog> = Arc::new(AuditLog::new(Arc::clone(&meta)));

        let registry: Arc<FileRegistry> = Arc::new(FileRegistry::new(blobs, Arc::clone(&meta)));
        registry.preload(meta.load_files().await?);

        let sheets: Arc<SheetStore> = Arc::new(SheetStore::new(
            Arc::clone(&meta),
            Arc::clone(&audit),
            config.reference_sheet.clone(),
        ));
        sheets.preload(meta.load_sheets().await?);
        sheets.ensure_reference().await?;

        let members: MemberDirectory = MemberDirectory::new(Arc::clone(&meta), Arc::clone(&audit));
        members.preload(meta.load_members().await?);
        for admin in &config.administrators {
            members.ensure_admin(admin).await?;
        }

        let transfers: TransferQueue = TransferQueue::new(Arc::clone(&sheets), Arc::clone(&meta));
        let pending: Vec<PendingTransfer> = meta.load_transfers().await?;
        let pending_count: usize = pending.len();
        transfers.preload(pending).await;

        let locks: HolderLockManager =
            HolderLockManager::new(Arc::clone(&registry), Arc::clone(&audit));

        info!(
            "Opened vault '{}': {} files, {} sheets, {} members, {} pending transfers",
            config.name,
            registry.len(),
            sheets.len(),
            members.len(),
            pending_count
        );
        Ok(Vault {
            config,
            registry,
            locks,
            sheets,
            transfers,
            members,
            audit,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Build the acting identity for a registered member.
    ///
    /// Roles come from the member record plus the configured
    /// administrator list.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::MemberNotFound`] for unknown ids.
    pub fn actor(&self, id: &MemberId) -> Result<Actor, VaultError> {
        let member: Member = self.members.get(id)?;
        let mut actor: Actor = Actor::of(&member);
        if self.config.is_administrator(id) {
            actor = actor.with_role(Role::Administrator);
        }
        Ok(actor)
    }

    // ==================== Files ====================

    /// Register a brand-new file: version 1 plus a sheet mapping in one
    /// step.
    ///
    /// The author ends up holding the new file, so the first edit can
    /// continue without a separate acquire. Non-administrators cannot
    /// register into the reference sheet; they register into their own
    /// sheet and export.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::DuplicateMapping`] if the path is taken in
    /// the sheet and [`VaultError::PermissionDenied`] if the actor may
    /// not write to it.
    pub async fn register(
        &self,
        actor: &Actor,
        sheet: &SheetName,
        path: SheetPath,
        content: &[u8],
        description: &str,
    ) -> Result<(VirtualFileId, Version), VaultError> {
        // Precheck before creating the record, so the common collision
        // and permission failures leave nothing to undo.
        let current: Sheet = self.sheets.snapshot(sheet).await?;
        check_sheet_write(actor, &current, "register a file")?;
        if current.resolve(&path).is_some() {
            return Err(VaultError::DuplicateMapping {
                sheet: sheet.clone(),
                path,
            });
        }

        let record: FileRecord = self
            .registry
            .create(actor.id(), content, description)
            .await?;
        let id: VirtualFileId = record.id();
        if let Err(error) = self
            .sheets
            .insert_direct(actor, sheet, path.clone(), id, "register a file")
            .await
        {
            // The record never became visible; drop it again.
            if let Err(cleanup) = self.registry.discard(id).await {
                warn!(
                    "Failed to discard record {} after failed registration: {}",
                    id, cleanup
                );
            }
            return Err(register_error(error));
        }

        let version: Version = record.current_version().clone();
        info!("Registered file {} at '{}' in sheet '{}'", id, path, sheet);
        Ok((id, version))
    }

    /// The file's registry record: holder, history, identity.
    pub async fn lookup(&self, actor: &Actor, id: VirtualFileId) -> Result<FileRecord, VaultError> {
        self.ensure_visible(actor, id).await?;
        self.registry
            .snapshot(id)
            .await
            .ok_or(VaultError::FileNotFound(id))
    }

    /// Full version history of a file.
    pub async fn history(
        &self,
        actor: &Actor,
        id: VirtualFileId,
    ) -> Result<VersionHistory, VaultError> {
        let record: FileRecord = self.lookup(actor, id).await?;
        Ok(record.history().clone())
    }

    /// Payload bytes of the given (default: current) version.
    pub async fn fetch(
        &self,
        actor: &Actor,
        id: VirtualFileId,
        sequence: Option<VersionSeq>,
    ) -> Result<Vec<u8>, VaultError> {
        self.ensure_visible(actor, id).await?;
        self.registry.fetch(id, sequence).await
    }

    /// Publish a new version of a held file.
    ///
    /// No visibility gate: holding the file is the stronger condition,
    /// and the holder keeps it even if every mapping is removed mid-hold.
    pub async fn commit(
        &self,
        actor: &Actor,
        id: VirtualFileId,
        content: &[u8],
        description: &str,
    ) -> Result<Version, VaultError> {
        self.registry.commit(id, actor.id(), content, description).await
    }

    /// Publish an old version's content as a brand-new version.
    pub async fn restore(
        &self,
        actor: &Actor,
        id: VirtualFileId,
        sequence: VersionSeq,
        description: &str,
    ) -> Result<Version, VaultError> {
        self.registry
            .restore(id, actor.id(), sequence, description)
            .await
    }

    // ==================== Holds ====================

    /// Take the write hold on a file.
    pub async fn acquire(
        &self,
        actor: &Actor,
        id: VirtualFileId,
        claim: &VersionClaim,
    ) -> Result<HoldState, VaultError> {
        self.ensure_visible(actor, id).await?;
        self.locks.acquire(actor, id, claim).await
    }

    /// Give the hold back, optionally publishing one last version.
    pub async fn release(
        &self,
        actor: &Actor,
        id: VirtualFileId,
        final_commit: Option<FinalCommit>,
    ) -> Result<Option<Version>, VaultError> {
        self.locks.release(actor, id, final_commit).await
    }

    /// Administrator override: clear another member's hold.
    pub async fn force_release(&self, actor: &Actor, id: VirtualFileId) -> Result<(), VaultError> {
        self.locks.force_release(actor, id).await
    }

    // ==================== Sheets ====================

    /// Create an empty member sheet owned by the actor.
    pub async fn create_sheet(&self, actor: &Actor, name: SheetName) -> Result<Sheet, VaultError> {
        self.sheets.create_sheet(actor, name).await
    }

    /// A sheet's current contents.
    ///
    /// Sheets outside the actor's view report
    /// [`VaultError::SheetNotFound`], indistinguishable from sheets that
    /// do not exist.
    pub async fn sheet(&self, actor: &Actor, name: &SheetName) -> Result<Sheet, VaultError> {
        let sheet: Sheet = self.sheets.snapshot(name).await?;
        if !actor_sees_sheet(actor, &sheet) {
            return Err(VaultError::SheetNotFound(name.clone()));
        }
        Ok(sheet)
    }

    /// Names of the sheets the actor may look through, sorted.
    pub async fn sheet_names(&self, actor: &Actor) -> Vec<SheetName> {
        self.sheets.visible_names(actor).await
    }

    /// Map a path to a file the actor can see.
    pub async fn add_mapping(
        &self,
        actor: &Actor,
        sheet: &SheetName,
        path: SheetPath,
        id: VirtualFileId,
    ) -> Result<Sheet, VaultError> {
        if !self.registry.contains(id) {
            return Err(VaultError::FileNotFound(id));
        }
        self.ensure_visible(actor, id).await?;
        self.sheets.add_mapping(actor, sheet, path, id).await
    }

    /// Move a mapping to a new path within its sheet.
    pub async fn move_mapping(
        &self,
        actor: &Actor,
        sheet: &SheetName,
        path: &SheetPath,
        new_path: SheetPath,
    ) -> Result<Sheet, VaultError> {
        self.sheets.move_mapping(actor, sheet, path, new_path).await
    }

    /// Remove a mapping. The file and its history are untouched.
    pub async fn unlink(
        &self,
        actor: &Actor,
        sheet: &SheetName,
        path: &SheetPath,
    ) -> Result<Sheet, VaultError> {
        self.sheets.unlink(actor, sheet, path).await
    }

    /// Resolve a path within a visible sheet to the mapped file id.
    pub async fn resolve(
        &self,
        actor: &Actor,
        sheet: &SheetName,
        path: &SheetPath,
    ) -> Result<VirtualFileId, VaultError> {
        let current: Sheet = self.sheet(actor, sheet).await?;
        current.resolve(path).ok_or_else(|| {
            SheetError::MappingNotFound {
                sheet: sheet.clone(),
                path: path.clone(),
            }
            .into()
        })
    }

    /// Promote a staged reference entry into the live mapping.
    pub async fn approve_staged(
        &self,
        actor: &Actor,
        path: &SheetPath,
    ) -> Result<Sheet, VaultError> {
        self.sheets.approve_staged(actor, path).await
    }

    /// Drop a staged reference entry without promoting it.
    pub async fn discard_staged(
        &self,
        actor: &Actor,
        path: &SheetPath,
    ) -> Result<Sheet, VaultError> {
        self.sheets.discard_staged(actor, path).await
    }

    // ==================== Transfers ====================

    /// Offer a mapping entry from `source` to `target`.
    pub async fn export(
        &self,
        actor: &Actor,
        source: &SheetName,
        id: VirtualFileId,
        target: &SheetName,
        proposed_path: SheetPath,
        note: impl Into<String>,
    ) -> Result<PendingTransfer, VaultError> {
        self.transfers
            .export(actor, source, id, target, proposed_path, note)
            .await
    }

    /// Pending transfers waiting on a sheet, oldest first.
    pub async fn pending_transfers(
        &self,
        actor: &Actor,
        sheet: &SheetName,
    ) -> Result<Vec<PendingTransfer>, VaultError> {
        self.transfers.list_pending(actor, sheet).await
    }

    /// Accept a transfer, adding its mapping to the target sheet.
    pub async fn accept_transfer(
        &self,
        actor: &Actor,
        sheet: &SheetName,
        id: TransferId,
    ) -> Result<(Sheet, PendingTransfer), VaultError> {
        self.transfers.accept(actor, sheet, id).await
    }

    /// Reject a transfer, leaving the target sheet untouched.
    pub async fn reject_transfer(
        &self,
        actor: &Actor,
        sheet: &SheetName,
        id: TransferId,
    ) -> Result<PendingTransfer, VaultError> {
        self.transfers.reject(actor, sheet, id).await
    }

    // ==================== Members ====================

    /// Register a new member. Administrator-only, audit-logged.
    pub async fn register_member(
        &self,
        actor: &Actor,
        member: Member,
    ) -> Result<Member, VaultError> {
        self.members.register(actor, member).await
    }

    /// Look a member up. The directory is not secret; transfers and
    /// audit records name members, so every member may resolve ids.
    pub fn member(&self, id: &MemberId) -> Result<Member, VaultError> {
        self.members.get(id)
    }

    /// All members, sorted by id.
    pub fn members(&self) -> Vec<Member> {
        self.members.list()
    }

    // ==================== Validation ====================

    /// Validate a client snapshot against the recorded sheet.
    ///
    /// Sorts every snapshot path into fresh, stale, untracked or missing.
    /// Any structural contradiction fails the whole check instead; the
    /// error carries every finding so the client can reconcile in one
    /// pass. Nothing is mutated either way.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StructuralDrift`] when the snapshot
    /// contradicts the recorded structure, and a snapshot error if the
    /// claim itself is malformed.
    pub async fn validate(
        &self,
        actor: &Actor,
        snapshot: &LocalSnapshot,
    ) -> Result<ValidationReport, VaultError> {
        let sheet: Sheet = self.sheet(actor, &snapshot.sheet).await?;

        let mut histories: HashMap<VirtualFileId, VersionHistory> =
            HashMap::with_capacity(sheet.len());
        for (_, id) in sheet.entries() {
            if let Some(record) = self.registry.snapshot(id).await {
                histories.insert(id, record.history().clone());
            }
        }

        let report: ValidationReport = classify(snapshot, &sheet, &histories)?;
        if report.has_drift() {
            warn!(
                "Snapshot of sheet '{}' by '{}' drifted: {} finding(s)",
                snapshot.sheet,
                actor.id(),
                report.findings.len()
            );
            return Err(VaultError::StructuralDrift {
                sheet: snapshot.sheet.clone(),
                findings: report.findings,
            });
        }

        debug!(
            "Snapshot of sheet '{}' by '{}': {} fresh, {} stale, {} untracked, {} missing",
            snapshot.sheet,
            actor.id(),
            report.fresh.len(),
            report.stale.len(),
            report.untracked.len(),
            report.missing.len()
        );
        Ok(report)
    }

    // ==================== Audit ====================

    /// The privileged-operation trail, oldest first. Administrator-only.
    pub async fn audit_trail(&self, actor: &Actor) -> Result<Vec<AuditRecord>, VaultError> {
        if !actor.is_admin() {
            warn!("Member '{}' denied: read the audit log", actor.id());
            return Err(VaultError::PermissionDenied {
                member: actor.id().clone(),
                action: "read the audit log".to_string(),
            });
        }
        self.audit.trail().await
    }

    /// Fail with [`VaultError::FileNotFound`] unless the actor sees the
    /// file through some visible sheet. Hides existence of files outside
    /// the actor's view.
    async fn ensure_visible(&self, actor: &Actor, id: VirtualFileId) -> Result<(), VaultError> {
        if self.sheets.member_can_see(actor, id).await {
            return Ok(());
        }
        Err(VaultError::FileNotFound(id))
    }
}

async fn load_or_init_config(
    meta: &dyn MetaStore,
    default_config: VaultConfig,
) -> Result<VaultConfig, VaultError> {
    match meta.load_config().await? {
        Some(config) => Ok(config),
        None => {
            meta.put_config(&default_config).await?;
            info!(
                "Initialized vault '{}' ({})",
                default_config.name, default_config.uuid
            );
            Ok(default_config)
        }
    }
}

/// A mapping collision during registration means the path was taken.
fn register_error(error: VaultError) -> VaultError {
    match error {
        VaultError::Sheet(SheetError::PathAlreadyMapped { sheet, path }) => {
            VaultError::DuplicateMapping { sheet, path }
        }
        other => other,
    }
}
