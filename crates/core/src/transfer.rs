//! Transfer queue: staged movement of mapping entries between sheets.
//!
//! An export offers one mapping entry to another sheet. The offer sits
//! in the target sheet's pending queue until the target's authority
//! accepts it (the mapping is added) or rejects it (the offer is
//! dropped). Neither outcome touches the source sheet, holder state or
//! file content.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use asset_vault_model::{
    Actor, PendingTransfer, Sheet, SheetName, SheetPath, TransferId, VirtualFileId,
};
use asset_vault_storage::MetaStore;

use crate::error::VaultError;
use crate::sheets::{actor_sees_sheet, check_sheet_write, SheetStore};

/// Per-target queues of pending transfers.
///
/// Lock order is queue first, then sheet: accept and reject hold the
/// target's queue across the sheet mutation so the queue entry and the
/// mapping resolve together.
pub struct TransferQueue {
    queues: DashMap<SheetName, Arc<Mutex<Vec<PendingTransfer>>>>,
    sheets: Arc<SheetStore>,
    meta: Arc<dyn MetaStore>,
}

impl TransferQueue {
    pub fn new(sheets: Arc<SheetStore>, meta: Arc<dyn MetaStore>) -> Self {
        TransferQueue {
            queues: DashMap::new(),
            sheets,
            meta,
        }
    }

    /// Fill the queues from loaded transfers. Called once while opening.
    pub async fn preload(&self, transfers: Vec<PendingTransfer>) {
        for transfer in transfers {
            let queue: Arc<Mutex<Vec<PendingTransfer>>> = self.queue(&transfer.target);
            queue.lock().await.push(transfer);
        }
    }

    fn queue(&self, target: &SheetName) -> Arc<Mutex<Vec<PendingTransfer>>> {
        Arc::clone(self.queues.entry(target.clone()).or_default().value())
    }

    /// Offer a mapping entry from `source` to `target`.
    ///
    /// The actor must see the file through `source`; nothing beyond
    /// visibility is required, so members can offer entries into sheets
    /// they cannot edit. The proposal waits in the target's queue.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotVisible`] if the source sheet is not
    /// visible to the actor or does not map the file, and
    /// [`VaultError::SheetNotFound`] if either sheet does not exist.
    pub async fn export(
        &self,
        actor: &Actor,
        source: &SheetName,
        id: VirtualFileId,
        target: &SheetName,
        proposed_path: SheetPath,
        note: impl Into<String>,
    ) -> Result<PendingTransfer, VaultError> {
        let source_sheet: Sheet = self.sheets.snapshot(source).await?;
        if !actor_sees_sheet(actor, &source_sheet) || !source_sheet.contains_id(id) {
            return Err(VaultError::NotVisible {
                id,
                sheet: source.clone(),
            });
        }
        self.sheets.handle(target)?;

        let transfer: PendingTransfer = PendingTransfer::propose(
            source.clone(),
            target.clone(),
            id,
            proposed_path,
            actor.id().clone(),
            note,
        );

        let queue: Arc<Mutex<Vec<PendingTransfer>>> = self.queue(target);
        let mut pending = queue.lock().await;
        self.meta.put_transfer(&transfer).await?;
        pending.push(transfer.clone());

        info!(
            "Exported {} from '{}' toward '{}' as transfer {}",
            id, source, target, transfer.id
        );
        Ok(transfer)
    }

    /// Pending transfers waiting on a sheet, oldest first.
    ///
    /// Only the sheet's authority gets to review its queue.
    pub async fn list_pending(
        &self,
        actor: &Actor,
        sheet: &SheetName,
    ) -> Result<Vec<PendingTransfer>, VaultError> {
        let snapshot: Sheet = self.sheets.snapshot(sheet).await?;
        check_sheet_write(actor, &snapshot, "review pending transfers")?;

        let queue: Arc<Mutex<Vec<PendingTransfer>>> = self.queue(sheet);
        let pending = queue.lock().await;
        Ok(pending.clone())
    }

    /// Resolve a transfer by adding its mapping to the target sheet.
    ///
    /// Returns the updated sheet and the resolved transfer.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::TransferNotFound`] if the target's queue
    /// has no such transfer and [`VaultError::PermissionDenied`] if the
    /// actor is not the target's authority. A mapping collision in the
    /// target sheet fails the accept and leaves the transfer pending.
    pub async fn accept(
        &self,
        actor: &Actor,
        target: &SheetName,
        id: TransferId,
    ) -> Result<(Sheet, PendingTransfer), VaultError> {
        let queue: Arc<Mutex<Vec<PendingTransfer>>> = self.queue(target);
        let mut pending = queue.lock().await;
        let index: usize = pending
            .iter()
            .position(|transfer| transfer.id == id)
            .ok_or(VaultError::TransferNotFound(id))?;

        let snapshot: Sheet = self.sheets.snapshot(target).await?;
        check_sheet_write(actor, &snapshot, "accept a transfer")?;

        // The actor holds target authority here, so this lands in the
        // live mapping rather than the reference staging area.
        let transfer: PendingTransfer = pending[index].clone();
        let sheet: Sheet = self
            .sheets
            .add_mapping(actor, target, transfer.proposed_path.clone(), transfer.file_id)
            .await?;

        let mut resolved: PendingTransfer = transfer;
        resolved.accept()?;
        self.meta.remove_transfer(target, resolved.id).await?;
        pending.remove(index);

        info!(
            "Accepted transfer {} into '{}' at '{}'",
            resolved.id, target, resolved.proposed_path
        );
        Ok((sheet, resolved))
    }

    /// Discard a transfer without touching the target sheet.
    pub async fn reject(
        &self,
        actor: &Actor,
        target: &SheetName,
        id: TransferId,
    ) -> Result<PendingTransfer, VaultError> {
        let queue: Arc<Mutex<Vec<PendingTransfer>>> = self.queue(target);
        let mut pending = queue.lock().await;
        let index: usize = pending
            .iter()
            .position(|transfer| transfer.id == id)
            .ok_or(VaultError::TransferNotFound(id))?;

        let snapshot: Sheet = self.sheets.snapshot(target).await?;
        check_sheet_write(actor, &snapshot, "reject a transfer")?;

        let mut resolved: PendingTransfer = pending[index].clone();
        resolved.reject()?;
        self.meta.remove_transfer(target, resolved.id).await?;
        pending.remove(index);

        info!("Rejected transfer {} toward '{}'", resolved.id, target);
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset_vault_model::{MemberId, SheetError, TransferState};
    use asset_vault_storage::MemoryMetaStore;

    use crate::audit::AuditLog;

    struct Fixture {
        sheets: Arc<SheetStore>,
        transfers: TransferQueue,
        meta: Arc<MemoryMetaStore>,
    }

    async fn fixture() -> Fixture {
        let meta: Arc<MemoryMetaStore> = Arc::new(MemoryMetaStore::new());
        let audit: Arc<AuditLog> = Arc::new(AuditLog::new(Arc::clone(&meta) as Arc<dyn MetaStore>));
        let sheets: Arc<SheetStore> = Arc::new(SheetStore::new(
            Arc::clone(&meta) as Arc<dyn MetaStore>,
            audit,
            name("reference"),
        ));
        sheets.ensure_reference().await.unwrap();
        sheets
            .create_sheet(&actor("alice"), name("alice-main"))
            .await
            .unwrap();
        sheets
            .create_sheet(&actor("bob"), name("bob-main"))
            .await
            .unwrap();

        let transfers: TransferQueue = TransferQueue::new(
            Arc::clone(&sheets),
            Arc::clone(&meta) as Arc<dyn MetaStore>,
        );
        Fixture {
            sheets,
            transfers,
            meta,
        }
    }

    fn actor(id: &str) -> Actor {
        Actor::member(MemberId::parse(id).unwrap())
    }

    fn admin(id: &str) -> Actor {
        Actor::admin(MemberId::parse(id).unwrap())
    }

    fn name(text: &str) -> SheetName {
        SheetName::parse(text).unwrap()
    }

    fn path(text: &str) -> SheetPath {
        SheetPath::parse(text).unwrap()
    }

    async fn mapped_file(fixture: &Fixture, owner: &Actor, sheet: &str, at: &str) -> VirtualFileId {
        let id: VirtualFileId = VirtualFileId::generate();
        fixture
            .sheets
            .add_mapping(owner, &name(sheet), path(at), id)
            .await
            .unwrap();
        id
    }

    // ==================== Export ====================

    #[tokio::test]
    async fn test_export_requires_visibility_through_source() {
        let fixture: Fixture = fixture().await;
        let id: VirtualFileId = mapped_file(&fixture, &actor("alice"), "alice-main", "rock.png").await;

        // Bob cannot see alice's sheet at all.
        let result = fixture
            .transfers
            .export(
                &actor("bob"),
                &name("alice-main"),
                id,
                &name("bob-main"),
                path("rock.png"),
                "",
            )
            .await;
        assert!(matches!(result, Err(VaultError::NotVisible { .. })));

        // Alice sees her sheet, but this id is not mapped there.
        let result = fixture
            .transfers
            .export(
                &actor("alice"),
                &name("alice-main"),
                VirtualFileId::generate(),
                &name("bob-main"),
                path("rock.png"),
                "",
            )
            .await;
        assert!(matches!(result, Err(VaultError::NotVisible { .. })));
    }

    #[tokio::test]
    async fn test_export_requires_existing_target() {
        let fixture: Fixture = fixture().await;
        let id: VirtualFileId = mapped_file(&fixture, &actor("alice"), "alice-main", "rock.png").await;

        let result = fixture
            .transfers
            .export(
                &actor("alice"),
                &name("alice-main"),
                id,
                &name("nowhere"),
                path("rock.png"),
                "",
            )
            .await;
        assert!(matches!(result, Err(VaultError::SheetNotFound(_))));
    }

    #[tokio::test]
    async fn test_export_queues_for_the_target_authority() {
        let fixture: Fixture = fixture().await;
        let id: VirtualFileId = mapped_file(&fixture, &actor("alice"), "alice-main", "rock.png").await;

        let transfer: PendingTransfer = fixture
            .transfers
            .export(
                &actor("alice"),
                &name("alice-main"),
                id,
                &name("bob-main"),
                path("from-alice/rock.png"),
                "final rock pass",
            )
            .await
            .unwrap();
        assert_eq!(transfer.state(), TransferState::Proposed);
        assert_eq!(transfer.note, "final rock pass");

        let pending: Vec<PendingTransfer> = fixture
            .transfers
            .list_pending(&actor("bob"), &name("bob-main"))
            .await
            .unwrap();
        assert_eq!(pending, vec![transfer.clone()]);

        // The proposal is durable.
        let stored: Vec<PendingTransfer> = fixture.meta.load_transfers().await.unwrap();
        assert_eq!(stored, vec![transfer]);
    }

    #[tokio::test]
    async fn test_list_pending_is_authority_only() {
        let fixture: Fixture = fixture().await;

        let result = fixture
            .transfers
            .list_pending(&actor("alice"), &name("bob-main"))
            .await;
        assert!(matches!(result, Err(VaultError::PermissionDenied { .. })));

        let result = fixture
            .transfers
            .list_pending(&actor("alice"), &name("reference"))
            .await;
        assert!(matches!(result, Err(VaultError::PermissionDenied { .. })));

        let pending: Vec<PendingTransfer> = fixture
            .transfers
            .list_pending(&admin("root"), &name("reference"))
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    // ==================== Accept ====================

    #[tokio::test]
    async fn test_accept_adds_mapping_and_retires_transfer() {
        let fixture: Fixture = fixture().await;
        let id: VirtualFileId = mapped_file(&fixture, &actor("alice"), "alice-main", "rock.png").await;
        let transfer: PendingTransfer = fixture
            .transfers
            .export(
                &actor("alice"),
                &name("alice-main"),
                id,
                &name("bob-main"),
                path("from-alice/rock.png"),
                "",
            )
            .await
            .unwrap();

        let (sheet, resolved) = fixture
            .transfers
            .accept(&actor("bob"), &name("bob-main"), transfer.id)
            .await
            .unwrap();
        assert_eq!(sheet.resolve(&path("from-alice/rock.png")), Some(id));
        assert_eq!(resolved.state(), TransferState::Accepted);

        let pending: Vec<PendingTransfer> = fixture
            .transfers
            .list_pending(&actor("bob"), &name("bob-main"))
            .await
            .unwrap();
        assert!(pending.is_empty());
        assert!(fixture.meta.load_transfers().await.unwrap().is_empty());

        // The source mapping is untouched.
        let source: Sheet = fixture.sheets.snapshot(&name("alice-main")).await.unwrap();
        assert_eq!(source.resolve(&path("rock.png")), Some(id));
    }

    #[tokio::test]
    async fn test_accept_requires_target_authority() {
        let fixture: Fixture = fixture().await;
        let id: VirtualFileId = mapped_file(&fixture, &actor("alice"), "alice-main", "rock.png").await;
        let transfer: PendingTransfer = fixture
            .transfers
            .export(
                &actor("alice"),
                &name("alice-main"),
                id,
                &name("bob-main"),
                path("rock.png"),
                "",
            )
            .await
            .unwrap();

        let result = fixture
            .transfers
            .accept(&actor("alice"), &name("bob-main"), transfer.id)
            .await;
        assert!(matches!(result, Err(VaultError::PermissionDenied { .. })));

        let pending: Vec<PendingTransfer> = fixture
            .transfers
            .list_pending(&actor("bob"), &name("bob-main"))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_accept_collision_keeps_transfer_pending() {
        let fixture: Fixture = fixture().await;
        let id: VirtualFileId = mapped_file(&fixture, &actor("alice"), "alice-main", "rock.png").await;
        mapped_file(&fixture, &actor("bob"), "bob-main", "rock.png").await;

        let transfer: PendingTransfer = fixture
            .transfers
            .export(
                &actor("alice"),
                &name("alice-main"),
                id,
                &name("bob-main"),
                path("rock.png"),
                "",
            )
            .await
            .unwrap();

        let result = fixture
            .transfers
            .accept(&actor("bob"), &name("bob-main"), transfer.id)
            .await;
        assert!(matches!(
            result,
            Err(VaultError::Sheet(SheetError::PathAlreadyMapped { .. }))
        ));

        // Still waiting, in memory and in the store.
        let pending: Vec<PendingTransfer> = fixture
            .transfers
            .list_pending(&actor("bob"), &name("bob-main"))
            .await
            .unwrap();
        assert_eq!(pending, vec![transfer]);
        assert_eq!(fixture.meta.load_transfers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_accept_unknown_transfer() {
        let fixture: Fixture = fixture().await;
        let result = fixture
            .transfers
            .accept(&actor("bob"), &name("bob-main"), TransferId::generate())
            .await;
        assert!(matches!(result, Err(VaultError::TransferNotFound(_))));
    }

    #[tokio::test]
    async fn test_reference_accept_is_admin_gated() {
        let fixture: Fixture = fixture().await;
        let id: VirtualFileId = mapped_file(&fixture, &actor("alice"), "alice-main", "rock.png").await;
        let transfer: PendingTransfer = fixture
            .transfers
            .export(
                &actor("alice"),
                &name("alice-main"),
                id,
                &name("reference"),
                path("shared/rock.png"),
                "",
            )
            .await
            .unwrap();

        let result = fixture
            .transfers
            .accept(&actor("alice"), &name("reference"), transfer.id)
            .await;
        assert!(matches!(result, Err(VaultError::PermissionDenied { .. })));

        let (sheet, _) = fixture
            .transfers
            .accept(&admin("root"), &name("reference"), transfer.id)
            .await
            .unwrap();
        assert_eq!(sheet.resolve(&path("shared/rock.png")), Some(id));
        assert!(sheet.staged_proposal(&path("shared/rock.png")).is_none());
    }

    // ==================== Reject ====================

    #[tokio::test]
    async fn test_reject_leaves_target_unchanged() {
        let fixture: Fixture = fixture().await;
        let id: VirtualFileId = mapped_file(&fixture, &actor("alice"), "alice-main", "rock.png").await;
        let transfer: PendingTransfer = fixture
            .transfers
            .export(
                &actor("alice"),
                &name("alice-main"),
                id,
                &name("bob-main"),
                path("rock.png"),
                "",
            )
            .await
            .unwrap();

        let resolved: PendingTransfer = fixture
            .transfers
            .reject(&actor("bob"), &name("bob-main"), transfer.id)
            .await
            .unwrap();
        assert_eq!(resolved.state(), TransferState::Rejected);

        let target: Sheet = fixture.sheets.snapshot(&name("bob-main")).await.unwrap();
        assert!(target.is_empty());
        assert!(fixture.meta.load_transfers().await.unwrap().is_empty());
        let pending: Vec<PendingTransfer> = fixture
            .transfers
            .list_pending(&actor("bob"), &name("bob-main"))
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_preload_restores_queues_by_target() {
        let fixture: Fixture = fixture().await;
        let id: VirtualFileId = mapped_file(&fixture, &actor("alice"), "alice-main", "rock.png").await;
        fixture
            .transfers
            .export(
                &actor("alice"),
                &name("alice-main"),
                id,
                &name("bob-main"),
                path("rock.png"),
                "",
            )
            .await
            .unwrap();

        // A second queue over the same store picks the proposal back up.
        let reloaded: TransferQueue = TransferQueue::new(
            Arc::clone(&fixture.sheets),
            Arc::clone(&fixture.meta) as Arc<dyn MetaStore>,
        );
        reloaded
            .preload(fixture.meta.load_transfers().await.unwrap())
            .await;

        let pending: Vec<PendingTransfer> = reloaded
            .list_pending(&actor("bob"), &name("bob-main"))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].file_id, id);
    }
}
