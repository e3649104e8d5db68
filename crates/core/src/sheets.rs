//! Sheet store: named path projections and the reference staging flow.
//!
//! Sheets live in a concurrent arena keyed by name, each behind its own
//! async lock, so mutations serialize per sheet and never touch file
//! locks. Member sheets are writable by their owner only. The reference
//! sheet is writable by administrators; any other member may propose an
//! entry, which lands in the staging area until an administrator
//! approves or discards it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use asset_vault_model::{
    now_micros, Actor, AuditAction, AuditRecord, Sheet, SheetError, SheetName, SheetPath,
    StagedMapping, VirtualFileId,
};
use asset_vault_storage::MetaStore;

use crate::audit::AuditLog;
use crate::error::VaultError;

/// Concurrent arena of sheets plus the store behind them.
pub struct SheetStore {
    sheets: DashMap<SheetName, Arc<RwLock<Sheet>>>,
    meta: Arc<dyn MetaStore>,
    audit: Arc<AuditLog>,
    reference_name: SheetName,
    /// Serializes creation so the name check and the insert are atomic.
    create_lock: Mutex<()>,
}

impl SheetStore {
    pub fn new(meta: Arc<dyn MetaStore>, audit: Arc<AuditLog>, reference_name: SheetName) -> Self {
        SheetStore {
            sheets: DashMap::new(),
            meta,
            audit,
            reference_name,
            create_lock: Mutex::new(()),
        }
    }

    /// Fill the arena from loaded sheets. Called once while opening.
    pub fn preload(&self, sheets: Vec<Sheet>) {
        for sheet in sheets {
            self.sheets
                .insert(sheet.name().clone(), Arc::new(RwLock::new(sheet)));
        }
    }

    /// Create the reference sheet if this vault does not have one yet.
    pub async fn ensure_reference(&self) -> Result<(), VaultError> {
        let _guard = self.create_lock.lock().await;
        if self.sheets.contains_key(&self.reference_name) {
            return Ok(());
        }
        let sheet: Sheet = Sheet::reference(self.reference_name.clone());
        self.meta.put_sheet(&sheet).await?;
        self.sheets
            .insert(self.reference_name.clone(), Arc::new(RwLock::new(sheet)));
        info!("Created reference sheet '{}'", self.reference_name);
        Ok(())
    }

    pub fn reference_name(&self) -> &SheetName {
        &self.reference_name
    }

    /// Number of sheets.
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Per-sheet critical section handle.
    pub fn handle(&self, name: &SheetName) -> Result<Arc<RwLock<Sheet>>, VaultError> {
        self.sheets
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| VaultError::SheetNotFound(name.clone()))
    }

    /// Consistent copy of a sheet.
    pub async fn snapshot(&self, name: &SheetName) -> Result<Sheet, VaultError> {
        let handle: Arc<RwLock<Sheet>> = self.handle(name)?;
        let guard = handle.read().await;
        Ok(guard.clone())
    }

    /// Names of the sheets the actor may look through, sorted.
    pub async fn visible_names(&self, actor: &Actor) -> Vec<SheetName> {
        let handles: Vec<Arc<RwLock<Sheet>>> = self
            .sheets
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut names: Vec<SheetName> = Vec::new();
        for handle in handles {
            let guard = handle.read().await;
            if actor_sees_sheet(actor, &guard) {
                names.push(guard.name().clone());
            }
        }
        names.sort();
        names
    }

    /// Whether the actor can see the file through any sheet visible to
    /// them. Administrators see everything.
    pub async fn member_can_see(&self, actor: &Actor, id: VirtualFileId) -> bool {
        if actor.is_admin() {
            return true;
        }
        let handles: Vec<Arc<RwLock<Sheet>>> = self
            .sheets
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for handle in handles {
            let guard = handle.read().await;
            if actor_sees_sheet(actor, &guard) && guard.contains_id(id) {
                return true;
            }
        }
        false
    }

    /// Create an empty member sheet owned by the actor.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::SheetExists`] if the name is taken; the
    /// reference sheet's name is always taken.
    pub async fn create_sheet(&self, actor: &Actor, name: SheetName) -> Result<Sheet, VaultError> {
        if name == self.reference_name {
            return Err(VaultError::SheetExists(name));
        }
        let _guard = self.create_lock.lock().await;
        if self.sheets.contains_key(&name) {
            return Err(VaultError::SheetExists(name));
        }

        let sheet: Sheet = Sheet::member(name.clone(), actor.id().clone());
        self.meta.put_sheet(&sheet).await?;
        self.sheets
            .insert(name.clone(), Arc::new(RwLock::new(sheet.clone())));
        info!("Created sheet '{}' owned by '{}'", name, actor.id());
        Ok(sheet)
    }

    /// Map a path to a file id.
    ///
    /// On member sheets this is owner-only and takes effect immediately.
    /// On the reference sheet an administrator's entry takes effect
    /// immediately, while any other member's entry lands in the staging
    /// area instead.
    ///
    /// # Errors
    ///
    /// Collisions surface as [`SheetError::PathAlreadyMapped`] or
    /// [`SheetError::IdAlreadyMapped`]; authority failures as
    /// [`VaultError::PermissionDenied`].
    pub async fn add_mapping(
        &self,
        actor: &Actor,
        name: &SheetName,
        path: SheetPath,
        id: VirtualFileId,
    ) -> Result<Sheet, VaultError> {
        let handle: Arc<RwLock<Sheet>> = self.handle(name)?;
        let mut guard = handle.write().await;

        if guard.is_reference() && !actor.is_admin() {
            let proposal: StagedMapping = StagedMapping {
                id,
                proposed_by: actor.id().clone(),
                proposed_at: now_micros(),
            };
            let mut updated: Sheet = guard.clone();
            updated.stage(path.clone(), proposal)?;
            self.meta.put_sheet(&updated).await?;
            *guard = updated;
            info!(
                "Staged '{}' -> {} in reference sheet, proposed by '{}'",
                path,
                id,
                actor.id()
            );
            return Ok(guard.clone());
        }

        check_sheet_write(actor, &guard, "add a mapping")?;
        self.insert_locked(&mut guard, path.clone(), id).await?;
        debug!("Mapped '{}' -> {} in sheet '{}'", path, id, name);
        Ok(guard.clone())
    }

    /// Map a path to a file id, never staging.
    ///
    /// Registration uses this: a brand-new file must end up visible to
    /// its author immediately, so the staging detour is not available
    /// and non-administrators cannot register into the reference sheet.
    pub async fn insert_direct(
        &self,
        actor: &Actor,
        name: &SheetName,
        path: SheetPath,
        id: VirtualFileId,
        action: &str,
    ) -> Result<Sheet, VaultError> {
        let handle: Arc<RwLock<Sheet>> = self.handle(name)?;
        let mut guard = handle.write().await;
        check_sheet_write(actor, &guard, action)?;
        self.insert_locked(&mut guard, path.clone(), id).await?;
        debug!("Mapped '{}' -> {} in sheet '{}'", path, id, name);
        Ok(guard.clone())
    }

    async fn insert_locked(
        &self,
        sheet: &mut Sheet,
        path: SheetPath,
        id: VirtualFileId,
    ) -> Result<(), VaultError> {
        let mut updated: Sheet = sheet.clone();
        updated.insert(path, id)?;
        self.meta.put_sheet(&updated).await?;
        *sheet = updated;
        Ok(())
    }

    /// Move a mapping to a new path.
    pub async fn move_mapping(
        &self,
        actor: &Actor,
        name: &SheetName,
        path: &SheetPath,
        new_path: SheetPath,
    ) -> Result<Sheet, VaultError> {
        let handle: Arc<RwLock<Sheet>> = self.handle(name)?;
        let mut guard = handle.write().await;
        check_sheet_write(actor, &guard, "move a mapping")?;

        let mut updated: Sheet = guard.clone();
        updated.rename(path, new_path.clone())?;
        self.meta.put_sheet(&updated).await?;
        *guard = updated;
        debug!("Moved '{}' -> '{}' in sheet '{}'", path, new_path, name);
        Ok(guard.clone())
    }

    /// Remove a mapping. The file and its history are untouched.
    pub async fn unlink(
        &self,
        actor: &Actor,
        name: &SheetName,
        path: &SheetPath,
    ) -> Result<Sheet, VaultError> {
        let handle: Arc<RwLock<Sheet>> = self.handle(name)?;
        let mut guard = handle.write().await;
        check_sheet_write(actor, &guard, "remove a mapping")?;

        let mut updated: Sheet = guard.clone();
        let id: VirtualFileId = updated.remove(path)?;
        self.meta.put_sheet(&updated).await?;
        *guard = updated;
        debug!("Unlinked '{}' (was {}) from sheet '{}'", path, id, name);
        Ok(guard.clone())
    }

    /// Promote a staged reference entry into the live mapping.
    ///
    /// Administrator-only, audit-logged. On a collision the proposal
    /// stays staged.
    pub async fn approve_staged(
        &self,
        actor: &Actor,
        path: &SheetPath,
    ) -> Result<Sheet, VaultError> {
        self.resolve_staged(actor, path, true).await
    }

    /// Drop a staged reference entry without promoting it.
    ///
    /// Administrator-only, audit-logged.
    pub async fn discard_staged(
        &self,
        actor: &Actor,
        path: &SheetPath,
    ) -> Result<Sheet, VaultError> {
        self.resolve_staged(actor, path, false).await
    }

    async fn resolve_staged(
        &self,
        actor: &Actor,
        path: &SheetPath,
        promote: bool,
    ) -> Result<Sheet, VaultError> {
        if !actor.is_admin() {
            warn!(
                "Member '{}' denied: review staged entry '{}'",
                actor.id(),
                path
            );
            return Err(VaultError::PermissionDenied {
                member: actor.id().clone(),
                action: "review staged reference entries".to_string(),
            });
        }

        let handle: Arc<RwLock<Sheet>> = self.handle(&self.reference_name)?;
        let mut guard = handle.write().await;

        let mut updated: Sheet = guard.clone();
        let proposal: StagedMapping = updated
            .staged_proposal(path)
            .cloned()
            .ok_or_else(|| SheetError::NotStaged {
                sheet: updated.name().clone(),
                path: path.clone(),
            })?;
        let action: AuditAction = if promote {
            updated.approve_staged(path)?;
            AuditAction::ApproveStagedMapping
        } else {
            updated.discard_staged(path)?;
            AuditAction::DiscardStagedMapping
        };
        self.meta.put_sheet(&updated).await?;
        *guard = updated;
        let sheet: Sheet = guard.clone();
        drop(guard);

        let verb: &str = if promote { "promoted" } else { "discarded" };
        info!(
            "Staged entry '{}' {} by administrator '{}'",
            path,
            verb,
            actor.id()
        );
        self.audit
            .record(
                AuditRecord::new(
                    action,
                    actor.id().clone(),
                    format!("{verb} '{path}' proposed by '{}'", proposal.proposed_by),
                )
                .with_file(proposal.id)
                .with_sheet(self.reference_name.clone()),
            )
            .await?;
        Ok(sheet)
    }
}

/// Whether the actor may look through the sheet at all. Member sheets
/// are private to their owner; the reference sheet is visible to every
/// member; administrators see all sheets.
pub fn actor_sees_sheet(actor: &Actor, sheet: &Sheet) -> bool {
    sheet.is_reference() || sheet.owner() == Some(actor.id()) || actor.is_admin()
}

/// Reject mutations from anyone without write authority over the sheet:
/// the owner for member sheets, administrators for the reference sheet.
pub fn check_sheet_write(actor: &Actor, sheet: &Sheet, action: &str) -> Result<(), VaultError> {
    let allowed: bool = match sheet.owner() {
        Some(owner) => owner == actor.id(),
        None => actor.is_admin(),
    };
    if allowed {
        return Ok(());
    }
    warn!(
        "Member '{}' denied: {} in sheet '{}'",
        actor.id(),
        action,
        sheet.name()
    );
    Err(VaultError::PermissionDenied {
        member: actor.id().clone(),
        action: format!("{} in sheet '{}'", action, sheet.name()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset_vault_model::MemberId;
    use asset_vault_storage::MemoryMetaStore;

    struct Fixture {
        store: SheetStore,
        meta: Arc<MemoryMetaStore>,
    }

    async fn fixture() -> Fixture {
        let meta: Arc<MemoryMetaStore> = Arc::new(MemoryMetaStore::new());
        let audit: Arc<AuditLog> = Arc::new(AuditLog::new(Arc::clone(&meta) as Arc<dyn MetaStore>));
        let store: SheetStore = SheetStore::new(
            Arc::clone(&meta) as Arc<dyn MetaStore>,
            audit,
            SheetName::parse("reference").unwrap(),
        );
        store.ensure_reference().await.unwrap();
        Fixture { store, meta }
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

    // ==================== Creation ====================

    #[tokio::test]
    async fn test_create_sheet_rejects_taken_names() {
        let fixture: Fixture = fixture().await;
        let alice: Actor = actor("alice");

        fixture
            .store
            .create_sheet(&alice, name("alice-main"))
            .await
            .unwrap();

        let result = fixture.store.create_sheet(&alice, name("alice-main")).await;
        assert!(matches!(result, Err(VaultError::SheetExists(_))));

        // The reference name is always taken.
        let result = fixture.store.create_sheet(&alice, name("reference")).await;
        assert!(matches!(result, Err(VaultError::SheetExists(_))));
    }

    #[tokio::test]
    async fn test_ensure_reference_is_idempotent() {
        let fixture: Fixture = fixture().await;
        fixture.store.ensure_reference().await.unwrap();
        assert_eq!(fixture.store.len(), 1);
    }

    // ==================== Member sheet authority ====================

    #[tokio::test]
    async fn test_member_sheet_is_owner_only() {
        let fixture: Fixture = fixture().await;
        let alice: Actor = actor("alice");
        fixture
            .store
            .create_sheet(&alice, name("alice-main"))
            .await
            .unwrap();
        let id: VirtualFileId = VirtualFileId::generate();

        let sheet: Sheet = fixture
            .store
            .add_mapping(&alice, &name("alice-main"), path("rock.png"), id)
            .await
            .unwrap();
        assert_eq!(sheet.resolve(&path("rock.png")), Some(id));

        let result = fixture
            .store
            .add_mapping(&actor("bob"), &name("alice-main"), path("x.png"), id)
            .await;
        assert!(matches!(result, Err(VaultError::PermissionDenied { .. })));

        // Administrators do not get to edit member sheets either.
        let result = fixture
            .store
            .add_mapping(&admin("root"), &name("alice-main"), path("x.png"), id)
            .await;
        assert!(matches!(result, Err(VaultError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn test_move_and_unlink_update_the_mapping() {
        let fixture: Fixture = fixture().await;
        let alice: Actor = actor("alice");
        fixture
            .store
            .create_sheet(&alice, name("alice-main"))
            .await
            .unwrap();
        let id: VirtualFileId = VirtualFileId::generate();
        fixture
            .store
            .add_mapping(&alice, &name("alice-main"), path("old.png"), id)
            .await
            .unwrap();

        let sheet: Sheet = fixture
            .store
            .move_mapping(&alice, &name("alice-main"), &path("old.png"), path("new.png"))
            .await
            .unwrap();
        assert_eq!(sheet.resolve(&path("new.png")), Some(id));
        assert_eq!(sheet.resolve(&path("old.png")), None);

        let sheet: Sheet = fixture
            .store
            .unlink(&alice, &name("alice-main"), &path("new.png"))
            .await
            .unwrap();
        assert!(sheet.is_empty());

        // Mutations were written through.
        let stored: Vec<Sheet> = fixture.meta.load_sheets().await.unwrap();
        let stored_sheet: &Sheet = stored
            .iter()
            .find(|s| s.name() == &name("alice-main"))
            .unwrap();
        assert!(stored_sheet.is_empty());
        assert_eq!(stored_sheet.revision(), 3);
    }

    // ==================== Reference staging ====================

    #[tokio::test]
    async fn test_member_proposal_lands_in_staging() {
        let fixture: Fixture = fixture().await;
        let id: VirtualFileId = VirtualFileId::generate();

        let sheet: Sheet = fixture
            .store
            .add_mapping(&actor("bob"), &name("reference"), path("shared/rock.png"), id)
            .await
            .unwrap();

        assert_eq!(sheet.resolve(&path("shared/rock.png")), None);
        let proposal: &StagedMapping = sheet.staged_proposal(&path("shared/rock.png")).unwrap();
        assert_eq!(proposal.id, id);
        assert_eq!(proposal.proposed_by, MemberId::parse("bob").unwrap());
    }

    #[tokio::test]
    async fn test_admin_reference_mapping_is_immediate() {
        let fixture: Fixture = fixture().await;
        let id: VirtualFileId = VirtualFileId::generate();

        let sheet: Sheet = fixture
            .store
            .add_mapping(&admin("root"), &name("reference"), path("shared/rock.png"), id)
            .await
            .unwrap();

        assert_eq!(sheet.resolve(&path("shared/rock.png")), Some(id));
        assert!(sheet.staged_proposal(&path("shared/rock.png")).is_none());
    }

    #[tokio::test]
    async fn test_approve_staged_requires_admin() {
        let fixture: Fixture = fixture().await;
        let id: VirtualFileId = VirtualFileId::generate();
        fixture
            .store
            .add_mapping(&actor("bob"), &name("reference"), path("shared/rock.png"), id)
            .await
            .unwrap();

        let result = fixture
            .store
            .approve_staged(&actor("bob"), &path("shared/rock.png"))
            .await;
        assert!(matches!(result, Err(VaultError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn test_approve_promotes_and_audits() {
        let fixture: Fixture = fixture().await;
        let id: VirtualFileId = VirtualFileId::generate();
        fixture
            .store
            .add_mapping(&actor("bob"), &name("reference"), path("shared/rock.png"), id)
            .await
            .unwrap();

        let sheet: Sheet = fixture
            .store
            .approve_staged(&admin("root"), &path("shared/rock.png"))
            .await
            .unwrap();
        assert_eq!(sheet.resolve(&path("shared/rock.png")), Some(id));
        assert!(sheet.staged_proposal(&path("shared/rock.png")).is_none());

        let trail = fixture.meta.load_audit().await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, AuditAction::ApproveStagedMapping);
        assert_eq!(trail[0].file_id, Some(id));
        assert!(trail[0].detail.contains("bob"));
    }

    #[tokio::test]
    async fn test_discard_drops_the_proposal() {
        let fixture: Fixture = fixture().await;
        let id: VirtualFileId = VirtualFileId::generate();
        fixture
            .store
            .add_mapping(&actor("bob"), &name("reference"), path("shared/rock.png"), id)
            .await
            .unwrap();

        let sheet: Sheet = fixture
            .store
            .discard_staged(&admin("root"), &path("shared/rock.png"))
            .await
            .unwrap();
        assert!(sheet.staged_proposal(&path("shared/rock.png")).is_none());
        assert_eq!(sheet.resolve(&path("shared/rock.png")), None);

        let trail = fixture.meta.load_audit().await.unwrap();
        assert_eq!(trail[0].action, AuditAction::DiscardStagedMapping);

        // Reviewing it again has nothing to act on.
        let result = fixture
            .store
            .discard_staged(&admin("root"), &path("shared/rock.png"))
            .await;
        assert!(matches!(
            result,
            Err(VaultError::Sheet(SheetError::NotStaged { .. }))
        ));
    }

    // ==================== Visibility ====================

    #[tokio::test]
    async fn test_member_can_see_through_own_and_reference_sheets() {
        let fixture: Fixture = fixture().await;
        let alice: Actor = actor("alice");
        let bob: Actor = actor("bob");
        fixture
            .store
            .create_sheet(&alice, name("alice-main"))
            .await
            .unwrap();

        let private_id: VirtualFileId = VirtualFileId::generate();
        let shared_id: VirtualFileId = VirtualFileId::generate();
        fixture
            .store
            .add_mapping(&alice, &name("alice-main"), path("private.png"), private_id)
            .await
            .unwrap();
        fixture
            .store
            .add_mapping(&admin("root"), &name("reference"), path("shared.png"), shared_id)
            .await
            .unwrap();

        assert!(fixture.store.member_can_see(&alice, private_id).await);
        assert!(!fixture.store.member_can_see(&bob, private_id).await);
        assert!(fixture.store.member_can_see(&bob, shared_id).await);
        assert!(fixture.store.member_can_see(&admin("root"), private_id).await);
    }

    #[tokio::test]
    async fn test_visible_names_hide_other_members_sheets() {
        let fixture: Fixture = fixture().await;
        let alice: Actor = actor("alice");
        let bob: Actor = actor("bob");
        fixture
            .store
            .create_sheet(&alice, name("alice-main"))
            .await
            .unwrap();
        fixture
            .store
            .create_sheet(&bob, name("bob-main"))
            .await
            .unwrap();

        let names: Vec<SheetName> = fixture.store.visible_names(&bob).await;
        assert_eq!(names, vec![name("bob-main"), name("reference")]);

        let names: Vec<SheetName> = fixture.store.visible_names(&admin("root")).await;
        assert_eq!(
            names,
            vec![name("alice-main"), name("bob-main"), name("reference")]
        );
    }
}
