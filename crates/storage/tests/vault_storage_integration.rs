//! Integration tests for the filesystem stores.
//!
//! These tests exercise a full persist/reopen cycle over a real temp
//! directory: everything written through one store instance must come
//! back identical through a fresh instance over the same root.

use asset_vault_model::{
    AuditAction, AuditRecord, FileRecord, HashAlgorithm, Member, MemberId, PendingTransfer, Role,
    Sheet, SheetName, SheetPath, VaultConfig, Version, VirtualFileId,
};
use asset_vault_storage::{BlobStore, FsBlobStore, FsMetaStore, MetaStore, VaultLayout};
use tempfile::TempDir;

fn member_id(text: &str) -> MemberId {
    MemberId::parse(text).unwrap()
}

fn sheet_name(text: &str) -> SheetName {
    SheetName::parse(text).unwrap()
}

fn path(text: &str) -> SheetPath {
    SheetPath::parse(text).unwrap()
}

fn version(sequence: u64, content: &[u8], author: &str) -> Version {
    Version {
        sequence,
        hash: HashAlgorithm::Xxh128.hash_bytes(content),
        description: format!("rev {sequence}"),
        created_at: 1_700_000_000_000_000 + sequence as i64,
        author: member_id(author),
    }
}

// ============================================================================
// Reopen Cycle Tests
// ============================================================================

#[tokio::test]
async fn test_full_vault_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let layout = VaultLayout::new(dir.path());

    // Populate through one store instance.
    let store = FsMetaStore::open(layout.clone()).await.unwrap();

    let config = VaultConfig::new("game-project").with_administrator(member_id("root"));
    store.put_config(&config).await.unwrap();

    let mut record = FileRecord::new(VirtualFileId::generate(), version(1, b"v1", "alice")).unwrap();
    record.append_version(version(2, b"v2", "alice")).unwrap();
    record.set_holder(None);
    store.put_file(&record).await.unwrap();

    let mut sheet = Sheet::member(sheet_name("alice-main"), member_id("alice"));
    sheet.insert(path("assets/rock.png"), record.id()).unwrap();
    store.put_sheet(&sheet).await.unwrap();

    let member = Member::new(member_id("alice")).with_display_name("Alice");
    let admin = Member::new(member_id("root")).with_role(Role::Administrator);
    store.put_member(&member).await.unwrap();
    store.put_member(&admin).await.unwrap();

    let transfer = PendingTransfer::propose(
        sheet_name("alice-main"),
        sheet_name("reference"),
        record.id(),
        path("shared/rock.png"),
        member_id("alice"),
        "final pass",
    );
    store.put_transfer(&transfer).await.unwrap();

    let audit = AuditRecord::new(AuditAction::RegisterMember, member_id("root"), "registered 'alice'");
    store.append_audit(&audit).await.unwrap();

    // Reload through a fresh instance over the same root.
    let reopened = FsMetaStore::open(layout).await.unwrap();

    assert_eq!(reopened.load_config().await.unwrap(), Some(config));
    assert_eq!(reopened.load_files().await.unwrap(), vec![record]);
    assert_eq!(reopened.load_sheets().await.unwrap(), vec![sheet]);
    assert_eq!(
        reopened.load_members().await.unwrap(),
        vec![member, admin]
    );
    assert_eq!(reopened.load_transfers().await.unwrap(), vec![transfer]);
    assert_eq!(reopened.load_audit().await.unwrap(), vec![audit]);
}

#[tokio::test]
async fn test_sheet_updates_overwrite_in_place() {
    let dir = TempDir::new().unwrap();
    let layout = VaultLayout::new(dir.path());
    let store = FsMetaStore::open(layout.clone()).await.unwrap();

    let mut sheet = Sheet::member(sheet_name("bob-main"), member_id("bob"));
    store.put_sheet(&sheet).await.unwrap();

    sheet.insert(path("props/crate.fbx"), VirtualFileId::generate()).unwrap();
    store.put_sheet(&sheet).await.unwrap();

    let loaded = store.load_sheets().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].revision(), 1);
    assert_eq!(loaded[0].len(), 1);
}

#[tokio::test]
async fn test_file_records_survive_holder_changes() {
    let dir = TempDir::new().unwrap();
    let layout = VaultLayout::new(dir.path());
    let store = FsMetaStore::open(layout.clone()).await.unwrap();

    let mut record = FileRecord::new(VirtualFileId::generate(), version(1, b"v1", "alice")).unwrap();
    store.put_file(&record).await.unwrap();

    // Release, then hand to another member.
    record.set_holder(None);
    store.put_file(&record).await.unwrap();
    record.set_holder(Some(member_id("bob")));
    store.put_file(&record).await.unwrap();

    let loaded = store.load_files().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(loaded[0].is_held_by(&member_id("bob")));
}

// ============================================================================
// Blob and Metadata Interplay
// ============================================================================

#[tokio::test]
async fn test_version_hash_addresses_stored_blob() {
    let dir = TempDir::new().unwrap();
    let layout = VaultLayout::new(dir.path());
    let meta = FsMetaStore::open(layout.clone()).await.unwrap();
    let blobs = FsBlobStore::new(layout, HashAlgorithm::Xxh128);

    let content: &[u8] = b"rock texture, 4k";
    let hash = blobs.algorithm().hash_bytes(content);
    blobs.put(&hash, content).await.unwrap();

    let record = FileRecord::new(VirtualFileId::generate(), version(1, content, "alice")).unwrap();
    meta.put_file(&record).await.unwrap();

    // A reloaded record's current hash must fetch the original bytes.
    let loaded = meta.load_files().await.unwrap();
    let fetched = blobs.get(&loaded[0].current_version().hash).await.unwrap();
    assert_eq!(fetched, content);
}
