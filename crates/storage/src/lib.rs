//! Persistence layer for the asset vault.
//!
//! This crate owns everything that touches disk:
//!
//! - **Blob store** - Content-addressed payloads with idempotent, atomic
//!   writes and verified reads
//! - **Metadata store** - Whole-document JSON persistence for registry
//!   records, sheets, members and pending transfers, plus the append-only
//!   audit log
//! - **Layout** - The directory scheme of a vault data directory
//!
//! Both stores come in a filesystem flavor for production and an
//! in-memory flavor for tests. The vault core writes through the traits
//! and never touches paths itself.

mod error;
mod fsio;

pub mod blob;
pub mod layout;
pub mod meta;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use error::StoreError;
pub use layout::{
    VaultLayout, AUDIT_LOG_FILE, BLOBS_DIR, FILES_DIR, MEMBERS_DIR, SHEETS_DIR, TEMP_DIR,
    TRANSFERS_DIR, VAULT_CONFIG_FILE,
};
pub use meta::{FsMetaStore, MemoryMetaStore, MetaStore};
