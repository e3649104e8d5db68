//! On-disk layout of a vault data directory.
//!
//! ```text
//! <root>/
//!   vault.json                     vault configuration
//!   audit.log                      one JSON audit record per line
//!   files/<aa>/<bb>/<id>.json      registry records, fanned out by id
//!   sheets/<name>.json             one document per sheet
//!   members/<id>.json              one document per member
//!   transfers/<target>/<id>.json   pending transfers, grouped by target sheet
//!   blobs/<aa>/<bb>/<hash>.<ext>   content-addressed payloads
//!   .tmp/                          staging area for atomic writes
//! ```

use std::path::{Path, PathBuf};

use asset_vault_model::{ContentHash, HashAlgorithm, MemberId, SheetName, TransferId, VirtualFileId};

pub const VAULT_CONFIG_FILE: &str = "vault.json";
pub const AUDIT_LOG_FILE: &str = "audit.log";
pub const FILES_DIR: &str = "files";
pub const SHEETS_DIR: &str = "sheets";
pub const MEMBERS_DIR: &str = "members";
pub const TRANSFERS_DIR: &str = "transfers";
pub const BLOBS_DIR: &str = "blobs";
pub const TEMP_DIR: &str = ".tmp";

/// Number of leading hex characters consumed per fan-out level.
const FAN_OUT_WIDTH: usize = 2;

/// Resolves paths inside a vault data directory.
#[derive(Debug, Clone)]
pub struct VaultLayout {
    root: PathBuf,
}

impl VaultLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        VaultLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(VAULT_CONFIG_FILE)
    }

    pub fn audit_log(&self) -> PathBuf {
        self.root.join(AUDIT_LOG_FILE)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    pub fn files_dir(&self) -> PathBuf {
        self.root.join(FILES_DIR)
    }

    /// Registry record path, fanned out over two directory levels.
    pub fn file_record(&self, id: &VirtualFileId) -> PathBuf {
        let simple: String = id.simple();
        fan_out(self.files_dir(), &simple).join(format!("{simple}.json"))
    }

    pub fn sheets_dir(&self) -> PathBuf {
        self.root.join(SHEETS_DIR)
    }

    pub fn sheet_file(&self, name: &SheetName) -> PathBuf {
        self.sheets_dir().join(format!("{name}.json"))
    }

    pub fn members_dir(&self) -> PathBuf {
        self.root.join(MEMBERS_DIR)
    }

    pub fn member_file(&self, id: &MemberId) -> PathBuf {
        self.members_dir().join(format!("{id}.json"))
    }

    pub fn transfers_dir(&self) -> PathBuf {
        self.root.join(TRANSFERS_DIR)
    }

    pub fn transfer_queue_dir(&self, target: &SheetName) -> PathBuf {
        self.transfers_dir().join(target.as_str())
    }

    pub fn transfer_file(&self, target: &SheetName, id: TransferId) -> PathBuf {
        self.transfer_queue_dir(target).join(format!("{id}.json"))
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join(BLOBS_DIR)
    }

    /// Blob payload path, fanned out over two directory levels.
    pub fn blob_file(&self, hash: &ContentHash, algorithm: HashAlgorithm) -> PathBuf {
        let digest: &str = hash.as_str();
        fan_out(self.blobs_dir(), digest).join(format!("{digest}.{}", algorithm.extension()))
    }
}

/// Append two fan-out levels derived from the leading characters of a key.
///
/// Keys shorter than two levels land directly in the base directory.
fn fan_out(base: PathBuf, key: &str) -> PathBuf {
    if key.len() < 2 * FAN_OUT_WIDTH {
        return base;
    }
    base.join(&key[..FAN_OUT_WIDTH])
        .join(&key[FAN_OUT_WIDTH..2 * FAN_OUT_WIDTH])
}
