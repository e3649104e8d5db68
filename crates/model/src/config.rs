//! Vault configuration document.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::HashAlgorithm;
use crate::id::{MemberId, SheetName};

/// Default name of the administrator-curated reference sheet.
pub const REFERENCE_SHEET_NAME: &str = "reference";

/// Configuration persisted at the root of a vault data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Unique identifier of this vault.
    pub uuid: Uuid,
    /// Display name, typically the project name.
    pub name: String,
    /// Members granted the administrator role by configuration.
    #[serde(rename = "admin", default, skip_serializing_if = "Vec::is_empty")]
    pub administrators: Vec<MemberId>,
    /// Hash algorithm for stored blobs.
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: HashAlgorithm,
    /// Name of the reference sheet.
    #[serde(default = "default_reference_sheet")]
    pub reference_sheet: SheetName,
}

impl VaultConfig {
    /// Create a configuration with a fresh vault id and defaults.
    pub fn new(name: impl Into<String>) -> Self {
        VaultConfig {
            uuid: Uuid::new_v4(),
            name: name.into(),
            administrators: Vec::new(),
            hash_algorithm: HashAlgorithm::Xxh128,
            reference_sheet: default_reference_sheet(),
        }
    }

    /// Grant the administrator role to a member by configuration.
    pub fn with_administrator(mut self, id: MemberId) -> Self {
        if !self.administrators.contains(&id) {
            self.administrators.push(id);
        }
        self
    }

    pub fn is_administrator(&self, id: &MemberId) -> bool {
        self.administrators.contains(id)
    }
}

fn default_hash_algorithm() -> HashAlgorithm {
    HashAlgorithm::Xxh128
}

fn default_reference_sheet() -> SheetName {
    SheetName::parse(REFERENCE_SHEET_NAME).expect("default sheet name is valid")
}
