//! Sheets: named path projections of virtual files.
//!
//! A sheet maps relative paths to virtual file ids. The mapping is
//! bidirectionally unique: a path maps to at most one id and an id
//! appears at most once per sheet. The reference sheet additionally
//! carries a staging area for proposed entries awaiting administrator
//! review.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::SheetError;
use crate::id::{MemberId, SheetName, VirtualFileId};
use crate::path::SheetPath;

/// Which kind of sheet: the administrator-curated reference tree or a
/// member's own tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SheetKind {
    Reference,
    Member { owner: MemberId },
}

/// A mapping entry proposed for the reference sheet, awaiting
/// administrator confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedMapping {
    pub id: VirtualFileId,
    pub proposed_by: MemberId,
    /// Proposal time in microseconds since the Unix epoch.
    pub proposed_at: i64,
}

/// Named path projection of virtual files.
///
/// Every mutation bumps `revision`, so clients can cheaply detect that a
/// cached copy of the sheet is out of date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SheetDoc", into = "SheetDoc")]
pub struct Sheet {
    name: SheetName,
    kind: SheetKind,
    /// Path to id, the authoritative direction.
    mapping: BTreeMap<SheetPath, VirtualFileId>,
    /// Inverse index, rebuilt from `mapping` on load.
    id_index: HashMap<VirtualFileId, SheetPath>,
    /// Proposed entries awaiting confirmation. Reference sheet only.
    staged: BTreeMap<SheetPath, StagedMapping>,
    revision: u64,
}

impl Sheet {
    /// Create an empty reference sheet.
    pub fn reference(name: SheetName) -> Self {
        Sheet {
            name,
            kind: SheetKind::Reference,
            mapping: BTreeMap::new(),
            id_index: HashMap::new(),
            staged: BTreeMap::new(),
            revision: 0,
        }
    }

    /// Create an empty member-owned sheet.
    pub fn member(name: SheetName, owner: MemberId) -> Self {
        Sheet {
            name,
            kind: SheetKind::Member { owner },
            mapping: BTreeMap::new(),
            id_index: HashMap::new(),
            staged: BTreeMap::new(),
            revision: 0,
        }
    }

    pub fn name(&self) -> &SheetName {
        &self.name
    }

    pub fn kind(&self) -> &SheetKind {
        &self.kind
    }

    /// Owning member, for member sheets.
    pub fn owner(&self) -> Option<&MemberId> {
        match &self.kind {
            SheetKind::Reference => None,
            SheetKind::Member { owner } => Some(owner),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, SheetKind::Reference)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Id mapped at a path, if any.
    pub fn resolve(&self, path: &SheetPath) -> Option<VirtualFileId> {
        self.mapping.get(path).copied()
    }

    /// Path an id is mapped at, if any.
    pub fn path_of(&self, id: VirtualFileId) -> Option<&SheetPath> {
        self.id_index.get(&id)
    }

    /// Whether the live mapping references the id. Staged proposals do
    /// not count.
    pub fn contains_id(&self, id: VirtualFileId) -> bool {
        self.id_index.contains_key(&id)
    }

    /// Live entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = (&SheetPath, VirtualFileId)> {
        self.mapping.iter().map(|(path, id)| (path, *id))
    }

    /// Staged proposals in path order.
    pub fn staged_entries(&self) -> impl Iterator<Item = (&SheetPath, &StagedMapping)> {
        self.staged.iter()
    }

    /// Staged proposal at a path, if any.
    pub fn staged_proposal(&self, path: &SheetPath) -> Option<&StagedMapping> {
        self.staged.get(path)
    }

    /// Map a path to an id.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::PathAlreadyMapped`] if the path is taken, or
    /// [`SheetError::IdAlreadyMapped`] if the id is already mapped at
    /// another path.
    pub fn insert(&mut self, path: SheetPath, id: VirtualFileId) -> Result<(), SheetError> {
        if self.mapping.contains_key(&path) {
            return Err(SheetError::PathAlreadyMapped {
                sheet: self.name.clone(),
                path,
            });
        }
        if let Some(existing) = self.id_index.get(&id) {
            return Err(SheetError::IdAlreadyMapped {
                sheet: self.name.clone(),
                id,
                existing: existing.clone(),
            });
        }
        self.id_index.insert(id, path.clone());
        self.mapping.insert(path, id);
        self.revision += 1;
        Ok(())
    }

    /// Move a mapping to a new path. The id stays put.
    ///
    /// Renaming a path onto itself is a no-op.
    pub fn rename(&mut self, path: &SheetPath, new_path: SheetPath) -> Result<(), SheetError> {
        if !self.mapping.contains_key(path) {
            return Err(SheetError::MappingNotFound {
                sheet: self.name.clone(),
                path: path.clone(),
            });
        }
        if new_path == *path {
            return Ok(());
        }
        if self.mapping.contains_key(&new_path) {
            return Err(SheetError::PathAlreadyMapped {
                sheet: self.name.clone(),
                path: new_path,
            });
        }
        let id: VirtualFileId = match self.mapping.remove(path) {
            Some(id) => id,
            None => {
                return Err(SheetError::MappingNotFound {
                    sheet: self.name.clone(),
                    path: path.clone(),
                })
            }
        };
        self.id_index.insert(id, new_path.clone());
        self.mapping.insert(new_path, id);
        self.revision += 1;
        Ok(())
    }

    /// Remove a mapping. The file itself is untouched.
    pub fn remove(&mut self, path: &SheetPath) -> Result<VirtualFileId, SheetError> {
        let id: VirtualFileId = match self.mapping.remove(path) {
            Some(id) => id,
            None => {
                return Err(SheetError::MappingNotFound {
                    sheet: self.name.clone(),
                    path: path.clone(),
                })
            }
        };
        self.id_index.remove(&id);
        self.revision += 1;
        Ok(id)
    }

    /// Record a proposed entry in the staging area.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::StagingNotSupported`] on member sheets, and
    /// collision errors if the path or id is already live or the path is
    /// already staged.
    pub fn stage(&mut self, path: SheetPath, proposal: StagedMapping) -> Result<(), SheetError> {
        if !self.is_reference() {
            return Err(SheetError::StagingNotSupported {
                sheet: self.name.clone(),
            });
        }
        if self.mapping.contains_key(&path) {
            return Err(SheetError::PathAlreadyMapped {
                sheet: self.name.clone(),
                path,
            });
        }
        if let Some(existing) = self.id_index.get(&proposal.id) {
            return Err(SheetError::IdAlreadyMapped {
                sheet: self.name.clone(),
                id: proposal.id,
                existing: existing.clone(),
            });
        }
        if self.staged.contains_key(&path) {
            return Err(SheetError::AlreadyStaged {
                sheet: self.name.clone(),
                path,
            });
        }
        self.staged.insert(path, proposal);
        self.revision += 1;
        Ok(())
    }

    /// Promote a staged proposal into the live mapping.
    ///
    /// On any error the proposal stays staged.
    pub fn approve_staged(&mut self, path: &SheetPath) -> Result<VirtualFileId, SheetError> {
        let id: VirtualFileId = match self.staged.get(path) {
            Some(proposal) => proposal.id,
            None => {
                return Err(SheetError::NotStaged {
                    sheet: self.name.clone(),
                    path: path.clone(),
                })
            }
        };
        if self.mapping.contains_key(path) {
            return Err(SheetError::PathAlreadyMapped {
                sheet: self.name.clone(),
                path: path.clone(),
            });
        }
        if let Some(existing) = self.id_index.get(&id) {
            return Err(SheetError::IdAlreadyMapped {
                sheet: self.name.clone(),
                id,
                existing: existing.clone(),
            });
        }
        self.staged.remove(path);
        self.id_index.insert(id, path.clone());
        self.mapping.insert(path.clone(), id);
        self.revision += 1;
        Ok(id)
    }

    /// Drop a staged proposal without promoting it.
    pub fn discard_staged(&mut self, path: &SheetPath) -> Result<StagedMapping, SheetError> {
        let proposal: StagedMapping = match self.staged.remove(path) {
            Some(proposal) => proposal,
            None => {
                return Err(SheetError::NotStaged {
                    sheet: self.name.clone(),
                    path: path.clone(),
                })
            }
        };
        self.revision += 1;
        Ok(proposal)
    }
}

/// Persisted form of a sheet. The inverse index is rebuilt on load.
#[derive(Serialize, Deserialize)]
struct SheetDoc {
    name: SheetName,
    #[serde(flatten)]
    kind: SheetKind,
    mapping: BTreeMap<SheetPath, VirtualFileId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    staged: BTreeMap<SheetPath, StagedMapping>,
    #[serde(default)]
    revision: u64,
}

impl TryFrom<SheetDoc> for Sheet {
    type Error = SheetError;

    fn try_from(doc: SheetDoc) -> Result<Self, Self::Error> {
        let mut id_index: HashMap<VirtualFileId, SheetPath> =
            HashMap::with_capacity(doc.mapping.len());
        for (path, id) in &doc.mapping {
            if let Some(existing) = id_index.insert(*id, path.clone()) {
                return Err(SheetError::IdAlreadyMapped {
                    sheet: doc.name.clone(),
                    id: *id,
                    existing,
                });
            }
        }
        Ok(Sheet {
            name: doc.name,
            kind: doc.kind,
            mapping: doc.mapping,
            id_index,
            staged: doc.staged,
            revision: doc.revision,
        })
    }
}

impl From<Sheet> for SheetDoc {
    fn from(sheet: Sheet) -> Self {
        SheetDoc {
            name: sheet.name,
            kind: sheet.kind,
            mapping: sheet.mapping,
            staged: sheet.staged,
            revision: sheet.revision,
        }
    }
}
