//! Member directory: who the vault knows about.
//!
//! Registration is an administrator action and is audited. The directory
//! never holds credentials; authentication happens in the transport
//! layer, which hands the core an [`Actor`].

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use asset_vault_model::{Actor, AuditAction, AuditRecord, Member, MemberId, Role};
use asset_vault_storage::MetaStore;

use crate::audit::AuditLog;
use crate::error::VaultError;

pub struct MemberDirectory {
    members: DashMap<MemberId, Member>,
    meta: Arc<dyn MetaStore>,
    audit: Arc<AuditLog>,
    /// Serializes registration so the id check and the insert are atomic.
    create_lock: Mutex<()>,
}

impl MemberDirectory {
    pub fn new(meta: Arc<dyn MetaStore>, audit: Arc<AuditLog>) -> Self {
        MemberDirectory {
            members: DashMap::new(),
            meta,
            audit,
            create_lock: Mutex::new(()),
        }
    }

    /// Fill the directory from loaded members. Called once while opening.
    pub fn preload(&self, members: Vec<Member>) {
        for member in members {
            self.members.insert(member.id.clone(), member);
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &MemberId) -> bool {
        self.members.contains_key(id)
    }

    /// Register a new member.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::PermissionDenied`] unless the actor is an
    /// administrator and [`VaultError::MemberExists`] if the id is taken.
    pub async fn register(&self, actor: &Actor, member: Member) -> Result<Member, VaultError> {
        if !actor.is_admin() {
            warn!("Denied member registration by '{}'", actor.id());
            return Err(VaultError::PermissionDenied {
                member: actor.id().clone(),
                action: "register members".to_string(),
            });
        }

        let _guard = self.create_lock.lock().await;
        if self.members.contains_key(&member.id) {
            return Err(VaultError::MemberExists(member.id));
        }

        self.meta.put_member(&member).await?;
        self.members.insert(member.id.clone(), member.clone());
        info!("Registered member '{}'", member.id);

        let detail: String = if member.is_admin() {
            format!("registered '{}' with administrator role", member.id)
        } else {
            format!("registered '{}'", member.id)
        };
        self.audit
            .record(AuditRecord::new(
                AuditAction::RegisterMember,
                actor.id().clone(),
                detail,
            ))
            .await?;
        Ok(member)
    }

    /// Make sure the member exists and carries the administrator role.
    ///
    /// Runs while opening a vault for every configured administrator, so
    /// a fresh vault always has someone who can act. Not audited; there
    /// is no acting member yet at that point.
    pub async fn ensure_admin(&self, id: &MemberId) -> Result<(), VaultError> {
        let _guard = self.create_lock.lock().await;
        let member: Member = {
            let existing: Option<Member> = self.members.get(id).map(|entry| entry.value().clone());
            match existing {
                Some(member) if member.is_admin() => return Ok(()),
                Some(member) => member.with_role(Role::Administrator),
                None => Member::new(id.clone()).with_role(Role::Administrator),
            }
        };

        self.meta.put_member(&member).await?;
        self.members.insert(member.id.clone(), member);
        debug!("Ensured administrator '{}'", id);
        Ok(())
    }

    /// Look a member up.
    pub fn get(&self, id: &MemberId) -> Result<Member, VaultError> {
        self.members
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| VaultError::MemberNotFound(id.clone()))
    }

    /// All members, sorted by id.
    pub fn list(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self
            .members
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        members
    }
}
