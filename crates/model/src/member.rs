//! Members, roles, and the per-request actor context.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::MemberId;
use crate::version::now_micros;

/// Privilege roles a member can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Administrator,
}

/// A registered member of the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    /// Human-readable name shown by frontends.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Public key material registered for the authentication layer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub public_key: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub roles: BTreeSet<Role>,
    /// Registration time in microseconds since the Unix epoch.
    pub joined_at: i64,
}

impl Member {
    /// Create a member with no roles.
    pub fn new(id: MemberId) -> Self {
        Member {
            id,
            display_name: String::new(),
            public_key: String::new(),
            roles: BTreeSet::new(),
            joined_at: now_micros(),
        }
    }

    /// Add a role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set the registered public key.
    pub fn with_public_key(mut self, key: impl Into<String>) -> Self {
        self.public_key = key.into();
        self
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Administrator)
    }
}

/// The authenticated identity an operation runs as.
///
/// Built by the transport layer after authentication. Privileged
/// operations check roles on this context; there is no ambient
/// current-user state anywhere in the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    member: MemberId,
    roles: BTreeSet<Role>,
}

impl Actor {
    /// Actor with no roles.
    pub fn member(id: MemberId) -> Self {
        Actor {
            member: id,
            roles: BTreeSet::new(),
        }
    }

    /// Actor carrying the administrator role.
    pub fn admin(id: MemberId) -> Self {
        Actor::member(id).with_role(Role::Administrator)
    }

    /// Actor for a registered member, carrying the member's roles.
    pub fn of(member: &Member) -> Self {
        Actor {
            member: member.id.clone(),
            roles: member.roles.clone(),
        }
    }

    /// Add a role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn id(&self) -> &MemberId {
        &self.member
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Administrator)
    }
}
