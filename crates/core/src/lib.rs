//! The asset vault engine.
//!
//! Authoritative server-side state for versioned binary assets:
//!
//! - **File registry** - canonical identity and version history per
//!   virtual file, one critical section per id
//! - **Holder locks** - the single-writer acquire/release protocol with
//!   freshness checks on acquisition
//! - **Sheets** - named path projections with per-sheet authority and
//!   the reference staging flow
//! - **Transfers** - staged movement of mapping entries between sheets
//! - **Validation** - structural comparison of client snapshots against
//!   recorded state, refusing ambiguous drift
//! - **Members and audit** - the member directory and the durable trail
//!   of privileged operations
//!
//! Everything is reached through [`Vault`], which owns the subsystems
//! and applies sheet-derived visibility to every operation. Frontends
//! authenticate members elsewhere and pass an `Actor` per call; the
//! engine has no ambient current-user state.

mod audit;
mod error;
mod locks;
mod members;
mod registry;
mod sheets;
mod transfer;
pub mod validate;
mod vault;

pub use error::{ErrorClass, VaultError};
pub use locks::{FinalCommit, HoldState, VersionClaim};
pub use validate::{classify, DriftFinding, StaleEntry, ValidationReport};
pub use vault::Vault;
