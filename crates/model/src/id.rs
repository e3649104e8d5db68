//! Identifier newtypes for vault entities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NameError;

/// Globally unique identity of a virtual file, independent of any path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualFileId(Uuid);

impl VirtualFileId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        VirtualFileId(Uuid::new_v4())
    }

    /// Parse an id from its text form.
    pub fn parse(text: &str) -> Result<Self, uuid::Error> {
        Ok(VirtualFileId(Uuid::parse_str(text)?))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Compact 32-character hex form, used for on-disk fan-out.
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl std::fmt::Display for VirtualFileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identity of a pending transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(Uuid);

impl TransferId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        TransferId(Uuid::new_v4())
    }

    /// Parse an id from its text form.
    pub fn parse(text: &str) -> Result<Self, uuid::Error> {
        Ok(TransferId(Uuid::parse_str(text)?))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a registered member.
///
/// Member ids appear in on-disk file names, so the character set is
/// restricted to `[A-Za-z0-9._-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemberId(String);

impl MemberId {
    /// Validate and wrap a member id.
    pub fn parse(text: impl Into<String>) -> Result<Self, NameError> {
        let text: String = text.into();
        validate_name(&text)?;
        Ok(MemberId(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for MemberId {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MemberId::parse(value)
    }
}

impl From<MemberId> for String {
    fn from(value: MemberId) -> Self {
        value.0
    }
}

/// Name of a sheet.
///
/// Sheet names appear in on-disk file names, so the same character set
/// restriction as [`MemberId`] applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SheetName(String);

impl SheetName {
    /// Validate and wrap a sheet name.
    pub fn parse(text: impl Into<String>) -> Result<Self, NameError> {
        let text: String = text.into();
        validate_name(&text)?;
        Ok(SheetName(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SheetName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SheetName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SheetName::parse(value)
    }
}

impl From<SheetName> for String {
    fn from(value: SheetName) -> Self {
        value.0
    }
}

fn validate_name(text: &str) -> Result<(), NameError> {
    if text.is_empty() {
        return Err(NameError::Empty);
    }
    let valid: bool = text
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');
    if !valid {
        return Err(NameError::InvalidCharacters {
            name: text.to_string(),
        });
    }
    Ok(())
}
