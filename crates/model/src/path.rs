//! Sheet path normalization and validation.

use serde::{Deserialize, Serialize};

use crate::error::PathError;

/// Normalized relative path of a mapping entry.
///
/// Paths always use forward slashes. Backslashes from Windows clients are
/// normalized on parse. Absolute paths, drive prefixes, empty components
/// and `.`/`..` components are rejected so a path can never address
/// anything outside its sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SheetPath(String);

impl SheetPath {
    /// Normalize and validate a raw path.
    ///
    /// # Arguments
    ///
    /// * `path` - Raw path text as supplied by a client
    ///
    /// # Errors
    ///
    /// Returns a [`PathError`] if the path is empty, absolute, or contains
    /// empty, `.` or `..` components.
    pub fn parse(path: impl AsRef<str>) -> Result<Self, PathError> {
        let raw: &str = path.as_ref();
        if raw.is_empty() {
            return Err(PathError::Empty);
        }

        // Normalize Windows separators before any structural checks.
        let normalized: String = raw.replace('\\', "/");

        if normalized.starts_with('/') || has_drive_prefix(&normalized) {
            return Err(PathError::Absolute {
                path: raw.to_string(),
            });
        }

        for component in normalized.split('/') {
            if component.is_empty() {
                return Err(PathError::EmptyComponent {
                    path: raw.to_string(),
                });
            }
            if component == "." || component == ".." {
                return Err(PathError::Traversal {
                    path: raw.to_string(),
                });
            }
        }

        Ok(SheetPath(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for SheetPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SheetPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SheetPath::parse(value)
    }
}

impl From<SheetPath> for String {
    fn from(value: SheetPath) -> Self {
        value.0
    }
}

/// Check for a Windows drive prefix like `C:`.
fn has_drive_prefix(path: &str) -> bool {
    let mut chars = path.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), Some(':')) if c.is_ascii_alphabetic()
    )
}
