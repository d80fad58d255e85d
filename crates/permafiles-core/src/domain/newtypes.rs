//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for the identifiers used to address items in a
//! remote archive. A folder or file is located either by the pair
//! (archive number, folder-link id) or, for file records, by its record id.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Numeric server identifiers
// ============================================================================

macro_rules! server_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub struct $name(i64);

        impl $name {
            #[doc = concat!("Create a ", $label, ", rejecting zero and negative values")]
            pub fn new(value: i64) -> Result<Self, DomainError> {
                if value <= 0 {
                    return Err(DomainError::InvalidId(format!(
                        "{} must be positive, got {}",
                        $label, value
                    )));
                }
                Ok(Self(value))
            }

            /// Get the raw numeric value
            #[must_use]
            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = DomainError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s.trim().parse::<i64>().map_err(|e| {
                    DomainError::InvalidId(format!("Invalid {}: {e}", $label))
                })?;
                Self::new(value)
            }
        }
    };
}

server_id!(
    /// Identifier of an item's position inside a specific parent folder.
    ///
    /// The same underlying file may be linked under several folders, each
    /// link carrying its own `FolderLinkId`.
    FolderLinkId,
    "folder link id"
);

server_id!(
    /// Server identifier of a folder object (independent of its links)
    FolderId,
    "folder id"
);

server_id!(
    /// Server identifier of an uploaded file record
    RecordId,
    "record id"
);

server_id!(
    /// Server identifier of a share link
    ShareLinkId,
    "share link id"
);

// ============================================================================
// ArchiveNumber
// ============================================================================

/// Public number of an archive, e.g. `0a21-0000`.
///
/// Archive numbers are opaque to the client; they are validated only for
/// being non-empty, free of whitespace, and made of ASCII alphanumerics and
/// dashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArchiveNumber(String);

impl ArchiveNumber {
    /// Create a validated archive number
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::InvalidArchiveNumber(
                "archive number cannot be empty".to_string(),
            ));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(DomainError::InvalidArchiveNumber(value));
        }
        Ok(Self(value))
    }

    /// Get the archive number as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ArchiveNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArchiveNumber> for String {
    fn from(value: ArchiveNumber) -> Self {
        value.0
    }
}

impl Display for ArchiveNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ArchiveNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

// ============================================================================
// QueueItemId
// ============================================================================

/// Client-generated identifier of a queued transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueItemId(Uuid);

impl QueueItemId {
    /// Create a new random QueueItemId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a QueueItemId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for QueueItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for QueueItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueItemId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid QueueItemId: {e}")))
    }
}

// ============================================================================
// CsrfToken
// ============================================================================

/// Rotating anti-forgery token issued by the server with each response
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Create a token, rejecting empty values
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "csrf token cannot be empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// Get the token value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens stay out of logs.
impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfToken(***)")
    }
}
