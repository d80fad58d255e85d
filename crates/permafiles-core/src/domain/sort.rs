//! Listing sort options
//!
//! The server is the ordering authority for folder listings. A sort option
//! is sent with every child-item fetch and the client never re-sorts a
//! listing locally.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Ordering requested from the server for a folder listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    /// Display name, A to Z
    #[default]
    NameAsc,
    /// Display name, Z to A
    NameDesc,
    /// Display date, oldest first
    DateAsc,
    /// Display date, newest first
    DateDesc,
}

impl SortOption {
    /// All options in menu order
    pub const ALL: [SortOption; 4] = [
        SortOption::NameAsc,
        SortOption::NameDesc,
        SortOption::DateAsc,
        SortOption::DateDesc,
    ];

    /// Value sent to the server in the `sort` field of a folder request
    pub fn wire_value(&self) -> &'static str {
        match self {
            Self::NameAsc => "sort.display_name_asc",
            Self::NameDesc => "sort.display_name_desc",
            Self::DateAsc => "sort.display_date_asc",
            Self::DateDesc => "sort.display_date_desc",
        }
    }

    /// Short name used in configuration and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Self::NameAsc => "name_asc",
            Self::NameDesc => "name_desc",
            Self::DateAsc => "date_asc",
            Self::DateDesc => "date_desc",
        }
    }

    /// Parse the server's wire value
    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.wire_value() == value)
    }
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SortOption {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|o| o.name().eq_ignore_ascii_case(s))
            .or_else(|| Self::from_wire(s))
            .ok_or_else(|| DomainError::UnknownSortOption(s.to_string()))
    }
}
