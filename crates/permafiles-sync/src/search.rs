//! Query-driven subset view over a folder listing

use permafiles_core::domain::{FileEntry, SyncStatus};

/// Filtered view over the synced entries of one listing
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOverlay {
    query: String,
    results: Vec<FileEntry>,
}

impl SearchOverlay {
    /// Filter `files` by a case-insensitive substring match on the name.
    ///
    /// Placeholders are never part of the results. A blank query matches
    /// every synced entry.
    pub fn apply(query: &str, files: &[FileEntry]) -> Self {
        let needle = query.trim().to_lowercase();
        let results = files
            .iter()
            .filter(|entry| entry.sync_status == SyncStatus::Synced)
            .filter(|entry| needle.is_empty() || entry.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Self {
            query: query.to_string(),
            results,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> &[FileEntry] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
