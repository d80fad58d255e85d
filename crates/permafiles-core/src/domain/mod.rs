//! Domain entities and business logic
//!
//! This module contains the core domain types for Permafiles:
//! - Newtypes for server identifiers and the anti-forgery token
//! - Listing entries, permissions and access roles
//! - Pending transfers and the per-item transfer state machine
//! - Listing sort options
//! - Share links and their settings
//! - Domain-specific error types

pub mod errors;
pub mod file_entry;
pub mod newtypes;
pub mod share;
pub mod sort;
pub mod transfer;

// Re-export commonly used types
pub use errors::DomainError;
pub use file_entry::{
    AccessRole, ArchiveSummary, FileEntry, Permission, PermissionSet, SyncStatus,
};
pub use newtypes::*;
pub use share::{ShareLink, ShareLinkSettings};
pub use sort::SortOption;
pub use transfer::{
    mime_for_path, PendingTransferItem, QueueSnapshot, TargetFolder, TransferDirection,
    TransferSource, TransferState, DEFAULT_MIME_TYPE,
};
