//! Pending transfers and their state machine
//!
//! ## State Machine
//!
//! ```text
//!                 ┌───────────┐  upload ok  ┌────────┐
//!          ┌────► │ Uploading │ ──────────► │ Synced │
//!          │      └───────────┘             └────────┘
//!          │            │ error
//!   ┌──────────┐        ▼
//!   │ Waiting  │    ┌────────┐
//!   └──────────┘    │ Failed │
//!     │    │        └────────┘
//!     │    │            ▲ error
//!     │    │      ┌─────────────┐ download ok ┌───────────┐
//!     │    └────► │ Downloading │ ──────────► │ Completed │
//!     │           └─────────────┘             └───────────┘
//!     │ cancel           │ cancel
//!     ▼                  ▼
//!   ┌──────────────────────┐
//!   │      Cancelled       │
//!   └──────────────────────┘
//! ```
//!
//! An in-flight upload cannot be cancelled. Every terminal state is final
//! for that enqueue attempt; a caller retries by enqueueing again.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::file_entry::{FileEntry, SyncStatus};
use super::newtypes::{ArchiveNumber, FolderId, FolderLinkId, QueueItemId, RecordId};

/// Fallback content type when the extension is unknown
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

// ============================================================================
// Direction and addressing
// ============================================================================

/// Transfer direction; each direction has its own serial queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Upload,
    Download,
}

impl TransferDirection {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Folder an upload is registered into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetFolder {
    pub archive_number: ArchiveNumber,
    pub folder_id: FolderId,
    pub folder_link_id: FolderLinkId,
}

impl TargetFolder {
    /// Build the target from a synced folder entry
    ///
    /// # Errors
    ///
    /// Fails if the entry is not a folder or lacks server identifiers.
    pub fn from_entry(entry: &FileEntry) -> Result<Self, DomainError> {
        match (entry.is_folder, entry.folder_id, entry.folder_link_id) {
            (true, Some(folder_id), Some(folder_link_id)) => Ok(Self {
                archive_number: entry.archive_number.clone(),
                folder_id,
                folder_link_id,
            }),
            _ => Err(DomainError::ValidationFailed(format!(
                "'{}' is not a synced folder",
                entry.name
            ))),
        }
    }
}

/// What a queued item moves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferSource {
    /// Local file to upload into `target`
    LocalFile { path: PathBuf, target: TargetFolder },
    /// Remote record to download
    RemoteRecord {
        record_id: RecordId,
        folder_link_id: FolderLinkId,
        archive_number: ArchiveNumber,
        parent_folder_link_id: Option<FolderLinkId>,
    },
}

// ============================================================================
// PendingTransferItem
// ============================================================================

/// A queued upload or download unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransferItem {
    /// Unique queue id
    pub id: QueueItemId,
    pub source: TransferSource,
    pub display_name: String,
    pub mime_type: Option<String>,
    pub size_bytes: u64,
    pub enqueued_at: DateTime<Utc>,
}

impl PendingTransferItem {
    /// Queue a local file for upload into `target`
    ///
    /// The display name is the file name and the MIME type is inferred from
    /// the extension.
    pub fn upload(
        path: impl Into<PathBuf>,
        size_bytes: u64,
        target: TargetFolder,
    ) -> Result<Self, DomainError> {
        let path = path.into();
        let display_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                DomainError::ValidationFailed(format!(
                    "'{}' has no usable file name",
                    path.display()
                ))
            })?
            .to_string();
        let mime_type = Some(mime_for_path(&path));

        Ok(Self {
            id: QueueItemId::new(),
            source: TransferSource::LocalFile { path, target },
            display_name,
            mime_type,
            size_bytes,
            enqueued_at: Utc::now(),
        })
    }

    /// Queue a synced remote file for download
    pub fn download(entry: &FileEntry) -> Result<Self, DomainError> {
        if entry.is_folder {
            return Err(DomainError::ValidationFailed(format!(
                "'{}' is a folder and cannot be downloaded",
                entry.name
            )));
        }
        let (record_id, folder_link_id) = match (entry.record_id, entry.folder_link_id) {
            (Some(r), Some(l)) => (r, l),
            _ => {
                return Err(DomainError::ValidationFailed(format!(
                    "'{}' is not synced yet",
                    entry.name
                )))
            }
        };

        Ok(Self {
            id: QueueItemId::new(),
            source: TransferSource::RemoteRecord {
                record_id,
                folder_link_id,
                archive_number: entry.archive_number.clone(),
                parent_folder_link_id: entry.parent_folder_link_id,
            },
            display_name: entry.name.clone(),
            mime_type: None,
            size_bytes: entry.size.unwrap_or(0),
            enqueued_at: Utc::now(),
        })
    }

    /// Direction implied by the source
    pub fn direction(&self) -> TransferDirection {
        match self.source {
            TransferSource::LocalFile { .. } => TransferDirection::Upload,
            TransferSource::RemoteRecord { .. } => TransferDirection::Download,
        }
    }

    /// Link id of the folder the item belongs to
    pub fn folder_link_id(&self) -> Option<FolderLinkId> {
        match &self.source {
            TransferSource::LocalFile { target, .. } => Some(target.folder_link_id),
            TransferSource::RemoteRecord {
                parent_folder_link_id,
                ..
            } => *parent_folder_link_id,
        }
    }

    /// Archive the item belongs to
    pub fn archive_number(&self) -> &ArchiveNumber {
        match &self.source {
            TransferSource::LocalFile { target, .. } => &target.archive_number,
            TransferSource::RemoteRecord { archive_number, .. } => archive_number,
        }
    }

    /// Listing placeholder shown while the item is queued or in flight
    pub fn placeholder(&self, status: SyncStatus) -> Result<FileEntry, DomainError> {
        let parent = self.folder_link_id().ok_or_else(|| {
            DomainError::ValidationFailed(format!("'{}' has no parent folder", self.display_name))
        })?;
        let mut entry = FileEntry::placeholder(
            self.display_name.clone(),
            self.archive_number().clone(),
            parent,
            status,
            self.id,
        )?;
        entry.size = Some(self.size_bytes);
        if let TransferSource::RemoteRecord { folder_link_id, .. } = &self.source {
            entry.folder_link_id = Some(*folder_link_id);
        }
        Ok(entry)
    }
}

/// Infer a content type from the path's extension
pub fn mime_for_path(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string()
}

// ============================================================================
// TransferState
// ============================================================================

/// Lifecycle state of one queued item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    #[default]
    Waiting,
    Uploading,
    Downloading,
    Synced,
    Completed,
    Failed,
    Cancelled,
}

impl TransferState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Uploading => "uploading",
            Self::Downloading => "downloading",
            Self::Synced => "synced",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// In-flight state for a direction
    pub fn in_flight(direction: TransferDirection) -> Self {
        match direction {
            TransferDirection::Upload => Self::Uploading,
            TransferDirection::Download => Self::Downloading,
        }
    }

    /// Success state for a direction
    pub fn succeeded(direction: TransferDirection) -> Self {
        match direction {
            TransferDirection::Upload => Self::Synced,
            TransferDirection::Download => Self::Completed,
        }
    }

    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Synced | Self::Completed | Self::Failed | Self::Cancelled
        )
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Uploading | Self::Downloading)
    }

    /// Checks whether moving to `target` is allowed
    pub fn can_transition_to(&self, target: TransferState) -> bool {
        use TransferState::*;
        matches!(
            (self, target),
            (Waiting, Uploading)
                | (Waiting, Downloading)
                | (Waiting, Cancelled)
                | (Uploading, Synced)
                | (Uploading, Failed)
                | (Downloading, Completed)
                | (Downloading, Failed)
                | (Downloading, Cancelled)
        )
    }

    /// Moves to `target`
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the transition is not allowed.
    pub fn transition_to(&mut self, target: TransferState) -> Result<(), DomainError> {
        if !self.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.name().to_string(),
                to: target.name().to_string(),
            });
        }
        *self = target;
        Ok(())
    }

    /// Listing status shown for an item in this state
    pub fn sync_status(&self) -> SyncStatus {
        match self {
            Self::Waiting | Self::Cancelled => SyncStatus::Waiting,
            Self::Uploading => SyncStatus::Uploading,
            Self::Downloading => SyncStatus::Downloading,
            Self::Synced | Self::Completed => SyncStatus::Synced,
            Self::Failed => SyncStatus::Failed,
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// QueueSnapshot
// ============================================================================

/// Persisted copy of one direction's pending items, for crash recovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub direction: TransferDirection,
    /// Items in FIFO order, in-flight head first
    pub items: Vec<PendingTransferItem>,
    pub saved_at: DateTime<Utc>,
}

impl QueueSnapshot {
    pub fn new(direction: TransferDirection, items: Vec<PendingTransferItem>) -> Self {
        Self {
            direction,
            items,
            saved_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
