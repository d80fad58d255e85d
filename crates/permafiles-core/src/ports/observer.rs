//! Event observer port (driving/primary port)
//!
//! The engines announce every observable transition as a [`SyncEvent`]:
//! queue items starting, progressing and finishing, queues emptying, the
//! navigation stack changing, and folder listings being replaced.
//!
//! ## Threading
//!
//! Observers are called synchronously at the transition point, from
//! whichever task made the transition. Implementations must be thread-safe
//! and must not block; hand work off to a channel if it is slow.

use std::path::PathBuf;

use crate::domain::{FileEntry, FolderLinkId, QueueItemId, TransferDirection};

/// Observable transition in the engines
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// An item was appended to a queue
    TransferQueued {
        direction: TransferDirection,
        item_id: QueueItemId,
        display_name: String,
        folder_link_id: Option<FolderLinkId>,
    },
    /// The queue head went in flight
    TransferStarted {
        direction: TransferDirection,
        item_id: QueueItemId,
    },
    /// Fraction of the in-flight transfer done, 0.0 to 1.0
    TransferProgress {
        direction: TransferDirection,
        item_id: QueueItemId,
        fraction: f64,
    },
    /// An upload finished and is now a server-side entry
    UploadSynced {
        item_id: QueueItemId,
        entry: FileEntry,
    },
    /// A download was written to local storage
    DownloadCompleted {
        item_id: QueueItemId,
        local_path: PathBuf,
    },
    /// An item failed terminally
    TransferFailed {
        direction: TransferDirection,
        item_id: QueueItemId,
        message: String,
    },
    /// An item was cancelled
    TransferCancelled {
        direction: TransferDirection,
        item_id: QueueItemId,
    },
    /// Nothing is left in a queue
    QueueDrained { direction: TransferDirection },
    /// The navigation stack was pushed or popped
    NavigationChanged {
        depth: usize,
        folder_link_id: FolderLinkId,
        breadcrumbs: Vec<String>,
    },
    /// A folder's listing was replaced or edited
    FilesUpdated {
        folder_link_id: FolderLinkId,
        count: usize,
    },
}

impl SyncEvent {
    /// Short event name for logs and JSON output
    pub fn name(&self) -> &'static str {
        match self {
            Self::TransferQueued { .. } => "transfer_queued",
            Self::TransferStarted { .. } => "transfer_started",
            Self::TransferProgress { .. } => "transfer_progress",
            Self::UploadSynced { .. } => "upload_synced",
            Self::DownloadCompleted { .. } => "download_completed",
            Self::TransferFailed { .. } => "transfer_failed",
            Self::TransferCancelled { .. } => "transfer_cancelled",
            Self::QueueDrained { .. } => "queue_drained",
            Self::NavigationChanged { .. } => "navigation_changed",
            Self::FilesUpdated { .. } => "files_updated",
        }
    }

    /// Queue item the event concerns, if any
    pub fn item_id(&self) -> Option<QueueItemId> {
        match self {
            Self::TransferQueued { item_id, .. }
            | Self::TransferStarted { item_id, .. }
            | Self::TransferProgress { item_id, .. }
            | Self::UploadSynced { item_id, .. }
            | Self::DownloadCompleted { item_id, .. }
            | Self::TransferFailed { item_id, .. }
            | Self::TransferCancelled { item_id, .. } => Some(*item_id),
            Self::QueueDrained { .. }
            | Self::NavigationChanged { .. }
            | Self::FilesUpdated { .. } => None,
        }
    }
}

/// Receiver of engine events
pub trait IEventObserver: Send + Sync {
    fn on_event(&self, event: &SyncEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_extraction() {
        let id = QueueItemId::new();
        let started = SyncEvent::TransferStarted {
            direction: TransferDirection::Upload,
            item_id: id,
        };
        assert_eq!(started.item_id(), Some(id));
        assert_eq!(started.name(), "transfer_started");

        let drained = SyncEvent::QueueDrained {
            direction: TransferDirection::Download,
        };
        assert_eq!(drained.item_id(), None);
    }
}
