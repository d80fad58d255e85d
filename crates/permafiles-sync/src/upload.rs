//! Upload pipeline
//!
//! Each upload is two strictly sequential phases:
//!
//! 1. **Registration**: the record metadata (target folder, file name,
//!    size, content type) is registered and the server answers with the
//!    record that will hold the bytes. A failure here fails the item and no
//!    bytes are sent.
//! 2. **Binary transfer**: the file is streamed as multipart content of
//!    that record, reporting progress as bytes go out. A failure here leaves
//!    the registered record behind on the server.
//!
//! When an upload succeeds and its folder is the one on display, the synced
//! entry is prepended to that listing before the next upload starts.

use std::sync::Arc;

use permafiles_core::{
    domain::{FileEntry, PendingTransferItem, TransferDirection, TransferSource},
    ports::SyncEvent,
};
use tracing::{debug, info, instrument};

use crate::content::ActiveFolder;
use crate::error::{RepositoryError, TransferError};
use crate::queue::{ProgressReporter, TransferPipeline, TransferResult};
use crate::repository::FolderRepository;

/// Uploads local files into archive folders
pub struct UploadPipeline {
    repository: Arc<FolderRepository>,
    active: ActiveFolder,
}

impl UploadPipeline {
    pub fn new(repository: Arc<FolderRepository>, active: ActiveFolder) -> Self {
        Self { repository, active }
    }
}

#[async_trait::async_trait]
impl TransferPipeline for UploadPipeline {
    type Output = FileEntry;

    fn direction(&self) -> TransferDirection {
        TransferDirection::Upload
    }

    fn supports_in_flight_cancel(&self) -> bool {
        false
    }

    #[instrument(skip(self, item, progress), fields(item_id = %item.id, name = %item.display_name))]
    async fn run(
        &self,
        item: &PendingTransferItem,
        progress: ProgressReporter,
    ) -> TransferResult<FileEntry> {
        let TransferSource::LocalFile { path, target } = &item.source else {
            return Err(TransferError::InvalidItem(format!(
                "'{}' is not an upload",
                item.display_name
            )));
        };

        let entry = self
            .repository
            .register_record(item, target)
            .await
            .map_err(TransferError::Registration)?;
        let record_id = entry.record_id.ok_or_else(|| {
            TransferError::Registration(RepositoryError::Envelope(
                permafiles_core::envelope::EnvelopeError::malformed("registered record has no id"),
            ))
        })?;
        debug!(record_id = %record_id, "record registered");

        self.repository
            .upload_content(
                record_id,
                path,
                &item.display_name,
                item.mime_type.as_deref(),
                item.size_bytes,
                progress.callback(),
            )
            .await
            .map_err(TransferError::Binary)?;

        Ok(entry)
    }

    fn on_completed(&self, item: &PendingTransferItem, entry: &FileEntry) {
        let Some(folder) = item.folder_link_id() else {
            return;
        };
        if let Some(content) = self.active.showing(folder) {
            info!(name = %entry.name, folder_link_id = %folder, "adding upload to open folder");
            content.insert_file(entry.clone());
        }
    }

    fn completed_event(&self, item: &PendingTransferItem, entry: &FileEntry) -> SyncEvent {
        SyncEvent::UploadSynced {
            item_id: item.id,
            entry: entry.clone(),
        }
    }
}
