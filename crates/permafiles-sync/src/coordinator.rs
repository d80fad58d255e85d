//! Files coordinator
//!
//! One coordinator per browsing session. It owns the navigation stack and
//! both transfer queues, and keeps the upload pipeline pointed at the
//! listing on display.
//!
//! # Usage
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use permafiles_core::ports::{IRequestDispatcher, ILocalFileStorage};
//! # use permafiles_sync::coordinator::{CoordinatorSettings, FilesCoordinator};
//! # async fn run(
//! #     dispatcher: Arc<dyn IRequestDispatcher>,
//! #     storage: Arc<dyn ILocalFileStorage>,
//! # ) -> Result<(), permafiles_sync::FilesError> {
//! let files = FilesCoordinator::new(dispatcher, storage, None, CoordinatorSettings::default());
//! let root = files.start().await?;
//! for entry in root.files() {
//!     println!("{entry}");
//! }
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use permafiles_core::{
    config::Config,
    domain::{
        AccessRole, FileEntry, PendingTransferItem, QueueItemId, ShareLink, SortOption,
        TargetFolder, TransferDirection,
    },
    endpoint::RelocateAction,
    ports::{IEventObserver, ILocalFileStorage, IQueueSnapshotStore, IRequestDispatcher},
};
use tracing::{info, instrument, warn};

use crate::content::{ActiveFolder, FolderContentViewModel};
use crate::download::DownloadPipeline;
use crate::error::{FilesError, TransferError};
use crate::events::EventBus;
use crate::navigation::FolderNavigator;
use crate::queue::{CancelOutcome, QueueStatus, TransferQueue, TransferQueueHandle, TransferTicket};
use crate::repository::FolderRepository;
use crate::search::SearchOverlay;
use crate::upload::UploadPipeline;

/// Session tunables
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    /// Sort option of the root frame
    pub default_sort: SortOption,
    /// Minimum progress step, in percent, between progress events
    pub progress_granularity_percent: u8,
    /// Role held on the archive when the server does not report one
    pub archive_role: Option<AccessRole>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            default_sort: SortOption::default(),
            progress_granularity_percent: 1,
            archive_role: None,
        }
    }
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_sort: config.session.default_sort,
            progress_granularity_percent: config.transfers.progress_granularity_percent,
            archive_role: config.session.access_role,
        }
    }
}

/// Items re-enqueued from stored snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub uploads: Vec<QueueItemId>,
    pub downloads: Vec<QueueItemId>,
}

impl RestoreReport {
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.downloads.is_empty()
    }
}

/// Top-level owner of a browsing session
pub struct FilesCoordinator {
    repository: Arc<FolderRepository>,
    navigator: FolderNavigator,
    uploads: TransferQueueHandle<FileEntry>,
    downloads: TransferQueueHandle<PathBuf>,
    events: EventBus,
    store: Option<Arc<dyn IQueueSnapshotStore>>,
}

impl FilesCoordinator {
    /// Build a session and start both queue tasks
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        dispatcher: Arc<dyn IRequestDispatcher>,
        storage: Arc<dyn ILocalFileStorage>,
        store: Option<Arc<dyn IQueueSnapshotStore>>,
        settings: CoordinatorSettings,
    ) -> Self {
        let events = EventBus::new();
        let active = ActiveFolder::new();
        let repository =
            Arc::new(FolderRepository::new(dispatcher).with_archive_role(settings.archive_role));
        let navigator = FolderNavigator::new(
            Arc::clone(&repository),
            events.clone(),
            settings.default_sort,
        )
        .with_active(active.clone());

        let uploads = TransferQueue::spawn(
            Arc::new(UploadPipeline::new(Arc::clone(&repository), active.clone())),
            events.clone(),
            store.clone(),
            settings.progress_granularity_percent,
        );
        let downloads = TransferQueue::spawn(
            Arc::new(DownloadPipeline::new(Arc::clone(&repository), storage)),
            events.clone(),
            store.clone(),
            settings.progress_granularity_percent,
        );

        Self {
            repository,
            navigator,
            uploads,
            downloads,
            events,
            store,
        }
    }

    pub fn repository(&self) -> &Arc<FolderRepository> {
        &self.repository
    }

    pub fn navigator(&self) -> &FolderNavigator {
        &self.navigator
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self, observer: Arc<dyn IEventObserver>) {
        self.events.subscribe(observer);
    }

    // ------------------------------------------------------------------
    // Session and navigation
    // ------------------------------------------------------------------

    /// Open the archive root and resume any stored queues
    ///
    /// # Errors
    ///
    /// A root that cannot be resolved ends the session. Queue recovery is
    /// best-effort and never fails the start.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<Arc<FolderContentViewModel>, FilesError> {
        let root = self.navigator.start().await?;

        let report = self.restore().await;
        if !report.is_empty() {
            info!(
                uploads = report.uploads.len(),
                downloads = report.downloads.len(),
                "resumed stored transfers"
            );
        }
        Ok(root)
    }

    /// Re-enqueue stored items that are not already queued
    pub async fn restore(&self) -> RestoreReport {
        let mut report = RestoreReport::default();
        let Some(store) = &self.store else {
            return report;
        };

        for direction in [TransferDirection::Upload, TransferDirection::Download] {
            let snapshot = match store.load(direction).await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => continue,
                Err(e) => {
                    warn!(direction = %direction, error = %e, "could not load queue snapshot");
                    continue;
                }
            };
            let items: Vec<PendingTransferItem> = snapshot
                .items
                .into_iter()
                .filter(|item| item.direction() == direction)
                .collect();
            let restored = match direction {
                TransferDirection::Upload => self.uploads.restore(items).await,
                TransferDirection::Download => self.downloads.restore(items).await,
            };
            match (direction, restored) {
                (TransferDirection::Upload, Ok(ids)) => report.uploads = ids,
                (TransferDirection::Download, Ok(ids)) => report.downloads = ids,
                (_, Err(e)) => warn!(direction = %direction, error = %e, "could not resume queue"),
            }
        }
        report
    }

    /// Listing on display
    pub fn current(&self) -> Option<Arc<FolderContentViewModel>> {
        self.navigator.current()
    }

    fn current_or_err(&self) -> Result<Arc<FolderContentViewModel>, FilesError> {
        self.current().ok_or(FilesError::NoCurrentFolder)
    }

    pub async fn navigate_into(
        &self,
        folder: &FileEntry,
    ) -> Result<Arc<FolderContentViewModel>, FilesError> {
        Ok(self.navigator.navigate_into(folder).await?)
    }

    pub async fn navigate_back(&self) -> bool {
        self.navigator.navigate_back().await
    }

    /// Refetch the listing on display
    pub async fn refresh(&self) -> Result<(), FilesError> {
        self.current_or_err()?.refresh_folder().await?;
        Ok(())
    }

    pub async fn set_sort_option(&self, sort: SortOption) -> Result<(), FilesError> {
        self.current_or_err()?.set_sort_option(sort).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Folder edits
    // ------------------------------------------------------------------

    pub async fn create_folder(&self, name: &str) -> Result<FileEntry, FilesError> {
        Ok(self.current_or_err()?.create_folder(name).await?)
    }

    pub async fn delete(&self, entry: &FileEntry) -> Result<(), FilesError> {
        self.current_or_err()?.delete(entry).await?;
        Ok(())
    }

    pub async fn relocate(
        &self,
        entry: &FileEntry,
        destination: &FileEntry,
        action: RelocateAction,
    ) -> Result<(), FilesError> {
        self.current_or_err()?
            .relocate(entry, destination, action)
            .await?;
        Ok(())
    }

    pub fn search(&self, query: &str) -> Result<SearchOverlay, FilesError> {
        Ok(self.current_or_err()?.search(query))
    }

    // ------------------------------------------------------------------
    // Share links
    // ------------------------------------------------------------------

    pub async fn share_link(&self, entry: &FileEntry) -> Result<Option<ShareLink>, FilesError> {
        Ok(self.repository.get_share_link(entry).await?)
    }

    /// Existing share link of `entry`, creating one if it has none
    pub async fn ensure_share_link(&self, entry: &FileEntry) -> Result<ShareLink, FilesError> {
        if let Some(link) = self.repository.get_share_link(entry).await? {
            return Ok(link);
        }
        let link = self.repository.generate_share_link(entry).await?;
        info!(name = %entry.name, url = %link.url, "share link created");
        Ok(link)
    }

    pub async fn update_share_link(&self, link: &ShareLink) -> Result<ShareLink, FilesError> {
        Ok(self.repository.update_share_link(link).await?)
    }

    pub async fn drop_share_link(&self, link: &ShareLink) -> Result<(), FilesError> {
        self.repository.drop_share_link(link).await?;
        info!(share_link_id = %link.id, "share link revoked");
        Ok(())
    }

    pub async fn share_links(&self) -> Result<Vec<ShareLink>, FilesError> {
        Ok(self.repository.get_shares().await?)
    }

    // ------------------------------------------------------------------
    // Uploads
    // ------------------------------------------------------------------

    /// Queue local files for upload into the folder on display
    #[instrument(skip(self, paths), fields(count = paths.len()))]
    pub async fn upload(
        &self,
        paths: Vec<PathBuf>,
    ) -> Result<Vec<TransferTicket<FileEntry>>, FilesError> {
        let current = self.current_or_err()?;
        let target = TargetFolder::from_entry(current.folder())?;

        let mut items = Vec::with_capacity(paths.len());
        for path in paths {
            let metadata = tokio::fs::metadata(&path).await?;
            if !metadata.is_file() {
                return Err(FilesError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("'{}' is not a regular file", path.display()),
                )));
            }
            items.push(PendingTransferItem::upload(
                path,
                metadata.len(),
                target.clone(),
            )?);
        }
        Ok(self.uploads.enqueue(items).await?)
    }

    pub async fn cancel_upload(&self, id: QueueItemId) -> Result<CancelOutcome, FilesError> {
        Ok(self.uploads.cancel(id).await?)
    }

    /// Drop every waiting upload into the folder on display
    pub async fn cancel_uploads_in_current_folder(&self) -> Result<Vec<QueueItemId>, FilesError> {
        let folder = self.current_or_err()?.folder_link_id();
        Ok(self.uploads.cancel_folder(folder).await?)
    }

    /// Placeholders for the uploads into the folder on display
    pub async fn upload_placeholders(&self) -> Result<Vec<FileEntry>, FilesError> {
        let folder = self.current_or_err()?.folder_link_id();
        Ok(self.uploads.status().await?.placeholders_for(folder))
    }

    pub async fn upload_status(&self) -> Result<QueueStatus, FilesError> {
        Ok(self.uploads.status().await?)
    }

    // ------------------------------------------------------------------
    // Downloads
    // ------------------------------------------------------------------

    /// Queue a synced file for download
    pub async fn download(&self, entry: &FileEntry) -> Result<TransferTicket<PathBuf>, FilesError> {
        let item = PendingTransferItem::download(entry)?;
        let mut tickets = self.downloads.enqueue(vec![item]).await?;
        tickets
            .pop()
            .ok_or(FilesError::Transfer(TransferError::QueueClosed))
    }

    /// Abandon the download in flight
    pub async fn cancel_download(&self) -> Result<CancelOutcome, FilesError> {
        Ok(self.downloads.cancel_in_flight().await?)
    }

    /// Remove a waiting download
    pub async fn cancel_queued_download(&self, id: QueueItemId) -> Result<CancelOutcome, FilesError> {
        Ok(self.downloads.cancel(id).await?)
    }

    /// Pending downloads as placeholders, head first
    pub async fn download_queue(&self) -> Result<Vec<FileEntry>, FilesError> {
        Ok(self.downloads.status().await?.placeholders())
    }

    pub async fn download_status(&self) -> Result<QueueStatus, FilesError> {
        Ok(self.downloads.status().await?)
    }
}
