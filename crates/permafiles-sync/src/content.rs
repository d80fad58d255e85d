//! Folder content view-model
//!
//! Owns the materialized child list of one open folder. The server is the
//! ordering authority: the listing is only ever replaced wholesale by a
//! fetch made with the active sort option, never re-sorted locally. Local
//! edits (a finished upload, a new folder) are prepended.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use permafiles_core::{
    domain::{DomainError, FileEntry, FolderLinkId, SortOption},
    endpoint::RelocateAction,
    ports::SyncEvent,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::RepositoryError;
use crate::events::EventBus;
use crate::repository::FolderRepository;
use crate::search::SearchOverlay;

#[derive(Debug, Default)]
struct ContentState {
    files: Vec<FileEntry>,
    is_loading: bool,
    sort: SortOption,
    search: Option<SearchOverlay>,
}

impl ContentState {
    /// Re-run the active query over the current files
    fn reapply_search(&mut self) {
        if let Some(overlay) = &self.search {
            let query = overlay.query().to_string();
            self.search = Some(SearchOverlay::apply(&query, &self.files));
        }
    }
}

/// Listing of one folder
pub struct FolderContentViewModel {
    folder: FileEntry,
    folder_link_id: FolderLinkId,
    repository: Arc<FolderRepository>,
    events: EventBus,
    state: RwLock<ContentState>,
    /// Serializes server fetches for this folder
    refresh_lock: Mutex<()>,
}

impl FolderContentViewModel {
    /// Create an empty, not yet loaded listing for `folder`
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationFailed` if `folder` is not a synced
    /// folder.
    pub fn new(
        folder: FileEntry,
        sort: SortOption,
        repository: Arc<FolderRepository>,
        events: EventBus,
    ) -> Result<Self, DomainError> {
        let folder_link_id = match folder.folder_link_id {
            Some(link) if folder.is_folder => link,
            _ => {
                return Err(DomainError::ValidationFailed(format!(
                    "'{}' is not a synced folder",
                    folder.name
                )))
            }
        };
        Ok(Self {
            folder,
            folder_link_id,
            repository,
            events,
            state: RwLock::new(ContentState {
                sort,
                ..ContentState::default()
            }),
            refresh_lock: Mutex::new(()),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, ContentState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ContentState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn folder(&self) -> &FileEntry {
        &self.folder
    }

    pub fn folder_link_id(&self) -> FolderLinkId {
        self.folder_link_id
    }

    /// Current listing in display order
    pub fn files(&self) -> Vec<FileEntry> {
        self.read().files.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.read().is_loading
    }

    pub fn sort_option(&self) -> SortOption {
        self.read().sort
    }

    /// Active search overlay, if any
    pub fn search_overlay(&self) -> Option<SearchOverlay> {
        self.read().search.clone()
    }

    fn files_updated(&self, count: usize) {
        self.events.emit(SyncEvent::FilesUpdated {
            folder_link_id: self.folder_link_id,
            count,
        });
    }

    /// Replace the listing with a fresh server fetch
    ///
    /// On failure the previous listing is kept.
    pub async fn refresh_folder(&self) -> Result<(), RepositoryError> {
        let sort = self.sort_option();
        self.load(sort).await
    }

    /// Refetch in a new order
    ///
    /// The option only takes effect once the listing in that order has
    /// arrived; a failed fetch keeps both the old order and the old files.
    pub async fn set_sort_option(&self, sort: SortOption) -> Result<(), RepositoryError> {
        self.load(sort).await
    }

    #[instrument(skip(self), fields(folder = %self.folder.name, folder_link_id = %self.folder_link_id))]
    async fn load(&self, sort: SortOption) -> Result<(), RepositoryError> {
        let _guard = self.refresh_lock.lock().await;
        self.write().is_loading = true;

        let result = self.repository.load_folder(&self.folder, sort).await;

        let count = {
            let mut state = self.write();
            state.is_loading = false;
            state.files = result?;
            state.sort = sort;
            state.reapply_search();
            state.files.len()
        };
        debug!(count, sort = %sort, "folder listing replaced");
        self.files_updated(count);
        Ok(())
    }

    /// Prepend `entry`, replacing any entry with the same link id
    pub fn insert_file(&self, entry: FileEntry) {
        let count = {
            let mut state = self.write();
            if let Some(link) = entry.folder_link_id {
                state.files.retain(|f| f.folder_link_id != Some(link));
            }
            state.files.insert(0, entry);
            state.reapply_search();
            state.files.len()
        };
        self.files_updated(count);
    }

    /// Remove the entry at `folder_link_id`, returning it
    pub fn remove_file(&self, folder_link_id: FolderLinkId) -> Option<FileEntry> {
        let (removed, count) = {
            let mut state = self.write();
            let index = state
                .files
                .iter()
                .position(|f| f.folder_link_id == Some(folder_link_id))?;
            let removed = state.files.remove(index);
            state.reapply_search();
            (removed, state.files.len())
        };
        self.files_updated(count);
        Some(removed)
    }

    /// Create a subfolder; it appears first in the listing
    pub async fn create_folder(&self, name: &str) -> Result<FileEntry, RepositoryError> {
        let created = self.repository.create_folder(&self.folder, name).await?;
        info!(folder = %self.folder.name, name = %created.name, "created folder");
        self.insert_file(created.clone());
        Ok(created)
    }

    /// Delete `entry` on the server and drop it from the listing
    pub async fn delete(&self, entry: &FileEntry) -> Result<(), RepositoryError> {
        self.repository.delete(entry).await?;
        info!(name = %entry.name, "deleted entry");
        if let Some(link) = entry.folder_link_id {
            self.remove_file(link);
        }
        Ok(())
    }

    /// Move or copy `entry` into `destination`
    ///
    /// A moved entry leaves this listing; a copy leaves it untouched.
    pub async fn relocate(
        &self,
        entry: &FileEntry,
        destination: &FileEntry,
        action: RelocateAction,
    ) -> Result<(), RepositoryError> {
        self.repository.relocate(entry, destination, action).await?;
        info!(name = %entry.name, destination = %destination.name, action = %action, "relocated entry");
        if action == RelocateAction::Move {
            if let Some(link) = entry.folder_link_id {
                self.remove_file(link);
            }
        }
        Ok(())
    }

    /// Filter the synced entries by `query`
    pub fn search(&self, query: &str) -> SearchOverlay {
        let mut state = self.write();
        let overlay = SearchOverlay::apply(query, &state.files);
        state.search = Some(overlay.clone());
        overlay
    }

    pub fn clear_search(&self) {
        self.write().search = None;
    }
}

impl std::fmt::Debug for FolderContentViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderContentViewModel")
            .field("folder", &self.folder.name)
            .field("folder_link_id", &self.folder_link_id)
            .finish_non_exhaustive()
    }
}

/// The listing currently on display, shared with the upload pipeline
///
/// Holds a weak reference so that a popped frame's listing is freed with
/// the frame.
#[derive(Clone, Default)]
pub struct ActiveFolder {
    slot: Arc<RwLock<Weak<FolderContentViewModel>>>,
}

impl ActiveFolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, content: &Arc<FolderContentViewModel>) {
        let mut slot = self.slot.write().unwrap_or_else(|p| p.into_inner());
        *slot = Arc::downgrade(content);
    }

    pub fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|p| p.into_inner());
        *slot = Weak::new();
    }

    /// The displayed listing, if it is still alive
    pub fn get(&self) -> Option<Arc<FolderContentViewModel>> {
        self.slot
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .upgrade()
    }

    /// The displayed listing if it shows `folder_link_id`
    pub fn showing(&self, folder_link_id: FolderLinkId) -> Option<Arc<FolderContentViewModel>> {
        self.get()
            .filter(|content| content.folder_link_id() == folder_link_id)
    }
}
