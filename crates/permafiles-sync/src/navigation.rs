//! Folder navigation state machine
//!
//! A stack of frames, root first. Each frame owns the listing of the
//! folder it shows. The root frame is resolved once per session and is
//! never popped.
//!
//! ## Serialization
//!
//! Navigation requests are queued behind a lock and run one at a time, so
//! two overlapping `navigate_into` calls push in the order they were made
//! and never interleave. A frame is pushed only after its listing loaded;
//! a failed load leaves the stack untouched. The shared [`ActiveFolder`]
//! is moved to the new top before the lock is released, so it always names
//! the frame on top of the stack.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use permafiles_core::{
    domain::{FileEntry, FolderLinkId, SortOption},
    ports::SyncEvent,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::content::{ActiveFolder, FolderContentViewModel};
use crate::error::NavigationError;
use crate::events::EventBus;
use crate::repository::FolderRepository;

/// One entry of the back stack
#[derive(Clone)]
pub struct NavigationFrame {
    content: Arc<FolderContentViewModel>,
}

impl NavigationFrame {
    pub fn folder(&self) -> &FileEntry {
        self.content.folder()
    }

    pub fn folder_link_id(&self) -> FolderLinkId {
        self.content.folder_link_id()
    }

    pub fn display_name(&self) -> &str {
        &self.content.folder().name
    }

    pub fn content(&self) -> &Arc<FolderContentViewModel> {
        &self.content
    }
}

/// Back stack of opened folders
pub struct FolderNavigator {
    repository: Arc<FolderRepository>,
    events: EventBus,
    default_sort: SortOption,
    frames: RwLock<Vec<NavigationFrame>>,
    active: ActiveFolder,
    nav_lock: Mutex<()>,
}

impl FolderNavigator {
    pub fn new(repository: Arc<FolderRepository>, events: EventBus, default_sort: SortOption) -> Self {
        Self {
            repository,
            events,
            default_sort,
            frames: RwLock::new(Vec::new()),
            active: ActiveFolder::new(),
            nav_lock: Mutex::new(()),
        }
    }

    /// Track the top frame in `active`
    pub fn with_active(mut self, active: ActiveFolder) -> Self {
        self.active = active;
        self
    }

    /// Handle that follows the top frame
    pub fn active(&self) -> &ActiveFolder {
        &self.active
    }

    fn frames(&self) -> RwLockReadGuard<'_, Vec<NavigationFrame>> {
        self.frames.read().unwrap_or_else(|p| p.into_inner())
    }

    fn frames_mut(&self) -> RwLockWriteGuard<'_, Vec<NavigationFrame>> {
        self.frames.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Resolve and load the archive root
    ///
    /// Runs once; later calls return the existing root listing.
    ///
    /// # Errors
    ///
    /// `NavigationError::RootUnavailable` if the root cannot be resolved or
    /// listed. The session cannot continue in that case.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<Arc<FolderContentViewModel>, NavigationError> {
        let _guard = self.nav_lock.lock().await;
        let existing = self.frames().first().map(|root| Arc::clone(&root.content));
        if let Some(root) = existing {
            return Ok(root);
        }

        let root = self.repository.get_root().await.map_err(|e| {
            error!(error = %e, "could not resolve archive root");
            NavigationError::RootUnavailable(e)
        })?;
        let content = self
            .open(root, self.default_sort)
            .await
            .map_err(|e| match e {
                NavigationError::Resolution(inner) => NavigationError::RootUnavailable(inner),
                other => other,
            })?;
        info!(root = %content.folder().name, archive = %content.folder().archive_number, "browsing session started");
        self.push(Arc::clone(&content));
        Ok(content)
    }

    async fn open(
        &self,
        folder: FileEntry,
        sort: SortOption,
    ) -> Result<Arc<FolderContentViewModel>, NavigationError> {
        let name = folder.name.clone();
        let content = FolderContentViewModel::new(
            folder,
            sort,
            Arc::clone(&self.repository),
            self.events.clone(),
        )
        .map_err(|_| NavigationError::NotAFolder(name))?;
        content.refresh_folder().await.map_err(|e| {
            warn!(folder = %content.folder().name, error = %e, "could not open folder");
            NavigationError::Resolution(e)
        })?;
        Ok(Arc::new(content))
    }

    fn push(&self, content: Arc<FolderContentViewModel>) {
        self.active.set(&content);
        self.frames_mut().push(NavigationFrame { content });
        self.notify();
    }

    fn notify(&self) {
        let (depth, folder_link_id, breadcrumbs) = {
            let frames = self.frames();
            let Some(top) = frames.last() else {
                return;
            };
            (
                frames.len(),
                top.folder_link_id(),
                frames.iter().map(|f| f.display_name().to_string()).collect(),
            )
        };
        self.events.emit(SyncEvent::NavigationChanged {
            depth,
            folder_link_id,
            breadcrumbs,
        });
    }

    /// Open `folder` on top of the stack
    ///
    /// The new frame inherits the current frame's sort option.
    #[instrument(skip(self, folder), fields(folder = %folder.name))]
    pub async fn navigate_into(
        &self,
        folder: &FileEntry,
    ) -> Result<Arc<FolderContentViewModel>, NavigationError> {
        let _guard = self.nav_lock.lock().await;
        let sort = self
            .frames()
            .last()
            .map(|top| top.content.sort_option())
            .ok_or(NavigationError::NotStarted)?;
        if !folder.is_folder {
            return Err(NavigationError::NotAFolder(folder.name.clone()));
        }

        let content = self.open(folder.clone(), sort).await?;
        self.push(Arc::clone(&content));
        debug!(depth = self.depth(), "pushed frame");
        Ok(content)
    }

    /// Pop the top frame; does nothing at the root
    ///
    /// Returns true if a frame was popped.
    pub async fn navigate_back(&self) -> bool {
        let _guard = self.nav_lock.lock().await;
        let popped = {
            let mut frames = self.frames_mut();
            if frames.len() > 1 {
                frames.pop()
            } else {
                None
            }
        };
        match popped {
            Some(frame) => {
                debug!(folder = %frame.display_name(), "popped frame");
                drop(frame);
                match self.current() {
                    Some(top) => self.active.set(&top),
                    None => self.active.clear(),
                }
                self.notify();
                true
            }
            None => false,
        }
    }

    /// Listing on top of the stack
    pub fn current(&self) -> Option<Arc<FolderContentViewModel>> {
        self.frames().last().map(|f| Arc::clone(&f.content))
    }

    /// Snapshot of the stack, root first
    pub fn stack(&self) -> Vec<NavigationFrame> {
        self.frames().clone()
    }

    pub fn depth(&self) -> usize {
        self.frames().len()
    }

    /// Display names from root to current
    pub fn breadcrumbs(&self) -> Vec<String> {
        self.frames()
            .iter()
            .map(|f| f.display_name().to_string())
            .collect()
    }

    /// Whether a back affordance exists
    pub fn has_back(&self) -> bool {
        self.depth() > 1
    }
}
