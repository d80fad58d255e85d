//! Permafiles Sync - transfer queues, navigation and folder listings
//!
//! Provides:
//! - Serial upload and download queues with completion tickets
//! - Two-phase upload (record registration, then binary transfer)
//! - Download with local caching
//! - A folder navigation stack with per-folder listings
//! - Search over the listing on display
//!
//! ## Modules
//!
//! - [`queue`] - Generic serial transfer queue task and its handle
//! - [`upload`] / [`download`] - The two transfer pipelines
//! - [`repository`] - Typed calls over the request dispatcher port
//! - [`navigation`] - Back stack of opened folders
//! - [`content`] - Listing of one folder
//! - [`coordinator`] - Owner of one browsing session
//! - [`filesystem`] - On-disk local file storage

pub mod content;
pub mod coordinator;
pub mod download;
pub mod error;
pub mod events;
pub mod filesystem;
pub mod navigation;
pub mod queue;
pub mod repository;
pub mod search;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;

pub use content::{ActiveFolder, FolderContentViewModel};
pub use coordinator::{CoordinatorSettings, FilesCoordinator, RestoreReport};
pub use error::{FilesError, NavigationError, RepositoryError, TransferError};
pub use events::{ChannelObserver, EventBus};
pub use filesystem::DiskFileStorage;
pub use navigation::{FolderNavigator, NavigationFrame};
pub use queue::{CancelOutcome, QueueStatus, TransferQueueHandle, TransferTicket};
pub use repository::FolderRepository;
pub use search::SearchOverlay;
