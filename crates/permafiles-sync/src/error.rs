//! Error types for the engines
//!
//! Each engine has its own error enum. All of them are `Clone` so a single
//! failure can be delivered to a completion ticket and described in an
//! event at the same time.

use permafiles_core::{
    domain::DomainError, envelope::EnvelopeError, ports::DispatchError,
};
use thiserror::Error;

/// Failures of a call made through the folder repository
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The server rejected the call or answered with an unusable body
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// The call never produced a usable answer
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A value from the server did not pass domain validation
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl RepositoryError {
    /// Returns true if the underlying call was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Dispatch(DispatchError::Cancelled))
    }
}

/// Terminal failure of one queued transfer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Upload metadata registration failed; no bytes were sent
    #[error("Registration failed: {0}")]
    Registration(#[source] RepositoryError),

    /// Download metadata lookup failed; no bytes were fetched
    #[error("Could not resolve download: {0}")]
    Resolution(#[source] RepositoryError),

    /// The binary phase failed after metadata succeeded
    #[error("Transfer failed: {0}")]
    Binary(#[source] RepositoryError),

    /// The downloaded bytes could not be stored locally
    #[error("Local storage failed: {0}")]
    Storage(String),

    /// The item cannot be processed by this queue
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    /// The item was cancelled before completing
    #[error("Transfer cancelled")]
    Cancelled,

    /// The queue stopped before delivering an outcome
    #[error("Transfer abandoned")]
    Abandoned,

    /// The queue task is no longer running
    #[error("Transfer queue is closed")]
    QueueClosed,
}

/// Failures of the navigation state machine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// The archive root could not be resolved. The browsing session cannot
    /// continue.
    #[error("Archive root unavailable: {0}")]
    RootUnavailable(#[source] RepositoryError),

    /// A folder could not be resolved; the stack is unchanged
    #[error("Could not open folder: {0}")]
    Resolution(#[source] RepositoryError),

    /// Navigation was attempted before the root frame exists
    #[error("Browsing session not started")]
    NotStarted,

    /// The entry cannot be opened as a folder
    #[error("Not a folder: {0}")]
    NotAFolder(String),
}

impl NavigationError {
    /// Returns true if the browsing session must be abandoned
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RootUnavailable(_))
    }
}

/// Failures surfaced by the files coordinator
#[derive(Debug, Error)]
pub enum FilesError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// No folder is open yet
    #[error("No folder is open")]
    NoCurrentFolder,

    /// A local file could not be inspected
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
