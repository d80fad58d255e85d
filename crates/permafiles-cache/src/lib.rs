//! Permafiles Cache - Local queue persistence
//!
//! SQLite-backed storage for pending upload and download queues, so that
//! transfers interrupted by a crash or restart can be re-enqueued on the
//! next start.
//!
//! ## Architecture
//!
//! This crate implements the `IQueueSnapshotStore` port from
//! `permafiles-core`. It is a driven (secondary) adapter in the hexagonal
//! architecture.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use permafiles_cache::{DatabasePool, SqliteQueueStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/permafiles/queue.db")).await?;
//! let store = SqliteQueueStore::new(pool.pool().clone());
//! // Hand `store` to the files coordinator...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod store;

pub use pool::DatabasePool;
pub use store::SqliteQueueStore;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::SerializationError(e.to_string())
    }
}
