//! Local file storage port (driven/secondary port)
//!
//! Completed downloads are written here, and the download engine checks it
//! for an existing copy before going to the network.
//!
//! Uses `anyhow::Result` because storage errors are adapter-specific.

use std::path::PathBuf;

/// Port for the local cache of downloaded files
#[async_trait::async_trait]
pub trait ILocalFileStorage: Send + Sync {
    /// Store `bytes` under `filename`, returning the local path
    async fn write(&self, bytes: &[u8], filename: &str) -> anyhow::Result<PathBuf>;

    /// Local path of `filename` if a copy already exists
    async fn read(&self, filename: &str) -> anyhow::Result<Option<PathBuf>>;
}
