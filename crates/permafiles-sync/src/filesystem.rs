//! On-disk local file storage (secondary/driven adapter)
//!
//! Implements [`ILocalFileStorage`] over a single cache directory using
//! `tokio::fs`. Writes go to a temporary sibling first and are renamed into
//! place, so a crash never leaves a partial file under the final name and
//! `read` never reports a half-written download as cached.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use permafiles_core::ports::ILocalFileStorage;
use tracing::{debug, instrument};

/// Local storage rooted at one directory
#[derive(Debug, Clone)]
pub struct DiskFileStorage {
    root: PathBuf,
}

impl DiskFileStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for `filename`, refusing names that would leave the root
    fn resolve(&self, filename: &str) -> anyhow::Result<PathBuf> {
        let name = Path::new(filename);
        let plain = name.components().count() == 1
            && name.file_name().is_some_and(|n| n == name.as_os_str());
        if filename.is_empty() || !plain {
            anyhow::bail!("invalid cache file name '{filename}'");
        }
        Ok(self.root.join(name))
    }
}

#[async_trait::async_trait]
impl ILocalFileStorage for DiskFileStorage {
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    async fn write(&self, bytes: &[u8], filename: &str) -> anyhow::Result<PathBuf> {
        let target = self.resolve(filename)?;
        tokio::fs::create_dir_all(&self.root).await?;

        // Same directory, so the rename stays on one filesystem.
        let tmp_path = {
            let mut p = target.as_os_str().to_owned();
            p.push(".part");
            PathBuf::from(p)
        };

        debug!(?tmp_path, "writing to temporary file");
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &target).await?;

        debug!(path = %target.display(), "write complete");
        Ok(target)
    }

    #[instrument(skip(self))]
    async fn read(&self, filename: &str) -> anyhow::Result<Option<PathBuf>> {
        let target = self.resolve(filename)?;
        match tokio::fs::metadata(&target).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(target)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn storage() -> (TempDir, DiskFileStorage) {
        let dir = TempDir::new().unwrap();
        let storage = DiskFileStorage::new(dir.path().join("downloads"));
        (dir, storage)
    }

    #[tokio::test]
    async fn test_write_then_read_finds_file() {
        let (_dir, storage) = storage();

        let path = storage.write(b"hello", "7_a.txt").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello");
        assert_eq!(storage.read("7_a.txt").await.unwrap(), Some(path));
    }

    #[tokio::test]
    async fn test_missing_file_reads_none() {
        let (_dir, storage) = storage();
        assert_eq!(storage.read("nothing.bin").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_overwrites_and_leaves_no_temp_file() {
        let (_dir, storage) = storage();
        storage.write(b"one", "f.bin").await.unwrap();
        let path = storage.write(b"two", "f.bin").await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"two");
        let mut entries = tokio::fs::read_dir(storage.root()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["f.bin"]);
    }

    #[tokio::test]
    async fn test_names_with_separators_are_rejected() {
        let (_dir, storage) = storage();
        assert!(storage.write(b"x", "../escape.txt").await.is_err());
        assert!(storage.read("a/b.txt").await.is_err());
        assert!(storage.write(b"x", "").await.is_err());
    }

    #[tokio::test]
    async fn test_directory_is_not_a_cached_file() {
        let (_dir, storage) = storage();
        tokio::fs::create_dir_all(storage.root().join("sub"))
            .await
            .unwrap();
        assert_eq!(storage.read("sub").await.unwrap(), None);
    }
}
