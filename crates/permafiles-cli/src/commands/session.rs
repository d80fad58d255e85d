//! Shared command context
//!
//! Every networked command opens a [`Session`]: configuration, the HTTP
//! dispatcher, the download cache, the queue database and a started
//! [`FilesCoordinator`]. Remote paths are `/`-separated display names
//! starting at the archive's private files folder.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use permafiles_api::HttpDispatcher;
use permafiles_cache::{DatabasePool, SqliteQueueStore};
use permafiles_core::{config::Config, domain::FileEntry};
use permafiles_sync::{
    CoordinatorSettings, DiskFileStorage, FilesCoordinator, FolderContentViewModel,
};
use tracing::debug;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Global flags shared by every command
#[derive(Debug, Clone)]
pub struct CliContext {
    config_path: Option<PathBuf>,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl CliContext {
    pub fn new(config_path: Option<PathBuf>, format: OutputFormat, quiet: bool) -> Self {
        Self {
            config_path,
            format,
            quiet,
        }
    }

    /// Configuration file in effect (`--config` or the default location)
    pub fn config_path(&self) -> PathBuf {
        self.config_path.clone().unwrap_or_else(Config::default_path)
    }

    /// Load the configuration; a missing file yields the defaults
    pub fn load_config(&self) -> Result<Config> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(Config::default());
        }
        Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }
}

/// Opened queue database
pub async fn open_store(config: &Config) -> Result<SqliteQueueStore> {
    let pool = DatabasePool::new(&config.transfers.queue_db)
        .await
        .context("Failed to open queue database")?;
    Ok(SqliteQueueStore::new(pool.pool().clone()))
}

/// A coordinator wired to the real adapters
pub struct Session {
    coordinator: FilesCoordinator,
}

impl Session {
    /// Build the coordinator without contacting the server
    pub async fn connect(ctx: &CliContext) -> Result<Self> {
        let config = ctx.load_config()?;
        let errors = config.validate();
        if let Some(first) = errors.first() {
            bail!(
                "Invalid configuration ({} problem{}): {first}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            );
        }

        let dispatcher = HttpDispatcher::new(&config.api).context("Failed to set up HTTP client")?;
        let storage = DiskFileStorage::new(config.transfers.download_dir.clone());
        let store = open_store(&config).await?;

        let coordinator = FilesCoordinator::new(
            Arc::new(dispatcher),
            Arc::new(storage),
            Some(Arc::new(store)),
            CoordinatorSettings::from_config(&config),
        );
        Ok(Self { coordinator })
    }

    /// Connect and load the archive root
    pub async fn open(ctx: &CliContext) -> Result<Self> {
        let session = Self::connect(ctx).await?;
        session.start().await?;
        Ok(session)
    }

    pub async fn start(&self) -> Result<()> {
        self.coordinator
            .start()
            .await
            .context("Could not load the archive root")?;
        Ok(())
    }

    pub fn coordinator(&self) -> &FilesCoordinator {
        &self.coordinator
    }

    fn current(&self) -> Result<Arc<FolderContentViewModel>> {
        self.coordinator
            .current()
            .context("No folder is open")
    }

    /// Descend from the root into the folder at `path`
    pub async fn open_folder(&self, path: &str) -> Result<Arc<FolderContentViewModel>> {
        for name in components(path) {
            let entry = find_entry(&self.current()?.files(), name)?;
            if !entry.is_folder {
                bail!("'{name}' is not a folder");
            }
            debug!(folder = name, "descending");
            self.coordinator
                .navigate_into(&entry)
                .await
                .with_context(|| format!("Could not open '{name}'"))?;
        }
        self.current()
    }

    /// Pop back to the archive root
    pub async fn back_to_root(&self) {
        while self.coordinator.navigate_back().await {}
    }

    /// Open the parent of `path` and return the entry it names
    pub async fn locate(&self, path: &str) -> Result<FileEntry> {
        let (parent, name) = split_parent(path)?;
        let folder = self.open_folder(&parent).await?;
        find_entry(&folder.files(), name)
    }
}

/// Non-empty path components
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty() && *c != ".")
}

/// Split `path` into its parent path and final name
pub fn split_parent(path: &str) -> Result<(String, &str)> {
    let parts: Vec<&str> = components(path).collect();
    match parts.split_last() {
        Some((name, parent)) => Ok((parent.join("/"), *name)),
        None => bail!("A file or folder name is required"),
    }
}

/// Entry named `name` in a listing; exact match first, then case-insensitive
pub fn find_entry(files: &[FileEntry], name: &str) -> Result<FileEntry> {
    files
        .iter()
        .find(|f| f.name == name)
        .or_else(|| files.iter().find(|f| f.name.eq_ignore_ascii_case(name)))
        .cloned()
        .with_context(|| format!("No such file or folder: '{name}'"))
}
