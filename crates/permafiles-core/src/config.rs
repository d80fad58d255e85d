//! Configuration module for Permafiles.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{AccessRole, ArchiveNumber, SortOption};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Permafiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub transfers: TransfersConfig,
    pub logging: LoggingConfig,
}

/// Archive service connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the service, e.g. `https://www.permanent.org/api`.
    pub base_url: String,
    /// API key sent with every request envelope. `None` for anonymous use.
    pub api_key: Option<String>,
    /// Seconds before a single JSON call times out.
    pub request_timeout_secs: u64,
}

/// Browsing session settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Archive to browse. `None` until the user picks one.
    pub archive_number: Option<String>,
    /// Listing order requested when a folder is first opened.
    pub default_sort: SortOption,
    /// Role held on the archive, for items the server reports no
    /// permissions for. Read-only when unset.
    pub access_role: Option<AccessRole>,
}

/// Upload and download settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransfersConfig {
    /// Directory holding completed downloads.
    pub download_dir: PathBuf,
    /// SQLite file holding queue snapshots for crash recovery.
    pub queue_db: PathBuf,
    /// Minimum progress step, in percent, between two progress events.
    pub progress_granularity_percent: u8,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Optional log file; logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/permafiles/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("permafiles")
            .join("config.yaml")
    }

    /// The configured archive, validated.
    pub fn archive_number(&self) -> Option<ArchiveNumber> {
        self.session
            .archive_number
            .as_deref()
            .and_then(|n| ArchiveNumber::new(n).ok())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("permafiles")
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.permanent.org/api".to_string(),
            api_key: None,
            request_timeout_secs: 30,
        }
    }
}

impl Default for TransfersConfig {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            download_dir: data_dir.join("downloads"),
            queue_db: data_dir.join("queue.db"),
            progress_granularity_percent: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"api.base_url"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- api ---
        let url = self.api.base_url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            errors.push(ValidationError {
                field: "api.base_url".into(),
                message: format!("must be an http(s) URL, got '{}'", self.api.base_url),
            });
        }
        if self.api.request_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "api.request_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if matches!(self.api.api_key.as_deref(), Some(k) if k.trim().is_empty()) {
            errors.push(ValidationError {
                field: "api.api_key".into(),
                message: "must not be empty when set".into(),
            });
        }

        // --- session ---
        if let Some(number) = &self.session.archive_number {
            if let Err(e) = ArchiveNumber::new(number.as_str()) {
                errors.push(ValidationError {
                    field: "session.archive_number".into(),
                    message: e.to_string(),
                });
            }
        }

        // --- transfers ---
        let step = self.transfers.progress_granularity_percent;
        if step == 0 || step > 100 {
            errors.push(ValidationError {
                field: "transfers.progress_granularity_percent".into(),
                message: format!("must be between 1 and 100, got {step}"),
            });
        }
        if self.transfers.download_dir.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "transfers.download_dir".into(),
                message: "must not be empty".into(),
            });
        }
        if self.transfers.queue_db.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "transfers.queue_db".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`].
///
/// ```
/// use permafiles_core::config::ConfigBuilder;
/// use permafiles_core::domain::SortOption;
///
/// let config = ConfigBuilder::new()
///     .api_base_url("http://localhost:8080/api")
///     .session_default_sort(SortOption::DateDesc)
///     .build();
/// assert_eq!(config.session.default_sort, SortOption::DateDesc);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- api ---

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api.api_key = Some(key.into());
        self
    }

    pub fn api_request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.api.request_timeout_secs = seconds;
        self
    }

    // --- session ---

    pub fn session_archive_number(mut self, number: impl Into<String>) -> Self {
        self.config.session.archive_number = Some(number.into());
        self
    }

    pub fn session_default_sort(mut self, sort: SortOption) -> Self {
        self.config.session.default_sort = sort;
        self
    }

    pub fn session_access_role(mut self, role: AccessRole) -> Self {
        self.config.session.access_role = Some(role);
        self
    }

    // --- transfers ---

    pub fn transfers_download_dir(mut self, dir: PathBuf) -> Self {
        self.config.transfers.download_dir = dir;
        self
    }

    pub fn transfers_queue_db(mut self, path: PathBuf) -> Self {
        self.config.transfers.queue_db = path;
        self
    }

    pub fn transfers_progress_granularity_percent(mut self, percent: u8) -> Self {
        self.config.transfers.progress_granularity_percent = percent;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = Some(file);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
