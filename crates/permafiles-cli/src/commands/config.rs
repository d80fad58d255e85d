//! Config command - view and manage the Permafiles configuration
//!
//! `show` prints the file in effect, `set` edits one dot-notation key and
//! saves it back, and `validate` reports every problem in the file.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use permafiles_core::{
    config::Config,
    domain::{AccessRole, SortOption},
};
use serde_json::json;
use tracing::info;

use super::session::CliContext;

/// Keys accepted by `config set`, with a short description each
const SUPPORTED_KEYS: [(&str, &str); 11] = [
    ("api.base_url", "Service base URL"),
    ("api.api_key", "API key (\"none\" to clear)"),
    ("api.request_timeout_secs", "Seconds before a JSON call times out"),
    ("session.archive_number", "Archive to browse (\"none\" to clear)"),
    ("session.default_sort", "name_asc|name_desc|date_asc|date_desc"),
    ("session.access_role", "viewer|contributor|editor|curator|manager|owner|none"),
    ("transfers.download_dir", "Directory for downloaded files"),
    ("transfers.queue_db", "Queue snapshot database"),
    ("transfers.progress_granularity_percent", "Progress event step (1-100)"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.file", "Log file path (\"none\" for stderr)"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "api.base_url")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value),
            ConfigCommand::Validate => self.execute_validate(ctx),
        }
    }

    fn execute_show(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = ctx.config_path();
        let config = ctx.load_config()?;
        info!(config_path = %config_path.display(), "showing configuration");

        if ctx.format.is_json() {
            let value = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&value);
            return Ok(());
        }

        formatter.success(&format!("Configuration ({})", config_path.display()));
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
        Ok(())
    }

    fn execute_set(&self, ctx: &CliContext, key: &str, value: &str) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = ctx.config_path();
        let mut config = ctx.load_config()?;
        info!(key, value, "setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if ctx.format.is_json() {
                formatter.print_json(&json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{key}': {e}"));
                formatter.info("");
                formatter.info("Supported keys:");
                for (name, description) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {name:<40} - {description}"));
                }
            }
            std::process::exit(1);
        }

        // Only the edited key can make the file invalid here.
        let errors: Vec<String> = config
            .validate()
            .into_iter()
            .filter(|e| e.field == key)
            .map(|e| e.message)
            .collect();
        if !errors.is_empty() {
            if ctx.format.is_json() {
                formatter.print_json(&json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "errors": errors,
                }));
            } else {
                formatter.error(&format!("Invalid value for '{key}': {}", errors.join("; ")));
            }
            std::process::exit(1);
        }

        config
            .save(&config_path)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        if ctx.format.is_json() {
            formatter.print_json(&json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {key} = {value}"));
            formatter.info(&format!("Saved to {}", config_path.display()));
        }
        Ok(())
    }

    fn execute_validate(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = ctx.config_path();

        if !config_path.exists() {
            if ctx.format.is_json() {
                formatter.print_json(&json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": ["Configuration file not found. Using defaults."],
                }));
            } else {
                formatter.info(&format!(
                    "Configuration file not found at {}",
                    config_path.display()
                ));
                formatter.info(
                    "Using default configuration. Run 'permafiles config set <key> <value>' to create one.",
                );
            }
            return Ok(());
        }

        let config = match Config::load(&config_path) {
            Ok(config) => config,
            Err(e) => {
                if ctx.format.is_json() {
                    formatter.print_json(&json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [format!("Failed to parse configuration: {e}")],
                    }));
                } else {
                    formatter.error(&format!("Failed to parse configuration: {e}"));
                    formatter.info(&format!("File: {}", config_path.display()));
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "validating configuration");
        let errors = config.validate();

        if ctx.format.is_json() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": messages,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }
        Ok(())
    }
}

/// `None` for an empty value or the literal `none`
fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value.to_string())
    }
}

/// Apply a dot-notation key/value pair to a [`Config`]
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "api.base_url" => config.api.base_url = value.trim_end_matches('/').to_string(),
        "api.api_key" => config.api.api_key = optional(value),
        "api.request_timeout_secs" => {
            config.api.request_timeout_secs = value
                .parse::<u64>()
                .context("Expected a positive integer for api.request_timeout_secs")?;
        }
        "session.archive_number" => config.session.archive_number = optional(value),
        "session.default_sort" => {
            config.session.default_sort = value.parse::<SortOption>()?;
        }
        "session.access_role" => {
            config.session.access_role = optional(value)
                .map(|role| role.parse::<AccessRole>())
                .transpose()?;
        }
        "transfers.download_dir" => config.transfers.download_dir = PathBuf::from(value),
        "transfers.queue_db" => config.transfers.queue_db = PathBuf::from(value),
        "transfers.progress_granularity_percent" => {
            config.transfers.progress_granularity_percent = value
                .parse::<u8>()
                .context("Expected an integer between 1 and 100")?;
        }
        "logging.level" => config.logging.level = value.to_lowercase(),
        "logging.file" => config.logging.file = optional(value).map(PathBuf::from),
        _ => bail!("Unknown configuration key: '{key}'"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_base_url_trims_trailing_slash() {
        let mut config = Config::default();
        apply_config_value(&mut config, "api.base_url", "https://example.org/api/").unwrap();
        assert_eq!(config.api.base_url, "https://example.org/api");
    }

    #[test]
    fn test_apply_api_key_and_clear() {
        let mut config = Config::default();
        apply_config_value(&mut config, "api.api_key", "secret").unwrap();
        assert_eq!(config.api.api_key.as_deref(), Some("secret"));
        apply_config_value(&mut config, "api.api_key", "none").unwrap();
        assert_eq!(config.api.api_key, None);
    }

    #[test]
    fn test_apply_request_timeout() {
        let mut config = Config::default();
        apply_config_value(&mut config, "api.request_timeout_secs", "45").unwrap();
        assert_eq!(config.api.request_timeout_secs, 45);
        assert!(apply_config_value(&mut config, "api.request_timeout_secs", "soon").is_err());
    }

    #[test]
    fn test_apply_default_sort() {
        let mut config = Config::default();
        apply_config_value(&mut config, "session.default_sort", "date_desc").unwrap();
        assert_eq!(config.session.default_sort, SortOption::DateDesc);
        assert!(apply_config_value(&mut config, "session.default_sort", "size").is_err());
    }

    #[test]
    fn test_apply_access_role_and_clear() {
        let mut config = Config::default();
        apply_config_value(&mut config, "session.access_role", "access.role.editor").unwrap();
        assert_eq!(config.session.access_role, Some(AccessRole::Editor));
        apply_config_value(&mut config, "session.access_role", "none").unwrap();
        assert_eq!(config.session.access_role, None);
        assert!(apply_config_value(&mut config, "session.access_role", "admin").is_err());
    }

    #[test]
    fn test_apply_transfer_paths() {
        let mut config = Config::default();
        apply_config_value(&mut config, "transfers.download_dir", "/tmp/dl").unwrap();
        apply_config_value(&mut config, "transfers.queue_db", "/tmp/q.db").unwrap();
        assert_eq!(config.transfers.download_dir, PathBuf::from("/tmp/dl"));
        assert_eq!(config.transfers.queue_db, PathBuf::from("/tmp/q.db"));
    }

    #[test]
    fn test_apply_granularity_rejects_overflow() {
        let mut config = Config::default();
        apply_config_value(&mut config, "transfers.progress_granularity_percent", "5").unwrap();
        assert_eq!(config.transfers.progress_granularity_percent, 5);
        assert!(
            apply_config_value(&mut config, "transfers.progress_granularity_percent", "300")
                .is_err()
        );
    }

    #[test]
    fn test_apply_logging() {
        let mut config = Config::default();
        apply_config_value(&mut config, "logging.level", "DEBUG").unwrap();
        apply_config_value(&mut config, "logging.file", "/var/log/pf.log").unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/pf.log")));
    }

    #[test]
    fn test_apply_unknown_key() {
        let mut config = Config::default();
        let err = apply_config_value(&mut config, "sync.root", "/x").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_every_supported_key_is_accepted() {
        let sample = |key: &str| match key {
            "api.base_url" => "https://example.org/api",
            "session.default_sort" => "name_asc",
            "session.access_role" => "owner",
            "logging.level" => "info",
            k if k.ends_with("_secs") || k.ends_with("_percent") => "10",
            _ => "value",
        };
        for (key, _) in SUPPORTED_KEYS {
            let mut config = Config::default();
            assert!(
                apply_config_value(&mut config, key, sample(key)).is_ok(),
                "{key} rejected"
            );
        }
    }
}
