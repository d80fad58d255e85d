//! Permafiles CLI - Command-line interface for a Permanent archive
//!
//! Provides commands for:
//! - Browsing folders and searching a listing
//! - Uploading and downloading files through the serial transfer queues
//! - Creating, deleting, moving and copying items
//! - Managing the share links of items
//! - Inspecting and resuming queues left over from an earlier run
//! - Viewing and editing the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use permafiles_core::{config::Config, endpoint::RelocateAction};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    browse::LsCommand,
    completions::CompletionsCommand,
    config::ConfigCommand,
    manage::{MkdirCommand, RelocateCommand, RmCommand},
    queue::QueueCommand,
    session::CliContext,
    share::ShareCommand,
    transfer::{DownloadCommand, UploadCommand},
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "permafiles", version, about = "Browse and sync a Permanent archive")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List a folder
    Ls(LsCommand),
    /// Upload local files into a folder
    Upload(UploadCommand),
    /// Download a file into the local cache
    Download(DownloadCommand),
    /// Create a folder
    Mkdir(MkdirCommand),
    /// Delete a file or folder
    Rm(RmCommand),
    /// Move an item into another folder
    Mv(RelocateCommand),
    /// Copy an item into another folder
    Cp(RelocateCommand),
    /// Show, create, update or revoke share links
    #[command(subcommand)]
    Share(ShareCommand),
    /// Inspect, resume or clear pending transfer queues
    #[command(subcommand)]
    Queue(QueueCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let log_file = config.logging.file.as_ref().and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);
    match log_file {
        Some(file) => builder
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init(),
        None => builder.with_writer(std::io::stderr).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = CliContext::new(cli.config.clone(), format, cli.quiet);

    // Logging follows the configuration, so a broken file falls back to
    // defaults here and is reported by the command that needs it.
    let config = ctx.load_config().unwrap_or_default();
    init_tracing(&cli, &config);

    match cli.command {
        Commands::Ls(cmd) => cmd.execute(&ctx).await,
        Commands::Upload(cmd) => cmd.execute(&ctx).await,
        Commands::Download(cmd) => cmd.execute(&ctx).await,
        Commands::Mkdir(cmd) => cmd.execute(&ctx).await,
        Commands::Rm(cmd) => cmd.execute(&ctx).await,
        Commands::Mv(cmd) => cmd.execute(&ctx, RelocateAction::Move).await,
        Commands::Cp(cmd) => cmd.execute(&ctx, RelocateAction::Copy).await,
        Commands::Share(cmd) => cmd.execute(&ctx).await,
        Commands::Queue(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(&ctx).await,
    }
}
