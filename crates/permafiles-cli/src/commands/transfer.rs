//! Upload and download commands
//!
//! Both commands queue their items, print queue events while they run and
//! wait on every ticket before exiting. Items interrupted by an earlier run
//! are resumed first, so they may finish ahead of the new ones.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use permafiles_core::{
    domain::{Permission, QueueItemId},
    ports::SyncEvent,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::session::{CliContext, Session};
use crate::output::{entry_json, OutputFormat};

/// Arguments for `upload`
#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Local files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Destination folder path (default: the archive root)
    #[arg(long, default_value = "")]
    pub to: String,
}

impl UploadCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let session = Session::connect(ctx).await?;
        let events = session.coordinator().events().channel();
        session.start().await?;

        let folder = session.open_folder(&self.to).await?;
        if !folder.folder().can(Permission::Create) {
            bail!("You may not upload into '{}'", folder.folder().name);
        }

        let tickets = session
            .coordinator()
            .upload(self.files.clone())
            .await
            .context("Failed to queue uploads")?;
        let ids: HashSet<QueueItemId> = tickets.iter().map(|t| t.id()).collect();
        let reporter = spawn_reporter(events, ids, ctx.format, ctx.quiet);

        let mut synced = Vec::new();
        let mut failures = 0usize;
        for ticket in tickets {
            match ticket.outcome().await {
                Ok(entry) => synced.push(entry),
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, "upload failed");
                }
            }
        }
        reporter.abort();
        info!(synced = synced.len(), failures, "uploads finished");

        if ctx.format.is_json() {
            formatter.print_json(&json!({
                "success": failures == 0,
                "folder": folder.folder().name,
                "uploaded": synced.iter().map(entry_json).collect::<Vec<_>>(),
                "failed": failures,
            }));
        } else if failures == 0 {
            formatter.success(&format!(
                "Uploaded {} file{} into '{}'",
                synced.len(),
                if synced.len() == 1 { "" } else { "s" },
                folder.folder().name
            ));
        } else {
            formatter.error(&format!(
                "{failures} of {} uploads failed",
                synced.len() + failures
            ));
        }
        if failures > 0 {
            std::process::exit(1);
        }
        Ok(())
    }
}

/// Arguments for `download`
#[derive(Debug, Args)]
pub struct DownloadCommand {
    /// Remote file path
    pub path: String,

    /// Also copy the downloaded file here
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl DownloadCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let session = Session::connect(ctx).await?;
        let events = session.coordinator().events().channel();
        session.start().await?;

        let entry = session.locate(&self.path).await?;
        let ticket = session.coordinator().download(&entry).await?;
        let reporter = spawn_reporter(
            events,
            HashSet::from([ticket.id()]),
            ctx.format,
            ctx.quiet,
        );
        let outcome = ticket.outcome().await;
        reporter.abort();
        let cached = outcome.with_context(|| format!("Download of '{}' failed", entry.name))?;

        let local_path = match &self.output {
            Some(target) => {
                let target = if target.is_dir() {
                    target.join(&entry.name)
                } else {
                    target.clone()
                };
                tokio::fs::copy(&cached, &target)
                    .await
                    .with_context(|| format!("Failed to copy to {}", target.display()))?;
                target
            }
            None => cached,
        };

        if ctx.format.is_json() {
            formatter.print_json(&json!({
                "success": true,
                "file": entry_json(&entry),
                "local_path": local_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!(
                "Downloaded '{}' to {}",
                entry.name,
                local_path.display()
            ));
        }
        Ok(())
    }
}

/// Print queue events for `ids` until aborted
fn spawn_reporter(
    mut events: mpsc::UnboundedReceiver<SyncEvent>,
    ids: HashSet<QueueItemId>,
    format: OutputFormat,
    quiet: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if quiet || format.is_json() {
                continue;
            }
            if let Some(line) = describe_event(&event, &ids) {
                eprintln!("{line}");
            }
        }
    })
}

/// One progress line for events about the tracked items
fn describe_event(event: &SyncEvent, ids: &HashSet<QueueItemId>) -> Option<String> {
    match event {
        SyncEvent::TransferQueued {
            item_id,
            display_name,
            direction,
            ..
        } if !ids.contains(item_id) => Some(format!("  resuming {direction} of {display_name}")),
        SyncEvent::TransferProgress {
            item_id, fraction, ..
        } if ids.contains(item_id) => {
            let percent = (fraction * 100.0).round() as u32;
            (percent % 10 == 0).then(|| format!("  {percent:>3}%"))
        }
        SyncEvent::UploadSynced { item_id, entry } if ids.contains(item_id) => {
            Some(format!("  \u{2713} {}", entry.name))
        }
        SyncEvent::TransferFailed {
            item_id, message, ..
        } if ids.contains(item_id) => Some(format!("  \u{2717} {message}")),
        _ => None,
    }
}
