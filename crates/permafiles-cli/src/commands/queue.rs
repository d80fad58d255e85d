//! Queue command - inspect, resume or clear stored transfer queues
//!
//! Queues are snapshotted to the queue database after every change, so a
//! run that exits early leaves its pending items behind. `show` and `clear`
//! work on the database alone; `resume` opens a session and waits until
//! every restored queue has drained.

use std::collections::HashSet;

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use permafiles_core::{
    domain::{PendingTransferItem, QueueSnapshot, TransferDirection},
    ports::{IQueueSnapshotStore, SyncEvent},
};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::session::{open_store, CliContext, Session};
use crate::output::human_size;

/// Direction filter for queue commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    Upload,
    Download,
    All,
}

impl DirectionArg {
    fn directions(self) -> Vec<TransferDirection> {
        match self {
            Self::Upload => vec![TransferDirection::Upload],
            Self::Download => vec![TransferDirection::Download],
            Self::All => vec![TransferDirection::Upload, TransferDirection::Download],
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// List items left in the stored queues
    Show,
    /// Run the stored queues to completion
    Resume,
    /// Forget stored queue items
    Clear {
        #[arg(long, value_enum, default_value = "all")]
        direction: DirectionArg,
    },
}

impl QueueCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            QueueCommand::Show => self.execute_show(ctx).await,
            QueueCommand::Resume => self.execute_resume(ctx).await,
            QueueCommand::Clear { direction } => self.execute_clear(ctx, *direction).await,
        }
    }

    async fn execute_show(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let store = open_store(&ctx.load_config()?).await?;

        let mut snapshots = Vec::new();
        for direction in DirectionArg::All.directions() {
            let snapshot = store
                .load(direction)
                .await
                .with_context(|| format!("Failed to read the {direction} queue"))?
                .unwrap_or_else(|| QueueSnapshot::new(direction, Vec::new()));
            snapshots.push(snapshot);
        }

        if ctx.format.is_json() {
            formatter.print_json(&Value::Array(snapshots.iter().map(snapshot_json).collect()));
            return Ok(());
        }

        for snapshot in &snapshots {
            if snapshot.items.is_empty() {
                formatter.info(&format!("{} queue: empty", snapshot.direction));
                continue;
            }
            formatter.success(&format!(
                "{} queue: {} item{} (saved {})",
                snapshot.direction,
                snapshot.items.len(),
                if snapshot.items.len() == 1 { "" } else { "s" },
                snapshot.saved_at.format("%Y-%m-%d %H:%M:%S")
            ));
            for item in &snapshot.items {
                println!("{}", item_line(item));
            }
        }
        Ok(())
    }

    async fn execute_resume(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let session = Session::connect(ctx).await?;
        let mut events = session.coordinator().events().channel();
        session.start().await?;

        let mut waiting: HashSet<TransferDirection> = HashSet::new();
        if !session.coordinator().upload_status().await?.is_empty() {
            waiting.insert(TransferDirection::Upload);
        }
        if !session.coordinator().download_status().await?.is_empty() {
            waiting.insert(TransferDirection::Download);
        }
        if waiting.is_empty() {
            formatter.success("Nothing to resume");
            return Ok(());
        }
        info!(queues = waiting.len(), "waiting for stored queues");

        let mut completed = 0usize;
        let mut failed = 0usize;
        while !waiting.is_empty() {
            let Some(event) = events.recv().await else {
                warn!("event stream closed before the queues drained");
                break;
            };
            match &event {
                SyncEvent::UploadSynced { entry, .. } => {
                    completed += 1;
                    formatter.info(&format!("\u{2713} uploaded {}", entry.name));
                }
                SyncEvent::DownloadCompleted { local_path, .. } => {
                    completed += 1;
                    formatter.info(&format!("\u{2713} downloaded {}", local_path.display()));
                }
                SyncEvent::TransferFailed {
                    direction, message, ..
                } => {
                    failed += 1;
                    formatter.warn(&format!("{direction} failed: {message}"));
                }
                SyncEvent::QueueDrained { direction } => {
                    waiting.remove(direction);
                }
                _ => {}
            }
        }

        if ctx.format.is_json() {
            formatter.print_json(&json!({
                "success": failed == 0,
                "completed": completed,
                "failed": failed,
            }));
        } else if failed == 0 {
            formatter.success(&format!("Resumed {completed} transfer(s)"));
        } else {
            formatter.error(&format!("{completed} transfer(s) done, {failed} failed"));
        }
        Ok(())
    }

    async fn execute_clear(&self, ctx: &CliContext, direction: DirectionArg) -> Result<()> {
        let formatter = ctx.formatter();
        let store = open_store(&ctx.load_config()?).await?;

        let directions = direction.directions();
        for direction in &directions {
            store
                .clear(*direction)
                .await
                .with_context(|| format!("Failed to clear the {direction} queue"))?;
            info!(direction = %direction, "queue snapshot cleared");
        }

        let names: Vec<&str> = directions.iter().map(|d| d.name()).collect();
        if ctx.format.is_json() {
            formatter.print_json(&json!({ "success": true, "cleared": names }));
        } else {
            formatter.success(&format!("Cleared {} queue(s)", names.join(" and ")));
        }
        Ok(())
    }
}

fn item_line(item: &PendingTransferItem) -> String {
    format!(
        "  {:>9}  {}  (queued {})",
        human_size(item.size_bytes),
        item.display_name,
        item.enqueued_at.format("%Y-%m-%d %H:%M")
    )
}

fn snapshot_json(snapshot: &QueueSnapshot) -> Value {
    json!({
        "direction": snapshot.direction.name(),
        "saved_at": snapshot.saved_at.to_rfc3339(),
        "items": snapshot.items.iter().map(|item| json!({
            "id": item.id.to_string(),
            "name": item.display_name,
            "size": item.size_bytes,
            "mime_type": item.mime_type,
            "enqueued_at": item.enqueued_at.to_rfc3339(),
        })).collect::<Vec<_>>(),
    })
}
