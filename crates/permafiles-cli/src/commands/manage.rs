//! Folder edit commands - mkdir, rm, mv and cp
//!
//! Each command opens the parent folder of its target so the edit goes
//! through that folder's listing, exactly as an interactive client would.

use anyhow::{bail, Context, Result};
use clap::Args;
use permafiles_core::{domain::Permission, endpoint::RelocateAction};
use serde_json::json;
use tracing::info;

use super::session::{components, split_parent, CliContext, Session};
use crate::output::entry_json;

/// Arguments for `mkdir`
#[derive(Debug, Args)]
pub struct MkdirCommand {
    /// Path of the new folder, e.g. `Photos/2024`
    pub path: String,
}

impl MkdirCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let (parent, name) = split_parent(&self.path)?;
        let session = Session::open(ctx).await?;
        let folder = session.open_folder(&parent).await?;
        if !folder.folder().can(Permission::Create) {
            bail!("You may not create folders in '{}'", folder.folder().name);
        }

        let created = session.coordinator().create_folder(name).await?;
        info!(name = %created.name, "folder created");

        if ctx.format.is_json() {
            formatter.print_json(&entry_json(&created));
        } else {
            formatter.success(&format!("Created folder '{}'", created.name));
        }
        Ok(())
    }
}

/// Arguments for `rm`
#[derive(Debug, Args)]
pub struct RmCommand {
    /// Path of the file or folder to delete
    pub path: String,
}

impl RmCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let session = Session::open(ctx).await?;
        let entry = session.locate(&self.path).await?;
        if !entry.can(Permission::Delete) {
            bail!("You may not delete '{}'", entry.name);
        }

        session.coordinator().delete(&entry).await?;
        info!(name = %entry.name, "deleted");

        if ctx.format.is_json() {
            formatter.print_json(&json!({"success": true, "deleted": entry_json(&entry)}));
        } else {
            formatter.success(&format!("Deleted '{}'", entry.name));
        }
        Ok(())
    }
}

/// Arguments for `mv` and `cp`
#[derive(Debug, Args)]
pub struct RelocateCommand {
    /// Path of the item to move or copy
    pub source: String,
    /// Path of the destination folder (empty or `/` for the root)
    pub destination: String,
}

impl RelocateCommand {
    pub async fn execute(&self, ctx: &CliContext, action: RelocateAction) -> Result<()> {
        let formatter = ctx.formatter();
        let session = Session::open(ctx).await?;

        // The destination is resolved first; the source's folder must be
        // the one on display when the edit runs.
        let destination = if components(&self.destination).next().is_none() {
            session
                .coordinator()
                .navigator()
                .stack()
                .first()
                .map(|frame| frame.folder().clone())
                .context("No folder is open")?
        } else {
            session.locate(&self.destination).await?
        };
        if !destination.is_folder {
            bail!("'{}' is not a folder", destination.name);
        }
        if !destination.can(Permission::Create) {
            bail!("You may not add items to '{}'", destination.name);
        }
        session.back_to_root().await;

        let entry = session.locate(&self.source).await?;
        let required = match action {
            RelocateAction::Move => Permission::Move,
            RelocateAction::Copy => Permission::Read,
        };
        if !entry.can(required) {
            bail!("You may not {action} '{}'", entry.name);
        }

        session
            .coordinator()
            .relocate(&entry, &destination, action)
            .await?;
        info!(name = %entry.name, destination = %destination.name, %action, "relocated");

        if ctx.format.is_json() {
            formatter.print_json(&json!({
                "success": true,
                "action": action.name(),
                "item": entry_json(&entry),
                "destination": entry_json(&destination),
            }));
        } else {
            let verb = match action {
                RelocateAction::Move => "Moved",
                RelocateAction::Copy => "Copied",
            };
            formatter.success(&format!("{verb} '{}' into '{}'", entry.name, destination.name));
        }
        Ok(())
    }
}
