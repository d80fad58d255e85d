//! Ls command - list a folder
//!
//! Opens the folder at the given path, optionally re-requesting it in
//! another order or narrowing it with a search query, and prints the
//! listing together with any uploads still queued for it.

use anyhow::{Context, Result};
use clap::Args;
use permafiles_core::domain::SortOption;
use serde_json::json;
use tracing::info;

use super::session::{CliContext, Session};
use crate::output::{entry_json, entry_line};

#[derive(Debug, Args)]
pub struct LsCommand {
    /// Folder path from the archive root (default: the root)
    pub path: Option<String>,

    /// Listing order: name_asc, name_desc, date_asc or date_desc
    #[arg(long)]
    pub sort: Option<SortOption>,

    /// Only show entries whose name contains this text
    #[arg(long)]
    pub search: Option<String>,
}

impl LsCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let session = Session::open(ctx).await?;
        let path = self.path.as_deref().unwrap_or("");
        let folder = session.open_folder(path).await?;

        if let Some(sort) = self.sort {
            session
                .coordinator()
                .set_sort_option(sort)
                .await
                .context("Failed to re-sort the listing")?;
        }

        let files = match &self.search {
            Some(query) => session.coordinator().search(query)?.results().to_vec(),
            None => folder.files(),
        };
        let pending = session.coordinator().upload_placeholders().await?;
        let breadcrumbs = session.coordinator().navigator().breadcrumbs();
        info!(folder = %folder.folder().name, count = files.len(), "listing folder");

        if ctx.format.is_json() {
            formatter.print_json(&json!({
                "path": breadcrumbs,
                "sort": folder.sort_option().name(),
                "search": self.search,
                "files": files.iter().map(entry_json).collect::<Vec<_>>(),
                "pending_uploads": pending.iter().map(entry_json).collect::<Vec<_>>(),
            }));
            return Ok(());
        }

        formatter.success(&format!(
            "{} ({} item{}, {})",
            breadcrumbs.join(" / "),
            files.len(),
            if files.len() == 1 { "" } else { "s" },
            folder.sort_option()
        ));
        for entry in pending.iter().chain(files.iter()) {
            println!("{}", entry_line(entry));
        }
        Ok(())
    }
}
