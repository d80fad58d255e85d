//! Share command - manage the share links of archive items
//!
//! Every item has at most one share link. `create` returns the existing
//! link when there is one, `update` changes only the settings that were
//! given on the command line.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;
use permafiles_core::domain::{FileEntry, Permission, ShareLink, ShareLinkSettings};
use serde_json::{json, Value};
use tracing::info;

use super::session::{CliContext, Session};

#[derive(Debug, Subcommand)]
pub enum ShareCommand {
    /// Show the share link of an item
    Show {
        /// Path of the file or folder
        path: String,
    },
    /// Create a share link, or print the existing one
    Create {
        /// Path of the file or folder
        path: String,
    },
    /// Change the settings of an existing share link
    Update {
        /// Path of the file or folder
        path: String,
        /// Let viewers preview the item before access is granted
        #[arg(long)]
        preview: Option<bool>,
        /// Grant access requests without review
        #[arg(long)]
        auto_approve: Option<bool>,
        /// Close the link after this many uses (0 for unlimited)
        #[arg(long)]
        max_uses: Option<u32>,
        /// Expiry date as YYYY-MM-DD ("none" to clear)
        #[arg(long)]
        expires: Option<String>,
    },
    /// Revoke the share link of an item
    Drop {
        /// Path of the file or folder
        path: String,
    },
    /// List every share link of the archive
    List,
}

impl ShareCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let session = Session::open(ctx).await?;
        match self {
            ShareCommand::Show { path } => self.execute_show(ctx, &session, path).await,
            ShareCommand::Create { path } => self.execute_create(ctx, &session, path).await,
            ShareCommand::Update {
                path,
                preview,
                auto_approve,
                max_uses,
                expires,
            } => {
                let changes = SettingsChange {
                    preview: *preview,
                    auto_approve: *auto_approve,
                    max_uses: *max_uses,
                    expires: expires.as_deref().map(parse_expiry).transpose()?,
                };
                self.execute_update(ctx, &session, path, changes).await
            }
            ShareCommand::Drop { path } => self.execute_drop(ctx, &session, path).await,
            ShareCommand::List => self.execute_list(ctx, &session).await,
        }
    }

    async fn execute_show(&self, ctx: &CliContext, session: &Session, path: &str) -> Result<()> {
        let formatter = ctx.formatter();
        let entry = session.locate(path).await?;
        let link = session.coordinator().share_link(&entry).await?;

        if ctx.format.is_json() {
            formatter.print_json(&json!({
                "name": entry.name,
                "link": link.as_ref().map(link_json),
            }));
            return Ok(());
        }
        match link {
            Some(link) => print_link(ctx, &entry.name, &link),
            None => formatter.info(&format!("'{}' has no share link", entry.name)),
        }
        Ok(())
    }

    async fn execute_create(&self, ctx: &CliContext, session: &Session, path: &str) -> Result<()> {
        let formatter = ctx.formatter();
        let entry = shareable(session, path).await?;
        let link = session.coordinator().ensure_share_link(&entry).await?;

        if ctx.format.is_json() {
            formatter.print_json(&json!({"success": true, "name": entry.name, "link": link_json(&link)}));
        } else {
            print_link(ctx, &entry.name, &link);
        }
        Ok(())
    }

    async fn execute_update(
        &self,
        ctx: &CliContext,
        session: &Session,
        path: &str,
        changes: SettingsChange,
    ) -> Result<()> {
        let formatter = ctx.formatter();
        let entry = shareable(session, path).await?;
        let link = session
            .coordinator()
            .share_link(&entry)
            .await?
            .with_context(|| format!("'{}' has no share link; run `share create` first", entry.name))?;

        let settings = changes.apply(&link.settings);
        let updated = session
            .coordinator()
            .update_share_link(&link.with_settings(settings))
            .await?;
        info!(name = %entry.name, share_link_id = %updated.id, "share link updated");

        if ctx.format.is_json() {
            formatter.print_json(&json!({"success": true, "name": entry.name, "link": link_json(&updated)}));
        } else {
            print_link(ctx, &entry.name, &updated);
        }
        Ok(())
    }

    async fn execute_drop(&self, ctx: &CliContext, session: &Session, path: &str) -> Result<()> {
        let formatter = ctx.formatter();
        let entry = shareable(session, path).await?;
        let Some(link) = session.coordinator().share_link(&entry).await? else {
            bail!("'{}' has no share link", entry.name);
        };
        session.coordinator().drop_share_link(&link).await?;

        if ctx.format.is_json() {
            formatter.print_json(&json!({"success": true, "name": entry.name, "dropped": link.url}));
        } else {
            formatter.success(&format!("Revoked the share link of '{}'", entry.name));
        }
        Ok(())
    }

    async fn execute_list(&self, ctx: &CliContext, session: &Session) -> Result<()> {
        let formatter = ctx.formatter();
        let links = session.coordinator().share_links().await?;

        if ctx.format.is_json() {
            formatter.print_json(&Value::Array(links.iter().map(link_json).collect()));
            return Ok(());
        }
        if links.is_empty() {
            formatter.info("No share links");
            return Ok(());
        }
        for link in &links {
            println!("{}", link_line(link));
        }
        Ok(())
    }
}

/// Settings given on the command line; `None` keeps the current value
#[derive(Debug, Default)]
struct SettingsChange {
    preview: Option<bool>,
    auto_approve: Option<bool>,
    max_uses: Option<u32>,
    expires: Option<Option<DateTime<Utc>>>,
}

impl SettingsChange {
    fn apply(&self, current: &ShareLinkSettings) -> ShareLinkSettings {
        ShareLinkSettings {
            preview: self.preview.unwrap_or(current.preview),
            auto_approve: self.auto_approve.unwrap_or(current.auto_approve),
            max_uses: match self.max_uses {
                Some(0) => None,
                Some(limit) => Some(limit),
                None => current.max_uses,
            },
            expires_at: self.expires.unwrap_or(current.expires_at),
        }
    }
}

/// `none` clears the expiry; a date expires the link at its start, in UTC
fn parse_expiry(value: &str) -> Result<Option<DateTime<Utc>>> {
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Expected a date as YYYY-MM-DD, got '{value}'"))?;
    let start = date
        .and_hms_opt(0, 0, 0)
        .context("Date has no start of day")?;
    Ok(Some(start.and_utc()))
}

async fn shareable(session: &Session, path: &str) -> Result<FileEntry> {
    let entry = session.locate(path).await?;
    if !entry.can(Permission::Share) {
        bail!("You may not share '{}'", entry.name);
    }
    Ok(entry)
}

fn print_link(ctx: &CliContext, name: &str, link: &ShareLink) {
    let formatter = ctx.formatter();
    formatter.success(&format!("Share link of '{name}': {}", link.url));
    formatter.info(&link_line(link));
}

fn link_line(link: &ShareLink) -> String {
    let settings = &link.settings;
    let uses = match settings.max_uses {
        Some(limit) => format!("{}/{limit} uses", link.uses),
        None => format!("{} uses", link.uses),
    };
    let expires = settings
        .expires_at
        .map(|at| format!(", expires {}", at.format("%Y-%m-%d")))
        .unwrap_or_default();
    format!(
        "  {}  ({uses}{expires}{}{})",
        link.url,
        if settings.preview { ", preview" } else { "" },
        if settings.auto_approve { ", auto-approve" } else { "" },
    )
}

fn link_json(link: &ShareLink) -> Value {
    json!({
        "id": link.id.get(),
        "url": link.url,
        "folder_link_id": link.folder_link_id.map(|id| id.get()),
        "preview": link.settings.preview,
        "auto_approve": link.settings.auto_approve,
        "max_uses": link.settings.max_uses,
        "uses": link.uses,
        "expires_at": link.settings.expires_at.map(|at| at.to_rfc3339()),
    })
}
