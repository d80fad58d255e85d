//! Share links
//!
//! A share link is a public URL that lets other accounts request access to
//! one folder or record. Each item has at most one link; its settings decide
//! whether viewers see a preview before access is granted, whether requests
//! are approved automatically, and when the link stops working.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{FolderLinkId, ShareLinkId};

/// Adjustable settings of a share link
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLinkSettings {
    /// Viewers may preview the item before their request is approved
    pub preview: bool,
    /// Access requests are granted without owner review
    pub auto_approve: bool,
    /// Number of accepted requests after which the link closes; `None` is
    /// unlimited
    pub max_uses: Option<u32>,
    /// Moment the link stops accepting requests
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShareLinkSettings {
    /// Reject settings the server would refuse
    ///
    /// # Errors
    ///
    /// A use limit of zero is ambiguous on the wire, where zero means
    /// unlimited, so it is rejected.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_uses == Some(0) {
            return Err(DomainError::ValidationFailed(
                "max uses must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Share link of a folder or record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLink {
    pub id: ShareLinkId,
    /// Public URL handed to other people
    pub url: String,
    /// Token embedded in the URL
    pub token: Option<String>,
    /// Link of the shared item
    pub folder_link_id: Option<FolderLinkId>,
    pub settings: ShareLinkSettings,
    /// Requests accepted so far
    pub uses: u32,
}

impl ShareLink {
    /// Copy of the link carrying `settings`
    pub fn with_settings(&self, settings: ShareLinkSettings) -> Self {
        Self {
            settings,
            ..self.clone()
        }
    }

    /// Whether the link still accepts requests at `now`
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        let expired = self.settings.expires_at.is_some_and(|at| at <= now);
        let exhausted = self
            .settings
            .max_uses
            .is_some_and(|limit| self.uses >= limit);
        !expired && !exhausted
    }
}
