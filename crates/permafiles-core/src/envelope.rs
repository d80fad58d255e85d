//! Request/Response envelope
//!
//! Every JSON call to the archive service answers with the same wrapper:
//!
//! ```text
//! {
//!   "isSuccessful": true,
//!   "csrf": "<next anti-forgery token>",
//!   "Results": [ { "data": [ { "FolderVO": { ... } } ], "message": [ "..." ] } ]
//! }
//! ```
//!
//! The envelope is validated once at the deserialization boundary. Anything
//! that does not fit the shape becomes a single [`EnvelopeError::Malformed`]
//! instead of a partially-filled object.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    AccessRole, ArchiveNumber, ArchiveSummary, CsrfToken, FileEntry, FolderId, FolderLinkId,
    Permission, PermissionSet, RecordId, ShareLink, ShareLinkId, ShareLinkSettings, SyncStatus,
};

/// User-facing message for any response the client cannot interpret
pub const GENERIC_ERROR_MESSAGE: &str = "There was an error processing your request.";

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while interpreting a response envelope
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The response does not have the expected shape
    #[error("There was an error processing your request.")]
    Malformed {
        /// Diagnostic detail, kept out of the user-facing message
        detail: String,
    },

    /// The server answered with `isSuccessful: false`
    #[error("{message}")]
    Rejected {
        /// First server message, or the generic message when none was sent
        message: String,
    },
}

impl EnvelopeError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }

    /// Message suitable for showing to a user
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

// ============================================================================
// Value objects
// ============================================================================

/// File rendition attached to a record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVO {
    #[serde(rename = "fileURL", default)]
    pub file_url: Option<String>,
    #[serde(rename = "downloadURL", default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(rename = "contentType", default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

/// Share of an item with another archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareVO {
    #[serde(rename = "accessRole", default)]
    pub access_role: Option<String>,
    #[serde(rename = "ArchiveVO", default)]
    pub archive: Option<ArchiveVO>,
}

/// Minimal archive description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveVO {
    #[serde(rename = "archiveNbr", default)]
    pub archive_nbr: Option<String>,
    #[serde(rename = "fullName", default)]
    pub full_name: Option<String>,
    #[serde(rename = "thumbURL200", default)]
    pub thumb_url_200: Option<String>,
}

/// Folder or record as returned by the server
///
/// Folders and records share most fields, so a single struct carries both;
/// [`ItemVO::is_folder`] tells them apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemVO {
    #[serde(rename = "folderId", default)]
    pub folder_id: Option<i64>,
    #[serde(rename = "recordId", default)]
    pub record_id: Option<i64>,
    #[serde(rename = "folder_linkId", default)]
    pub folder_link_id: Option<i64>,
    #[serde(rename = "parentFolder_linkId", default)]
    pub parent_folder_link_id: Option<i64>,
    #[serde(rename = "parentFolderId", default)]
    pub parent_folder_id: Option<i64>,
    #[serde(rename = "archiveNbr", default)]
    pub archive_nbr: Option<String>,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "uploadFileName", default)]
    pub upload_file_name: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(rename = "thumbURL200", default)]
    pub thumb_url_200: Option<String>,
    #[serde(rename = "accessRole", default)]
    pub access_role: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(rename = "displayDT", default)]
    pub display_dt: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(rename = "ChildItemVOs", default)]
    pub children: Vec<ItemVO>,
    #[serde(rename = "FileVOs", default)]
    pub files: Vec<FileVO>,
    #[serde(rename = "ShareVOs", default)]
    pub shares: Vec<ShareVO>,
}

impl ItemVO {
    /// Returns true if the item describes a folder
    pub fn is_folder(&self) -> bool {
        match self.item_type.as_deref() {
            Some(t) => t.starts_with("type.folder"),
            None => self.folder_id.is_some() && self.record_id.is_none(),
        }
    }

    /// Link ids of the child items, in server order
    pub fn child_link_ids(&self) -> Result<Vec<FolderLinkId>, EnvelopeError> {
        self.children
            .iter()
            .map(|c| required_id(c.folder_link_id, "ChildItemVOs.folder_linkId"))
            .collect()
    }

    /// Direct URL of the record's original rendition
    pub fn download_url(&self) -> Option<&str> {
        self.files
            .iter()
            .find_map(|f| f.download_url.as_deref().or(f.file_url.as_deref()))
    }

    /// Whether the item carries its own permission list or access role
    pub fn reports_permissions(&self) -> bool {
        !self.permissions.is_empty() || self.access_role.is_some()
    }

    /// Permissions from the explicit list, else from the access role.
    ///
    /// Items that report neither are read-only.
    pub fn permission_set(&self) -> Result<PermissionSet, EnvelopeError> {
        self.permission_set_or(&PermissionSet::read_only())
    }

    /// Like [`permission_set`](Self::permission_set), but items that report
    /// nothing get `archive_permissions`, the permissions the session
    /// holds on the archive.
    pub fn permission_set_or(
        &self,
        archive_permissions: &PermissionSet,
    ) -> Result<PermissionSet, EnvelopeError> {
        if !self.permissions.is_empty() {
            return self
                .permissions
                .iter()
                .map(|p| {
                    p.parse::<Permission>()
                        .map_err(|e| EnvelopeError::malformed(e.to_string()))
                })
                .collect();
        }
        match self.access_role.as_deref() {
            Some(role) => role
                .parse::<AccessRole>()
                .map(|r| r.permissions())
                .map_err(|e| EnvelopeError::malformed(e.to_string())),
            None => Ok(archive_permissions.clone()),
        }
    }

    /// Validate and convert into a read-only-by-default listing entry.
    ///
    /// `fallback_archive` is used when the item does not repeat its archive
    /// number, which lean child items usually do not.
    pub fn to_file_entry(
        &self,
        fallback_archive: &ArchiveNumber,
    ) -> Result<FileEntry, EnvelopeError> {
        self.to_file_entry_with(fallback_archive, &PermissionSet::read_only())
    }

    /// Validate and convert, granting `archive_permissions` to items that
    /// report no permissions of their own
    pub fn to_file_entry_with(
        &self,
        fallback_archive: &ArchiveNumber,
        archive_permissions: &PermissionSet,
    ) -> Result<FileEntry, EnvelopeError> {
        let name = self
            .display_name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| EnvelopeError::malformed("missing displayName"))?;
        let link = required_id(self.folder_link_id, "folder_linkId")?;
        let archive = match self.archive_nbr.as_deref() {
            Some(nbr) => {
                ArchiveNumber::new(nbr).map_err(|e| EnvelopeError::malformed(e.to_string()))?
            }
            None => fallback_archive.clone(),
        };

        let mut entry = if self.is_folder() {
            let folder_id = required_id(self.folder_id, "folderId")?;
            FileEntry::folder(name, archive, folder_id, link)
        } else {
            let record_id: RecordId = required_id(self.record_id, "recordId")?;
            FileEntry::file(name, archive, record_id, link)
        };

        entry.parent_folder_link_id = self
            .parent_folder_link_id
            .map(|id| FolderLinkId::new(id).map_err(|e| EnvelopeError::malformed(e.to_string())))
            .transpose()?;
        entry.thumbnail_url = self.thumb_url_200.clone();
        entry.permissions = self.permission_set_or(archive_permissions)?;
        entry.sync_status = SyncStatus::Synced;
        entry.display_date = self.display_dt.as_deref().and_then(parse_server_date);
        entry.size = self.size;
        entry.shared_with = self
            .shares
            .iter()
            .filter_map(|s| s.to_summary())
            .collect();

        Ok(entry)
    }

    /// Server folder id, validated
    pub fn folder_id(&self) -> Result<FolderId, EnvelopeError> {
        required_id(self.folder_id, "folderId")
    }

    /// Server record id, validated
    pub fn record_id(&self) -> Result<RecordId, EnvelopeError> {
        required_id(self.record_id, "recordId")
    }

    /// Folder link id, validated
    pub fn link_id(&self) -> Result<FolderLinkId, EnvelopeError> {
        required_id(self.folder_link_id, "folder_linkId")
    }
}

impl ShareVO {
    fn to_summary(&self) -> Option<ArchiveSummary> {
        let archive = self.archive.as_ref()?;
        let archive_number = ArchiveNumber::new(archive.archive_nbr.clone()?).ok()?;
        Some(ArchiveSummary {
            archive_number,
            name: archive.full_name.clone().unwrap_or_default(),
            role: self
                .access_role
                .as_deref()
                .and_then(|r| r.parse::<AccessRole>().ok()),
            thumbnail_url: archive.thumb_url_200.clone(),
        })
    }
}

/// Share link as sent and received on the wire
///
/// The toggles are `0`/`1` integers and a `maxUses` of zero means the link
/// has no use limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLinkVO {
    #[serde(rename = "shareby_urlId", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "folder_linkId", default, skip_serializing_if = "Option::is_none")]
    pub folder_link_id: Option<i64>,
    #[serde(rename = "urlToken", default, skip_serializing_if = "Option::is_none")]
    pub url_token: Option<String>,
    #[serde(rename = "shareUrl", default, skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
    #[serde(rename = "previewToggle", default)]
    pub preview_toggle: Option<i64>,
    #[serde(rename = "autoApproveToggle", default)]
    pub auto_approve_toggle: Option<i64>,
    #[serde(rename = "expiresDT", default)]
    pub expires_dt: Option<String>,
    #[serde(rename = "maxUses", default)]
    pub max_uses: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<i64>,
}

impl ShareLinkVO {
    /// Wire form of `link`, as the update and drop calls expect it
    pub fn from_link(link: &ShareLink) -> Self {
        let settings = &link.settings;
        Self {
            id: Some(link.id.get()),
            folder_link_id: link.folder_link_id.map(|id| id.get()),
            url_token: link.token.clone(),
            share_url: Some(link.url.clone()),
            preview_toggle: Some(i64::from(settings.preview)),
            auto_approve_toggle: Some(i64::from(settings.auto_approve)),
            expires_dt: settings
                .expires_at
                .map(|at| at.format("%Y-%m-%dT%H:%M:%S").to_string()),
            max_uses: Some(settings.max_uses.map(i64::from).unwrap_or(0)),
            uses: None,
        }
    }

    /// Validate and convert into a share link.
    ///
    /// A VO without an id means the item has no link and yields `None`.
    pub fn to_share_link(&self) -> Result<Option<ShareLink>, EnvelopeError> {
        if self.id.is_none() {
            return Ok(None);
        }
        let id: ShareLinkId = required_id(self.id, "shareby_urlId")?;
        let url = self
            .share_url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| EnvelopeError::malformed("missing shareUrl"))?;
        let folder_link_id = self
            .folder_link_id
            .map(|id| FolderLinkId::new(id).map_err(|e| EnvelopeError::malformed(e.to_string())))
            .transpose()?;
        let max_uses = match self.max_uses.unwrap_or(0) {
            0 => None,
            n => Some(count(n, "maxUses")?),
        };
        let expires_at = match self.expires_dt.as_deref() {
            Some(raw) => Some(
                parse_server_date(raw)
                    .ok_or_else(|| EnvelopeError::malformed(format!("invalid expiresDT: {raw}")))?,
            ),
            None => None,
        };

        Ok(Some(ShareLink {
            id,
            url,
            token: self.url_token.clone(),
            folder_link_id,
            settings: ShareLinkSettings {
                preview: self.preview_toggle.unwrap_or(0) != 0,
                auto_approve: self.auto_approve_toggle.unwrap_or(0) != 0,
                max_uses,
                expires_at,
            },
            uses: count(self.uses.unwrap_or(0), "uses")?,
        }))
    }
}

fn count(value: i64, field: &str) -> Result<u32, EnvelopeError> {
    u32::try_from(value).map_err(|_| EnvelopeError::malformed(format!("invalid {field}: {value}")))
}

fn required_id<T>(value: Option<i64>, field: &str) -> Result<T, EnvelopeError>
where
    T: TryFrom<i64>,
{
    let raw = value.ok_or_else(|| EnvelopeError::malformed(format!("missing {field}")))?;
    T::try_from(raw).map_err(|_| EnvelopeError::malformed(format!("invalid {field}: {raw}")))
}

// The server sends either RFC 3339 or a naive "YYYY-MM-DDTHH:MM:SS" in UTC.
fn parse_server_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|n| n.and_utc())
        })
}

/// One element of a result's `data` array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataVO {
    #[serde(rename = "FolderVO", default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<ItemVO>,
    #[serde(rename = "RecordVO", default, skip_serializing_if = "Option::is_none")]
    pub record: Option<ItemVO>,
    #[serde(rename = "Shareby_urlVO", default, skip_serializing_if = "Option::is_none")]
    pub share_link: Option<ShareLinkVO>,
}

/// One element of the `Results` array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultVO {
    #[serde(default)]
    pub data: Vec<DataVO>,
    #[serde(default)]
    pub message: Vec<String>,
}

// ============================================================================
// ApiEnvelope
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "isSuccessful")]
    is_successful: Option<bool>,
    #[serde(default)]
    csrf: Option<String>,
    #[serde(rename = "Results", default)]
    results: Vec<ResultVO>,
}

/// Validated response envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEnvelope {
    is_successful: bool,
    csrf: Option<CsrfToken>,
    results: Vec<ResultVO>,
}

impl ApiEnvelope {
    /// Validate a decoded JSON body
    pub fn parse(body: Value) -> Result<Self, EnvelopeError> {
        let raw: RawEnvelope =
            serde_json::from_value(body).map_err(|e| EnvelopeError::malformed(e.to_string()))?;
        let is_successful = raw
            .is_successful
            .ok_or_else(|| EnvelopeError::malformed("missing isSuccessful"))?;
        let csrf = raw.csrf.and_then(|c| CsrfToken::new(c).ok());

        Ok(Self {
            is_successful,
            csrf,
            results: raw.results,
        })
    }

    /// Validate a raw byte body
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| EnvelopeError::malformed(e.to_string()))?;
        Self::parse(value)
    }

    /// Construct a successful envelope around `data`
    pub fn success(csrf: Option<CsrfToken>, data: Vec<DataVO>) -> Self {
        Self {
            is_successful: true,
            csrf,
            results: vec![ResultVO {
                data,
                message: Vec::new(),
            }],
        }
    }

    pub fn is_successful(&self) -> bool {
        self.is_successful
    }

    /// Anti-forgery token for the next request, if the server sent one
    pub fn csrf(&self) -> Option<&CsrfToken> {
        self.csrf.as_ref()
    }

    /// All server messages, in order
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .flat_map(|r| r.message.iter().map(String::as_str))
    }

    /// Turn an unsuccessful envelope into an error
    pub fn ensure_success(self) -> Result<Self, EnvelopeError> {
        if self.is_successful {
            Ok(self)
        } else {
            let message = self
                .messages()
                .next()
                .map(str::to_string)
                .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());
            Err(EnvelopeError::Rejected { message })
        }
    }

    fn first_data(&self) -> Option<&DataVO> {
        self.results.first().and_then(|r| r.data.first())
    }

    /// `FolderVO` of the first data element
    pub fn folder(&self) -> Result<&ItemVO, EnvelopeError> {
        self.first_data()
            .and_then(|d| d.folder.as_ref())
            .ok_or_else(|| EnvelopeError::malformed("missing FolderVO payload"))
    }

    /// `RecordVO` of the first data element
    pub fn record(&self) -> Result<&ItemVO, EnvelopeError> {
        self.first_data()
            .and_then(|d| d.record.as_ref())
            .ok_or_else(|| EnvelopeError::malformed("missing RecordVO payload"))
    }

    /// Share link of the first data element; `None` if the item has none
    pub fn share_link(&self) -> Result<Option<ShareLink>, EnvelopeError> {
        match self.first_data().and_then(|d| d.share_link.as_ref()) {
            Some(vo) => vo.to_share_link(),
            None => Ok(None),
        }
    }

    /// Every share link in the answer, in server order
    pub fn share_links(&self) -> Result<Vec<ShareLink>, EnvelopeError> {
        self.results
            .iter()
            .flat_map(|r| r.data.iter())
            .filter_map(|d| d.share_link.as_ref())
            .filter_map(|vo| vo.to_share_link().transpose())
            .collect()
    }
}
