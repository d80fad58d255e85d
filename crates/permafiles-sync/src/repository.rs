//! Folder repository
//!
//! Typed access to the archive service on top of the request dispatcher
//! port. Every JSON answer goes through envelope validation here, and the
//! anti-forgery token is rotated from each successful envelope so the next
//! call always carries the most recent one.
//!
//! ## Folder resolution
//!
//! Opening a folder is two round trips:
//!
//! 1. `navigate_min` resolves the folder identity and the link ids of its
//!    children.
//! 2. `get_lean_items` fetches those children, ordered by the requested
//!    sort option.

use std::path::Path;
use std::sync::{Arc, Mutex};

use permafiles_core::{
    domain::{
        AccessRole, ArchiveNumber, CsrfToken, DomainError, FileEntry, FolderLinkId,
        PendingTransferItem, PermissionSet, RecordId, ShareLink, SortOption, TargetFolder,
        DEFAULT_MIME_TYPE,
    },
    endpoint::{Endpoint, ItemRef, RelocateAction},
    envelope::{ApiEnvelope, EnvelopeError, ItemVO},
    ports::{ApiRequest, DispatchResponse, IRequestDispatcher, ProgressFn, TransferRequest},
};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::RepositoryError;

/// Prefix of the server type of an archive's private files folder
const PRIVATE_ROOT_TYPE: &str = "type.folder.root.private";

/// Client for folder and record calls
pub struct FolderRepository {
    dispatcher: Arc<dyn IRequestDispatcher>,
    csrf: Mutex<Option<CsrfToken>>,
    /// Granted to items that report no permissions of their own
    archive_permissions: Mutex<PermissionSet>,
}

impl FolderRepository {
    pub fn new(dispatcher: Arc<dyn IRequestDispatcher>) -> Self {
        Self {
            dispatcher,
            csrf: Mutex::new(None),
            archive_permissions: Mutex::new(PermissionSet::read_only()),
        }
    }

    /// Start from the permissions of `role` instead of read-only
    ///
    /// A role reported by the archive root replaces it.
    pub fn with_archive_role(self, role: Option<AccessRole>) -> Self {
        if let Some(role) = role {
            self.set_archive_permissions(role.permissions());
        }
        self
    }

    /// Permissions the session holds on the archive
    pub fn archive_permissions(&self) -> PermissionSet {
        self.archive_permissions
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|_| PermissionSet::read_only())
    }

    fn set_archive_permissions(&self, permissions: PermissionSet) {
        if let Ok(mut guard) = self.archive_permissions.lock() {
            *guard = permissions;
        }
    }

    fn entry(&self, vo: &ItemVO, archive: &ArchiveNumber) -> Result<FileEntry, EnvelopeError> {
        vo.to_file_entry_with(archive, &self.archive_permissions())
    }

    /// Token that the next call will carry
    pub fn csrf(&self) -> Option<CsrfToken> {
        self.csrf.lock().ok().and_then(|guard| guard.clone())
    }

    fn rotate_csrf(&self, token: &CsrfToken) {
        if let Ok(mut guard) = self.csrf.lock() {
            *guard = Some(token.clone());
        }
    }

    /// Validate a JSON body, rotating the token if the call succeeded
    fn accept(&self, body: Value) -> Result<ApiEnvelope, RepositoryError> {
        let envelope = ApiEnvelope::parse(body)?;
        if envelope.is_successful() {
            if let Some(token) = envelope.csrf() {
                self.rotate_csrf(token);
            }
        }
        Ok(envelope.ensure_success()?)
    }

    async fn call(&self, endpoint: Endpoint) -> Result<ApiEnvelope, RepositoryError> {
        let name = endpoint.name();
        debug!(endpoint = name, "dispatching request");
        let request = ApiRequest::new(endpoint, self.csrf());
        match self.dispatcher.execute(request).await {
            Ok(DispatchResponse::Json(body)) => self.accept(body).map_err(|e| {
                debug!(endpoint = name, error = %e, "request rejected");
                e
            }),
            Ok(DispatchResponse::Binary(_)) => Err(EnvelopeError::malformed(format!(
                "{name} answered with binary data"
            ))
            .into()),
            Err(e) => {
                warn!(endpoint = name, error = %e, "request failed");
                Err(e.into())
            }
        }
    }

    // ------------------------------------------------------------------
    // Folders
    // ------------------------------------------------------------------

    /// Resolve the session archive's root.
    ///
    /// The browsing root is the archive's private files folder when the
    /// server lists one, else the archive root itself.
    #[instrument(skip(self))]
    pub async fn get_root(&self) -> Result<FileEntry, RepositoryError> {
        let envelope = self.call(Endpoint::GetRoot).await?;
        let root = envelope.folder()?;
        let archive = root
            .archive_nbr
            .as_deref()
            .ok_or_else(|| EnvelopeError::malformed("root folder has no archiveNbr"))
            .and_then(|n| {
                ArchiveNumber::new(n).map_err(|e| EnvelopeError::malformed(e.to_string()))
            })?;

        if root.reports_permissions() {
            self.set_archive_permissions(root.permission_set()?);
        }

        let private = root.children.iter().find(|c| {
            c.item_type
                .as_deref()
                .is_some_and(|t| t.starts_with(PRIVATE_ROOT_TYPE))
        });
        let entry = self.entry(private.unwrap_or(root), &archive)?;
        debug!(archive = %archive, folder = %entry.name, "resolved archive root");
        Ok(entry)
    }

    /// Fetch the children of `folder` in server order
    #[instrument(skip(self, folder), fields(folder = %folder.name, sort = %sort))]
    pub async fn load_folder(
        &self,
        folder: &FileEntry,
        sort: SortOption,
    ) -> Result<Vec<FileEntry>, RepositoryError> {
        let folder_link_id = folder.folder_link_id.ok_or_else(|| {
            DomainError::ValidationFailed(format!("'{}' has no folder link id", folder.name))
        })?;
        let archive = folder.archive_number.clone();

        let resolved = self
            .call(Endpoint::NavigateMin {
                archive_number: archive.clone(),
                folder_link_id,
            })
            .await?;
        let children = resolved.folder()?.child_link_ids()?;
        debug!(
            folder_link_id = %folder_link_id,
            children = children.len(),
            "resolved folder"
        );

        let lean = self
            .call(Endpoint::GetLeanItems {
                archive_number: archive.clone(),
                folder_link_id,
                sort,
                children,
            })
            .await?;

        lean.folder()?
            .children
            .iter()
            .map(|child| -> Result<FileEntry, RepositoryError> {
                let mut entry = self.entry(child, &archive)?;
                entry.parent_folder_link_id.get_or_insert(folder_link_id);
                Ok(entry)
            })
            .collect()
    }

    /// Create a folder named `name` inside `parent`
    #[instrument(skip(self, parent), fields(parent = %parent.name))]
    pub async fn create_folder(
        &self,
        parent: &FileEntry,
        name: &str,
    ) -> Result<FileEntry, RepositoryError> {
        let parent_link = parent.folder_link_id.ok_or_else(|| {
            DomainError::ValidationFailed(format!("'{}' has no folder link id", parent.name))
        })?;
        let envelope = self
            .call(Endpoint::NewFolder {
                parent_folder_link_id: parent_link,
                display_name: name.to_string(),
            })
            .await?;
        let mut vo = envelope.folder()?.clone();
        vo.display_name.get_or_insert_with(|| name.to_string());
        let mut entry = self.entry(&vo, &parent.archive_number)?;
        entry.parent_folder_link_id.get_or_insert(parent_link);
        Ok(entry)
    }

    /// Delete a synced folder or record
    #[instrument(skip(self, entry), fields(name = %entry.name))]
    pub async fn delete(&self, entry: &FileEntry) -> Result<(), RepositoryError> {
        let item = ItemRef::from_entry(entry)?;
        self.call(Endpoint::Delete(item)).await?;
        Ok(())
    }

    /// Move or copy `entry` into `destination`
    #[instrument(skip(self, entry, destination), fields(name = %entry.name, action = %action))]
    pub async fn relocate(
        &self,
        entry: &FileEntry,
        destination: &FileEntry,
        action: RelocateAction,
    ) -> Result<(), RepositoryError> {
        if !destination.is_folder {
            return Err(DomainError::ValidationFailed(format!(
                "'{}' is not a folder",
                destination.name
            ))
            .into());
        }
        let destination_link_id = destination.folder_link_id.ok_or_else(|| {
            DomainError::ValidationFailed(format!("'{}' is not synced", destination.name))
        })?;
        let item = ItemRef::from_entry(entry)?;
        self.call(Endpoint::Relocate {
            item,
            destination_link_id,
            action,
        })
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Share links
    // ------------------------------------------------------------------

    /// Share link of `entry`, or `None` if it has not been shared by link
    #[instrument(skip(self, entry), fields(name = %entry.name))]
    pub async fn get_share_link(
        &self,
        entry: &FileEntry,
    ) -> Result<Option<ShareLink>, RepositoryError> {
        let item = ItemRef::from_entry(entry)?;
        let envelope = self.call(Endpoint::GetShareLink(item)).await?;
        Ok(envelope.share_link()?)
    }

    /// Create the share link of `entry`
    #[instrument(skip(self, entry), fields(name = %entry.name))]
    pub async fn generate_share_link(&self, entry: &FileEntry) -> Result<ShareLink, RepositoryError> {
        let item = ItemRef::from_entry(entry)?;
        let envelope = self.call(Endpoint::GenerateShareLink(item)).await?;
        let link = envelope
            .share_link()?
            .ok_or_else(|| EnvelopeError::malformed("generateShareLink returned no link"))?;
        debug!(share_link_id = %link.id, "share link created");
        Ok(link)
    }

    /// Save the settings carried by `link`
    ///
    /// Returns the link as stored by the server, or `link` itself when the
    /// answer does not echo it.
    #[instrument(skip(self, link), fields(share_link_id = %link.id))]
    pub async fn update_share_link(&self, link: &ShareLink) -> Result<ShareLink, RepositoryError> {
        link.settings.validate()?;
        let envelope = self.call(Endpoint::UpdateShareLink(link.clone())).await?;
        Ok(envelope.share_link()?.unwrap_or_else(|| link.clone()))
    }

    /// Revoke `link`; its URL stops working
    #[instrument(skip(self, link), fields(share_link_id = %link.id))]
    pub async fn drop_share_link(&self, link: &ShareLink) -> Result<(), RepositoryError> {
        self.call(Endpoint::DropShareLink(link.clone())).await?;
        Ok(())
    }

    /// Every share link of the session archive
    #[instrument(skip(self))]
    pub async fn get_shares(&self) -> Result<Vec<ShareLink>, RepositoryError> {
        let envelope = self.call(Endpoint::GetShares).await?;
        Ok(envelope.share_links()?)
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Register upload metadata; the answer becomes the synced entry
    #[instrument(skip(self, item, target), fields(item_id = %item.id, name = %item.display_name))]
    pub async fn register_record(
        &self,
        item: &PendingTransferItem,
        target: &TargetFolder,
    ) -> Result<FileEntry, RepositoryError> {
        let envelope = self
            .call(Endpoint::RegisterRecord {
                target: target.clone(),
                display_name: item.display_name.clone(),
                upload_file_name: item.display_name.clone(),
                size: item.size_bytes,
                mime_type: item.mime_type.clone(),
            })
            .await?;
        let mut vo: ItemVO = envelope.record()?.clone();
        vo.display_name.get_or_insert_with(|| item.display_name.clone());
        vo.size.get_or_insert(item.size_bytes);

        let mut entry = self.entry(&vo, &target.archive_number)?;
        entry.parent_folder_link_id.get_or_insert(target.folder_link_id);
        Ok(entry)
    }

    /// Stream the file at `path` as the content of `record_id`
    #[instrument(skip(self, path, progress), fields(record_id = %record_id))]
    pub async fn upload_content(
        &self,
        record_id: RecordId,
        path: &Path,
        filename: &str,
        mime_type: Option<&str>,
        size: u64,
        progress: ProgressFn,
    ) -> Result<(), RepositoryError> {
        let request = TransferRequest::Upload {
            record_id,
            path: path.to_path_buf(),
            filename: filename.to_string(),
            mime_type: mime_type.unwrap_or(DEFAULT_MIME_TYPE).to_string(),
            size,
        };
        match self.dispatcher.transfer(request, progress).await? {
            DispatchResponse::Json(body) => {
                self.accept(body)?;
                Ok(())
            }
            DispatchResponse::Binary(_) => {
                Err(EnvelopeError::malformed("upload answered with binary data").into())
            }
        }
    }

    /// Look up the download URL of a record
    #[instrument(skip(self))]
    pub async fn resolve_download_url(
        &self,
        archive_number: &ArchiveNumber,
        record_id: RecordId,
        folder_link_id: FolderLinkId,
    ) -> Result<String, RepositoryError> {
        let envelope = self
            .call(Endpoint::GetRecord {
                archive_number: archive_number.clone(),
                record_id,
                folder_link_id,
            })
            .await?;
        envelope
            .record()?
            .download_url()
            .map(str::to_string)
            .ok_or_else(|| EnvelopeError::malformed("record has no download URL").into())
    }

    /// Fetch the bytes behind `url`
    #[instrument(skip(self, progress))]
    pub async fn download_content(
        &self,
        url: &str,
        progress: ProgressFn,
    ) -> Result<Vec<u8>, RepositoryError> {
        let request = TransferRequest::Download {
            url: url.to_string(),
        };
        match self.dispatcher.transfer(request, progress).await? {
            DispatchResponse::Binary(bytes) => Ok(bytes),
            DispatchResponse::Json(_) => {
                Err(EnvelopeError::malformed("download answered with JSON").into())
            }
        }
    }
}
