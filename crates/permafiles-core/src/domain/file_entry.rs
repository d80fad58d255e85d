//! FileEntry domain entity
//!
//! A `FileEntry` is one row of a folder listing: either a server-backed
//! file or folder (`SyncStatus::Synced`) or a local placeholder standing in
//! for a queued transfer that has not been committed yet.
//!
//! ## Placeholder rule
//!
//! Any entry whose status is not `Synced` is a local placeholder and carries
//! no record id. Placeholders are produced only through
//! [`FileEntry::placeholder`], which enforces this.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{ArchiveNumber, FolderId, FolderLinkId, QueueItemId, RecordId};

// ============================================================================
// SyncStatus
// ============================================================================

/// Local synchronization status of a listing entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Committed on the server
    #[default]
    Synced,
    /// Upload in flight
    Uploading,
    /// Download in flight
    Downloading,
    /// Queued behind another transfer
    Waiting,
    /// Last transfer attempt failed
    Failed,
}

impl SyncStatus {
    /// Returns the status name as a static string
    pub fn name(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Uploading => "uploading",
            Self::Downloading => "downloading",
            Self::Waiting => "waiting",
            Self::Failed => "failed",
        }
    }

    /// Returns true for statuses that only placeholders may carry
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, Self::Synced)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Permissions
// ============================================================================

/// A single capability the current archive holds on an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Create,
    Edit,
    Delete,
    Move,
    Share,
    Publish,
    Ownership,
}

impl Permission {
    /// Returns the permission name as a static string
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Move => "move",
            Self::Share => "share",
            Self::Publish => "publish",
            Self::Ownership => "ownership",
        }
    }
}

impl FromStr for Permission {
    type Err = DomainError;

    /// Accepts both the bare name (`edit`) and the namespaced server form
    /// (`access.permission.edit`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches("access.permission.");
        match name {
            "read" => Ok(Self::Read),
            "create" => Ok(Self::Create),
            "edit" => Ok(Self::Edit),
            "delete" => Ok(Self::Delete),
            "move" => Ok(Self::Move),
            "share" => Ok(Self::Share),
            "publish" => Ok(Self::Publish),
            "ownership" | "owner" => Ok(Self::Ownership),
            _ => Err(DomainError::UnknownPermission(s.to_string())),
        }
    }
}

/// Access role an archive holds on an item
///
/// Roles are cumulative: each one grants everything the previous grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRole {
    Viewer,
    Contributor,
    Editor,
    Curator,
    Manager,
    Owner,
}

impl AccessRole {
    /// Permissions granted by this role
    pub fn permissions(&self) -> PermissionSet {
        use Permission::*;
        let granted: &[Permission] = match self {
            Self::Viewer => &[Read],
            Self::Contributor => &[Read, Create],
            Self::Editor => &[Read, Create, Edit],
            Self::Curator => &[Read, Create, Edit, Delete, Move],
            Self::Manager => &[Read, Create, Edit, Delete, Move, Share, Publish],
            Self::Owner => &[Read, Create, Edit, Delete, Move, Share, Publish, Ownership],
        };
        granted.iter().copied().collect()
    }
}

impl FromStr for AccessRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches("access.role.") {
            "viewer" => Ok(Self::Viewer),
            "contributor" => Ok(Self::Contributor),
            "editor" => Ok(Self::Editor),
            "curator" => Ok(Self::Curator),
            "manager" => Ok(Self::Manager),
            "owner" => Ok(Self::Owner),
            _ => Err(DomainError::UnknownPermission(s.to_string())),
        }
    }
}

/// Set of permissions, iterated in a stable order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// Empty set
    pub fn none() -> Self {
        Self::default()
    }

    /// Read access only
    pub fn read_only() -> Self {
        AccessRole::Viewer.permissions()
    }

    /// Every permission
    pub fn all() -> Self {
        AccessRole::Owner.permissions()
    }

    /// Returns true if the set grants `permission`
    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// Add a permission
    pub fn insert(&mut self, permission: Permission) {
        self.0.insert(permission);
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// ArchiveSummary
// ============================================================================

/// Short description of an archive an item is shared with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    /// Public archive number
    pub archive_number: ArchiveNumber,
    /// Archive display name
    pub name: String,
    /// Role the archive holds on the shared item, when reported
    pub role: Option<AccessRole>,
    /// Archive avatar thumbnail
    pub thumbnail_url: Option<String>,
}

// ============================================================================
// FileEntry
// ============================================================================

/// A single file or folder in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Display name
    pub name: String,
    /// Whether the entry is a folder
    pub is_folder: bool,
    /// Server record id; present only for synced files
    pub record_id: Option<RecordId>,
    /// Server folder id; present only for synced folders
    pub folder_id: Option<FolderId>,
    /// Position of the entry inside its parent folder. Upload placeholders
    /// have none until the server assigns one.
    pub folder_link_id: Option<FolderLinkId>,
    /// Link id of the parent folder; none for an archive root
    pub parent_folder_link_id: Option<FolderLinkId>,
    /// Archive the entry belongs to
    pub archive_number: ArchiveNumber,
    /// Thumbnail reference
    pub thumbnail_url: Option<String>,
    /// Capabilities on this entry
    pub permissions: PermissionSet,
    /// Local synchronization status
    pub sync_status: SyncStatus,
    /// Archives this entry is shared with, in server order
    pub shared_with: Vec<ArchiveSummary>,
    /// Server display date used for date ordering
    pub display_date: Option<DateTime<Utc>>,
    /// Size in bytes, when known
    pub size: Option<u64>,
    /// Queue item this placeholder stands for
    pub queue_item_id: Option<QueueItemId>,
}

impl FileEntry {
    /// Create a synced folder entry as returned by the server
    pub fn folder(
        name: impl Into<String>,
        archive_number: ArchiveNumber,
        folder_id: FolderId,
        folder_link_id: FolderLinkId,
    ) -> Self {
        Self {
            name: name.into(),
            is_folder: true,
            record_id: None,
            folder_id: Some(folder_id),
            folder_link_id: Some(folder_link_id),
            parent_folder_link_id: None,
            archive_number,
            thumbnail_url: None,
            permissions: PermissionSet::all(),
            sync_status: SyncStatus::Synced,
            shared_with: Vec::new(),
            display_date: None,
            size: None,
            queue_item_id: None,
        }
    }

    /// Create a synced file entry as returned by the server
    pub fn file(
        name: impl Into<String>,
        archive_number: ArchiveNumber,
        record_id: RecordId,
        folder_link_id: FolderLinkId,
    ) -> Self {
        Self {
            name: name.into(),
            is_folder: false,
            record_id: Some(record_id),
            folder_id: None,
            folder_link_id: Some(folder_link_id),
            parent_folder_link_id: None,
            archive_number,
            thumbnail_url: None,
            permissions: PermissionSet::all(),
            sync_status: SyncStatus::Synced,
            shared_with: Vec::new(),
            display_date: None,
            size: None,
            queue_item_id: None,
        }
    }

    /// Create a local placeholder for a queued transfer
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` when asked for a `Synced`
    /// placeholder; synced entries only come from the server.
    pub fn placeholder(
        name: impl Into<String>,
        archive_number: ArchiveNumber,
        parent_folder_link_id: FolderLinkId,
        status: SyncStatus,
        queue_item_id: QueueItemId,
    ) -> Result<Self, DomainError> {
        if !status.is_placeholder() {
            return Err(DomainError::InvalidState {
                from: "placeholder".to_string(),
                to: status.to_string(),
            });
        }
        Ok(Self {
            name: name.into(),
            is_folder: false,
            record_id: None,
            folder_id: None,
            folder_link_id: None,
            parent_folder_link_id: Some(parent_folder_link_id),
            archive_number,
            thumbnail_url: None,
            permissions: PermissionSet::none(),
            sync_status: status,
            shared_with: Vec::new(),
            display_date: None,
            size: None,
            queue_item_id: Some(queue_item_id),
        })
    }

    /// Set the parent link id
    #[must_use]
    pub fn with_parent(mut self, parent: FolderLinkId) -> Self {
        self.parent_folder_link_id = Some(parent);
        self
    }

    /// Set the permission set
    #[must_use]
    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }

    /// Returns true if the entry is a local placeholder
    pub fn is_placeholder(&self) -> bool {
        self.sync_status.is_placeholder()
    }

    /// Returns true if the current archive may perform `permission` on it
    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(permission)
    }

    /// Checks the placeholder rule
    pub fn is_consistent(&self) -> bool {
        !self.is_placeholder() || self.record_id.is_none()
    }
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_folder { "folder" } else { "file" };
        write!(f, "{kind} '{}' [{}]", self.name, self.sync_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive() -> ArchiveNumber {
        ArchiveNumber::new("0a21-0000").unwrap()
    }

    #[test]
    fn test_roles_are_cumulative() {
        let viewer = AccessRole::Viewer.permissions();
        assert!(viewer.contains(Permission::Read));
        assert!(!viewer.contains(Permission::Create));

        let curator = AccessRole::Curator.permissions();
        assert!(curator.contains(Permission::Delete));
        assert!(curator.contains(Permission::Move));
        assert!(!curator.contains(Permission::Share));

        let owner = AccessRole::Owner.permissions();
        assert_eq!(owner.iter().count(), 8);
        assert_eq!(owner, PermissionSet::all());
    }

    #[test]
    fn test_role_parsing_accepts_server_names() {
        assert_eq!(
            "access.role.manager".parse::<AccessRole>().unwrap(),
            AccessRole::Manager
        );
        assert_eq!("editor".parse::<AccessRole>().unwrap(), AccessRole::Editor);
        assert!("access.role.janitor".parse::<AccessRole>().is_err());
    }

    #[test]
    fn test_permission_parsing() {
        assert_eq!(
            "access.permission.publish".parse::<Permission>().unwrap(),
            Permission::Publish
        );
        assert_eq!("owner".parse::<Permission>().unwrap(), Permission::Ownership);
        assert!("fly".parse::<Permission>().is_err());
    }

    #[test]
    fn test_placeholder_has_no_record_id() {
        let parent = FolderLinkId::new(5).unwrap();
        let entry = FileEntry::placeholder(
            "A.jpg",
            archive(),
            parent,
            SyncStatus::Waiting,
            QueueItemId::new(),
        )
        .unwrap();

        assert!(entry.is_placeholder());
        assert!(entry.record_id.is_none());
        assert!(entry.is_consistent());
        assert_eq!(entry.parent_folder_link_id, Some(parent));
    }

    #[test]
    fn test_synced_placeholder_is_rejected() {
        let result = FileEntry::placeholder(
            "A.jpg",
            archive(),
            FolderLinkId::new(5).unwrap(),
            SyncStatus::Synced,
            QueueItemId::new(),
        );
        assert!(matches!(result, Err(DomainError::InvalidState { .. })));
    }

    #[test]
    fn test_server_entries_are_synced() {
        let file = FileEntry::file(
            "B.pdf",
            archive(),
            RecordId::new(9).unwrap(),
            FolderLinkId::new(10).unwrap(),
        );
        assert_eq!(file.sync_status, SyncStatus::Synced);
        assert!(!file.is_folder);
        assert!(file.can(Permission::Delete));

        let folder = FileEntry::folder(
            "Photos",
            archive(),
            FolderId::new(3).unwrap(),
            FolderLinkId::new(4).unwrap(),
        )
        .with_permissions(AccessRole::Viewer.permissions());
        assert!(folder.is_folder);
        assert!(!folder.can(Permission::Delete));
        assert_eq!(folder.to_string(), "folder 'Photos' [synced]");
    }
}
