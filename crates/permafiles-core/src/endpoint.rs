//! Endpoint catalogue
//!
//! Every JSON call the engines make is described by an [`Endpoint`] value.
//! The request dispatcher adapter turns it into a concrete request; the
//! engines never build URLs or bodies themselves.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{
    ArchiveNumber, DomainError, FileEntry, FolderId, FolderLinkId, RecordId, ShareLink,
    SortOption, TargetFolder,
};

/// Whether a relocation keeps the source item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelocateAction {
    Move,
    Copy,
}

impl RelocateAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Copy => "copy",
        }
    }
}

impl fmt::Display for RelocateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Server identity of an existing folder or record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemRef {
    Folder {
        folder_id: FolderId,
        folder_link_id: FolderLinkId,
        parent_folder_link_id: Option<FolderLinkId>,
    },
    Record {
        record_id: RecordId,
        folder_link_id: FolderLinkId,
        parent_folder_link_id: Option<FolderLinkId>,
    },
}

impl ItemRef {
    /// Identity of a synced listing entry
    ///
    /// # Errors
    ///
    /// Placeholders have no server identity and are rejected.
    pub fn from_entry(entry: &FileEntry) -> Result<Self, DomainError> {
        let missing = || DomainError::ValidationFailed(format!("'{}' is not synced", entry.name));
        let folder_link_id = entry.folder_link_id.ok_or_else(missing)?;
        let parent_folder_link_id = entry.parent_folder_link_id;
        if entry.is_folder {
            Ok(Self::Folder {
                folder_id: entry.folder_id.ok_or_else(missing)?,
                folder_link_id,
                parent_folder_link_id,
            })
        } else {
            Ok(Self::Record {
                record_id: entry.record_id.ok_or_else(missing)?,
                folder_link_id,
                parent_folder_link_id,
            })
        }
    }

    pub fn folder_link_id(&self) -> FolderLinkId {
        match self {
            Self::Folder { folder_link_id, .. } | Self::Record { folder_link_id, .. } => {
                *folder_link_id
            }
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder { .. })
    }
}

/// A JSON call against the archive service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Resolve the session archive's root folder
    GetRoot,
    /// Resolve a folder's identity and its child link ids
    NavigateMin {
        archive_number: ArchiveNumber,
        folder_link_id: FolderLinkId,
    },
    /// Fetch child items of a folder in server order
    GetLeanItems {
        archive_number: ArchiveNumber,
        folder_link_id: FolderLinkId,
        sort: SortOption,
        children: Vec<FolderLinkId>,
    },
    /// Register upload metadata, yielding a record id
    RegisterRecord {
        target: TargetFolder,
        display_name: String,
        upload_file_name: String,
        size: u64,
        mime_type: Option<String>,
    },
    /// Fetch a record's metadata including its download URL
    GetRecord {
        archive_number: ArchiveNumber,
        record_id: RecordId,
        folder_link_id: FolderLinkId,
    },
    /// Create a folder
    NewFolder {
        parent_folder_link_id: FolderLinkId,
        display_name: String,
    },
    Delete(ItemRef),
    /// Move or copy an item into another folder
    Relocate {
        item: ItemRef,
        destination_link_id: FolderLinkId,
        action: RelocateAction,
    },
    /// Look up the share link of an item, if it has one
    GetShareLink(ItemRef),
    /// Create the share link of an item
    GenerateShareLink(ItemRef),
    /// Save changed share link settings
    UpdateShareLink(ShareLink),
    /// Revoke a share link
    DropShareLink(ShareLink),
    /// List the share links of the session archive
    GetShares,
}

impl Endpoint {
    /// Path relative to the service base URL
    pub fn path(&self) -> String {
        match self {
            Self::GetRoot => "/folder/getRoot".to_string(),
            Self::NavigateMin { .. } => "/folder/navigateMin".to_string(),
            Self::GetLeanItems { .. } => "/folder/getLeanItems".to_string(),
            Self::RegisterRecord { .. } => "/record/registerRecord".to_string(),
            Self::GetRecord { .. } => "/record/get".to_string(),
            Self::NewFolder { .. } => "/folder/post".to_string(),
            Self::Delete(item) => {
                if item.is_folder() {
                    "/folder/delete".to_string()
                } else {
                    "/record/delete".to_string()
                }
            }
            Self::Relocate { item, action, .. } => {
                let kind = if item.is_folder() { "folder" } else { "record" };
                format!("/{kind}/{}", action.name())
            }
            Self::GetShareLink(_) => "/share/getLink".to_string(),
            Self::GenerateShareLink(_) => "/share/generateShareLink".to_string(),
            Self::UpdateShareLink(_) => "/share/updateShareLink".to_string(),
            Self::DropShareLink(_) => "/share/dropShareLink".to_string(),
            Self::GetShares => "/share/getShares".to_string(),
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetRoot => "get_root",
            Self::NavigateMin { .. } => "navigate_min",
            Self::GetLeanItems { .. } => "get_lean_items",
            Self::RegisterRecord { .. } => "register_record",
            Self::GetRecord { .. } => "get_record",
            Self::NewFolder { .. } => "new_folder",
            Self::Delete(_) => "delete",
            Self::Relocate { .. } => "relocate",
            Self::GetShareLink(_) => "get_share_link",
            Self::GenerateShareLink(_) => "generate_share_link",
            Self::UpdateShareLink(_) => "update_share_link",
            Self::DropShareLink(_) => "drop_share_link",
            Self::GetShares => "get_shares",
        }
    }

    /// Returns true for calls that change server state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::RegisterRecord { .. }
                | Self::NewFolder { .. }
                | Self::Delete(_)
                | Self::Relocate { .. }
                | Self::GenerateShareLink(_)
                | Self::UpdateShareLink(_)
                | Self::DropShareLink(_)
        )
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_ref() -> ItemRef {
        ItemRef::Record {
            record_id: RecordId::new(1).unwrap(),
            folder_link_id: FolderLinkId::new(2).unwrap(),
            parent_folder_link_id: None,
        }
    }

    #[test]
    fn test_paths() {
        assert_eq!(Endpoint::GetRoot.path(), "/folder/getRoot");
        assert_eq!(Endpoint::Delete(record_ref()).path(), "/record/delete");
        let relocate = Endpoint::Relocate {
            item: record_ref(),
            destination_link_id: FolderLinkId::new(9).unwrap(),
            action: RelocateAction::Copy,
        };
        assert_eq!(relocate.path(), "/record/copy");
        assert!(relocate.is_mutating());
        assert!(!Endpoint::GetRoot.is_mutating());
    }

    #[test]
    fn test_share_paths() {
        assert_eq!(Endpoint::GetShareLink(record_ref()).path(), "/share/getLink");
        assert!(!Endpoint::GetShareLink(record_ref()).is_mutating());
        let generate = Endpoint::GenerateShareLink(record_ref());
        assert_eq!(generate.path(), "/share/generateShareLink");
        assert!(generate.is_mutating());
        assert_eq!(Endpoint::GetShares.name(), "get_shares");
    }

    #[test]
    fn test_item_ref_from_entry() {
        let archive = ArchiveNumber::new("0a21-0000").unwrap();
        let folder = FileEntry::folder(
            "Photos",
            archive.clone(),
            FolderId::new(3).unwrap(),
            FolderLinkId::new(4).unwrap(),
        );
        let item = ItemRef::from_entry(&folder).unwrap();
        assert!(item.is_folder());
        assert_eq!(item.folder_link_id().get(), 4);
        assert_eq!(Endpoint::Delete(item).path(), "/folder/delete");
    }

    #[test]
    fn test_item_ref_rejects_placeholder() {
        let archive = ArchiveNumber::new("0a21-0000").unwrap();
        let placeholder = FileEntry::placeholder(
            "A.jpg",
            archive,
            FolderLinkId::new(4).unwrap(),
            crate::domain::SyncStatus::Waiting,
            crate::domain::QueueItemId::new(),
        )
        .unwrap();
        assert!(ItemRef::from_entry(&placeholder).is_err());
    }
}
