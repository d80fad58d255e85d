//! Request bodies
//!
//! Every JSON call posts the same wrapper around a single data object:
//!
//! ```text
//! { "RequestVO": { "data": [ { "FolderVO": { ... } } ], "apiKey": "...", "csrf": "..." } }
//! ```
//!
//! `apiKey` and `csrf` are only present when known.

use permafiles_core::{
    domain::{CsrfToken, DEFAULT_MIME_TYPE},
    endpoint::{Endpoint, ItemRef},
    envelope::ShareLinkVO,
};
use serde_json::{json, Map, Value};

/// Build the JSON body for `endpoint`
pub fn request_body(endpoint: &Endpoint, api_key: Option<&str>, csrf: Option<&CsrfToken>) -> Value {
    let mut request = Map::new();
    request.insert("data".to_string(), json!([data_object(endpoint)]));
    if let Some(key) = api_key {
        request.insert("apiKey".to_string(), json!(key));
    }
    if let Some(token) = csrf {
        request.insert("csrf".to_string(), json!(token.as_str()));
    }
    json!({ "RequestVO": Value::Object(request) })
}

fn data_object(endpoint: &Endpoint) -> Value {
    match endpoint {
        Endpoint::GetRoot => json!({ "FolderVO": {} }),
        Endpoint::NavigateMin {
            archive_number,
            folder_link_id,
        } => json!({
            "FolderVO": {
                "archiveNbr": archive_number.as_str(),
                "folder_linkId": folder_link_id.get(),
            }
        }),
        Endpoint::GetLeanItems {
            archive_number,
            folder_link_id,
            sort,
            children,
        } => {
            let child_items: Vec<Value> = children
                .iter()
                .map(|link| json!({ "folder_linkId": link.get() }))
                .collect();
            json!({
                "FolderVO": {
                    "archiveNbr": archive_number.as_str(),
                    "folder_linkId": folder_link_id.get(),
                    "sort": sort.wire_value(),
                    "ChildItemVOs": child_items,
                }
            })
        }
        Endpoint::RegisterRecord {
            target,
            display_name,
            upload_file_name,
            size,
            mime_type,
        } => json!({
            "RecordVO": {
                "parentFolderId": target.folder_id.get(),
                "parentFolder_linkId": target.folder_link_id.get(),
                "archiveNbr": target.archive_number.as_str(),
                "displayName": display_name,
                "uploadFileName": upload_file_name,
                "size": size,
            },
            "SimpleVO": {
                "key": "type",
                "value": mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE),
            }
        }),
        Endpoint::GetRecord {
            archive_number,
            record_id,
            folder_link_id,
        } => json!({
            "RecordVO": {
                "archiveNbr": archive_number.as_str(),
                "recordId": record_id.get(),
                "folder_linkId": folder_link_id.get(),
            }
        }),
        Endpoint::NewFolder {
            parent_folder_link_id,
            display_name,
        } => json!({
            "FolderVO": {
                "displayName": display_name,
                "parentFolder_linkId": parent_folder_link_id.get(),
            }
        }),
        Endpoint::Delete(item) => item_object(item),
        Endpoint::Relocate {
            item,
            destination_link_id,
            ..
        } => {
            let mut data = item_object(item);
            if let Value::Object(map) = &mut data {
                map.insert(
                    "FolderDestVO".to_string(),
                    json!({ "folder_linkId": destination_link_id.get() }),
                );
            }
            data
        }
        Endpoint::GetShareLink(item) | Endpoint::GenerateShareLink(item) => item_object(item),
        Endpoint::UpdateShareLink(link) | Endpoint::DropShareLink(link) => {
            json!({ "Shareby_urlVO": ShareLinkVO::from_link(link) })
        }
        Endpoint::GetShares => json!({}),
    }
}

/// Identity of an existing item, keyed by its kind
fn item_object(item: &ItemRef) -> Value {
    match item {
        ItemRef::Folder {
            folder_id,
            folder_link_id,
            parent_folder_link_id,
        } => {
            let mut vo = json!({
                "folderId": folder_id.get(),
                "folder_linkId": folder_link_id.get(),
            });
            if let (Value::Object(map), Some(parent)) = (&mut vo, parent_folder_link_id) {
                map.insert("parentFolder_linkId".to_string(), json!(parent.get()));
            }
            json!({ "FolderVO": vo })
        }
        ItemRef::Record {
            record_id,
            folder_link_id,
            parent_folder_link_id,
        } => {
            let mut vo = json!({
                "recordId": record_id.get(),
                "folder_linkId": folder_link_id.get(),
            });
            if let (Value::Object(map), Some(parent)) = (&mut vo, parent_folder_link_id) {
                map.insert("parentFolder_linkId".to_string(), json!(parent.get()));
            }
            json!({ "RecordVO": vo })
        }
    }
}
