//! Folder repository running against the HTTP dispatcher

use std::sync::Arc;

use permafiles_core::domain::SortOption;
use permafiles_sync::{FolderRepository, RepositoryError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{mount_post, rejected, root_folder, setup_archive_mock, success};

#[tokio::test]
async fn test_root_is_private_files_and_token_rotates() {
    let (server, dispatcher) = setup_archive_mock().await;
    mount_post(&server, "/folder/getRoot", success("tok-1", root_folder())).await;

    // The listing calls must carry the token handed out by getRoot.
    Mock::given(method("POST"))
        .and(path("/folder/navigateMin"))
        .and(body_partial_json(json!({"RequestVO": {"csrf": "tok-1"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(
            "tok-2",
            json!({"FolderVO": {
                "folderId": 10,
                "folder_linkId": 20,
                "ChildItemVOs": [{"folder_linkId": 31}, {"folder_linkId": 32}]
            }}),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/folder/getLeanItems"))
        .and(body_partial_json(json!({"RequestVO": {
            "csrf": "tok-2",
            "data": [{"FolderVO": {"ChildItemVOs": [{"folder_linkId": 31}, {"folder_linkId": 32}]}}]
        }})))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(
            "tok-3",
            json!({"FolderVO": {
                "folderId": 10,
                "folder_linkId": 20,
                "ChildItemVOs": [
                    {"folderId": 40, "folder_linkId": 31, "displayName": "Trips", "type": "type.folder"},
                    {"recordId": 5, "folder_linkId": 32, "displayName": "scan.pdf", "type": "type.record.document"}
                ]
            }}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let repository = FolderRepository::new(Arc::new(dispatcher));
    let root = repository.get_root().await.unwrap();
    assert_eq!(root.name, "My Files");
    assert_eq!(root.folder_link_id.unwrap().get(), 20);

    let files = repository
        .load_folder(&root, SortOption::NameAsc)
        .await
        .unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Trips", "scan.pdf"]);
    assert!(files[0].is_folder);
    assert_eq!(files[1].parent_folder_link_id.unwrap().get(), 20);
    assert_eq!(repository.csrf().unwrap().as_str(), "tok-3");
}

#[tokio::test]
async fn test_rejection_keeps_previous_token() {
    let (server, dispatcher) = setup_archive_mock().await;
    mount_post(&server, "/folder/getRoot", success("tok-1", root_folder())).await;
    mount_post(&server, "/folder/navigateMin", rejected("warning.folder.not_found")).await;

    let repository = FolderRepository::new(Arc::new(dispatcher));
    let root = repository.get_root().await.unwrap();
    let err = repository
        .load_folder(&root, SortOption::NameAsc)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "warning.folder.not_found");
    assert!(matches!(err, RepositoryError::Envelope(_)));
    assert_eq!(repository.csrf().unwrap().as_str(), "tok-1");
}

#[tokio::test]
async fn test_malformed_body_gets_generic_message() {
    let (server, dispatcher) = setup_archive_mock().await;
    mount_post(&server, "/folder/getRoot", json!({"unexpected": true})).await;

    let repository = FolderRepository::new(Arc::new(dispatcher));
    let err = repository.get_root().await.unwrap_err();
    assert_eq!(err.to_string(), "There was an error processing your request.");
}
