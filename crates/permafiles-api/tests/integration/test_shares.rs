//! Share link calls through the HTTP dispatcher

use std::sync::Arc;

use permafiles_core::domain::{ArchiveNumber, FileEntry, FolderId, FolderLinkId, Permission};
use permafiles_sync::FolderRepository;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{mount_post, rejected, root_folder, setup_archive_mock, success};

fn link_vo(max_uses: u32) -> serde_json::Value {
    json!({"Shareby_urlVO": {
        "shareby_urlId": 77,
        "folder_linkId": 20,
        "urlToken": "a1b2",
        "shareUrl": "https://www.permanent.org/share/a1b2",
        "previewToggle": 1,
        "autoApproveToggle": 0,
        "expiresDT": null,
        "maxUses": max_uses,
        "uses": 0
    }})
}

async fn private_root(repository: &FolderRepository) -> FileEntry {
    let root = repository.get_root().await.unwrap();
    assert_eq!(root.name, "My Files");
    root
}

#[tokio::test]
async fn test_generate_update_and_drop_share_link() {
    let (server, dispatcher) = setup_archive_mock().await;
    mount_post(&server, "/folder/getRoot", success("tok-1", root_folder())).await;

    Mock::given(method("POST"))
        .and(path("/share/generateShareLink"))
        .and(body_partial_json(json!({"RequestVO": {
            "csrf": "tok-1",
            "data": [{"FolderVO": {"folderId": 10, "folder_linkId": 20}}]
        }})))
        .respond_with(ResponseTemplate::new(200).set_body_json(success("tok-2", link_vo(0))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/share/updateShareLink"))
        .and(body_partial_json(json!({"RequestVO": {
            "csrf": "tok-2",
            "data": [{"Shareby_urlVO": {"shareby_urlId": 77, "maxUses": 5, "autoApproveToggle": 1}}]
        }})))
        .respond_with(ResponseTemplate::new(200).set_body_json(success("tok-3", link_vo(5))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/share/dropShareLink"))
        .and(body_partial_json(json!({"RequestVO": {
            "csrf": "tok-3",
            "data": [{"Shareby_urlVO": {"shareby_urlId": 77}}]
        }})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "isSuccessful": true,
            "csrf": "tok-4",
            "Results": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let repository = FolderRepository::new(Arc::new(dispatcher));
    let root = private_root(&repository).await;

    let link = repository.generate_share_link(&root).await.unwrap();
    assert_eq!(link.url, "https://www.permanent.org/share/a1b2");
    assert!(link.settings.preview);
    assert_eq!(link.settings.max_uses, None);

    let mut settings = link.settings.clone();
    settings.max_uses = Some(5);
    settings.auto_approve = true;
    let updated = repository
        .update_share_link(&link.with_settings(settings))
        .await
        .unwrap();
    assert_eq!(updated.settings.max_uses, Some(5));

    repository.drop_share_link(&updated).await.unwrap();
    assert_eq!(repository.csrf().unwrap().as_str(), "tok-4");
}

#[tokio::test]
async fn test_unshared_item_has_no_link() {
    let (server, dispatcher) = setup_archive_mock().await;
    mount_post(&server, "/folder/getRoot", success("tok-1", root_folder())).await;
    mount_post(&server, "/share/getLink", success("tok-2", json!({}))).await;

    let repository = FolderRepository::new(Arc::new(dispatcher));
    let root = private_root(&repository).await;
    assert!(!root.can(Permission::Share));

    assert_eq!(repository.get_share_link(&root).await.unwrap(), None);
}

#[tokio::test]
async fn test_get_shares_and_rejection() {
    let (server, dispatcher) = setup_archive_mock().await;
    mount_post(
        &server,
        "/share/getShares",
        json!({
            "isSuccessful": true,
            "csrf": "tok-1",
            "Results": [{"data": [link_vo(0), link_vo(3)], "message": []}]
        }),
    )
    .await;
    mount_post(&server, "/share/getLink", rejected("warning.share.no_access")).await;

    let repository = FolderRepository::new(Arc::new(dispatcher));
    let links = repository.get_shares().await.unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[1].settings.max_uses, Some(3));

    let err = repository
        .get_share_link(&FileEntry::folder(
            "Photos",
            ArchiveNumber::new("0a21-0000").unwrap(),
            FolderId::new(10).unwrap(),
            FolderLinkId::new(20).unwrap(),
        ))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "warning.share.no_access");
}
