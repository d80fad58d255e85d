//! Shared helpers for archive service integration tests
//!
//! Each helper mounts the mock endpoints a test needs and returns a
//! dispatcher pointing at the mock server.

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use permafiles_api::HttpDispatcher;

/// Start a mock server and a dispatcher that talks to it
pub async fn setup_archive_mock() -> (MockServer, HttpDispatcher) {
    let server = MockServer::start().await;
    let dispatcher = HttpDispatcher::with_base_url(server.uri());
    (server, dispatcher)
}

/// Successful envelope around one data object
pub fn success(csrf: &str, data: Value) -> Value {
    json!({
        "isSuccessful": true,
        "csrf": csrf,
        "Results": [{ "data": [data], "message": [] }]
    })
}

/// Rejected envelope carrying one message
pub fn rejected(message: &str) -> Value {
    json!({
        "isSuccessful": false,
        "Results": [{ "data": [], "message": [message] }]
    })
}

/// Mount a POST endpoint answering with `body`
pub async fn mount_post(server: &MockServer, endpoint_path: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path(endpoint_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mount a GET endpoint serving raw bytes
pub async fn mount_download(server: &MockServer, file_path: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(server)
        .await;
}

/// Root folder listing a private files child
pub fn root_folder() -> Value {
    json!({
        "FolderVO": {
            "folderId": 1,
            "folder_linkId": 2,
            "archiveNbr": "0a21-0000",
            "displayName": "Root",
            "type": "type.folder.root.root",
            "ChildItemVOs": [
                {
                    "folderId": 10,
                    "folder_linkId": 20,
                    "archiveNbr": "0a21-0000",
                    "displayName": "My Files",
                    "type": "type.folder.root.private"
                },
                {
                    "folderId": 11,
                    "folder_linkId": 21,
                    "archiveNbr": "0a21-0000",
                    "displayName": "Public",
                    "type": "type.folder.root.public"
                }
            ]
        }
    })
}
