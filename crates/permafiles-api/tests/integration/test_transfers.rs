//! Binary transfer tests: multipart uploads and streamed downloads

use std::sync::{Arc, Mutex};

use permafiles_api::UPLOAD_PATH;
use permafiles_core::domain::RecordId;
use permafiles_core::ports::{
    DispatchError, DispatchResponse, IRequestDispatcher, ProgressFn, TransferRequest,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{mount_download, setup_archive_mock, success};

type Recorded = Arc<Mutex<Vec<(u64, u64)>>>;

fn recording_progress() -> (Recorded, ProgressFn) {
    let seen: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: ProgressFn = Box::new(move |done, total| {
        sink.lock().unwrap().push((done, total));
    });
    (seen, callback)
}

#[tokio::test]
async fn test_upload_streams_file_as_multipart() {
    let (server, dispatcher) = setup_archive_mock().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(
            "tok-2",
            json!({"RecordVO": {"recordId": 77}}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("photo.jpg");
    let content = vec![7u8; 64 * 1024];
    std::fs::write(&file, &content).unwrap();

    let (seen, progress) = recording_progress();
    let response = dispatcher
        .transfer(
            TransferRequest::Upload {
                record_id: RecordId::new(77).unwrap(),
                path: file,
                filename: "photo.jpg".into(),
                mime_type: "image/jpeg".into(),
                size: content.len() as u64,
            },
            progress,
        )
        .await
        .unwrap();

    assert!(matches!(response, DispatchResponse::Json(body) if body["csrf"] == "tok-2"));

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"recordid\""));
    assert!(body.contains("77"));
    assert!(body.contains("filename=\"photo.jpg\""));
    assert!(body.contains("image/jpeg"));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.last(), Some(&(65_536, 65_536)));
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[tokio::test]
async fn test_upload_of_missing_file_sends_nothing() {
    let (server, dispatcher) = setup_archive_mock().await;
    let (_seen, progress) = recording_progress();

    let err = dispatcher
        .transfer(
            TransferRequest::Upload {
                record_id: RecordId::new(1).unwrap(),
                path: "/definitely/not/here.bin".into(),
                filename: "here.bin".into(),
                mime_type: "application/octet-stream".into(),
                size: 3,
            },
            progress,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Transport(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_download_collects_bytes_with_progress() {
    let (server, dispatcher) = setup_archive_mock().await;
    let content = b"the quick brown fox".to_vec();
    mount_download(&server, "/files/5/original", &content).await;

    let (seen, progress) = recording_progress();
    let response = dispatcher
        .transfer(
            TransferRequest::Download {
                url: format!("{}/files/5/original", server.uri()),
            },
            progress,
        )
        .await
        .unwrap();

    assert_eq!(response, DispatchResponse::Binary(content.clone()));
    let total = content.len() as u64;
    assert_eq!(seen.lock().unwrap().last(), Some(&(total, total)));
}

#[tokio::test]
async fn test_download_error_status() {
    let (server, dispatcher) = setup_archive_mock().await;
    Mock::given(method("GET"))
        .and(path("/files/6/original"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Access denied"))
        .mount(&server)
        .await;

    let (_seen, progress) = recording_progress();
    let err = dispatcher
        .transfer(
            TransferRequest::Download {
                url: format!("{}/files/6/original", server.uri()),
            },
            progress,
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DispatchError::Status {
            code: 403,
            message: "Access denied".into()
        }
    );
}
