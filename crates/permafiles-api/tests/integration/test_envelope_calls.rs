//! JSON call tests: request bodies, status mapping and body decoding

use permafiles_core::domain::{ArchiveNumber, CsrfToken, FolderLinkId};
use permafiles_core::endpoint::Endpoint;
use permafiles_core::ports::{ApiRequest, DispatchError, DispatchResponse, IRequestDispatcher};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{mount_post, rejected, root_folder, setup_archive_mock, success};

#[tokio::test]
async fn test_get_root_posts_request_envelope() {
    let (server, dispatcher) = setup_archive_mock().await;
    let dispatcher = dispatcher.with_api_key("key-1");

    Mock::given(method("POST"))
        .and(path("/folder/getRoot"))
        .and(body_partial_json(json!({
            "RequestVO": { "apiKey": "key-1", "csrf": "tok-0", "data": [{ "FolderVO": {} }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success("tok-1", root_folder())))
        .expect(1)
        .mount(&server)
        .await;

    let request = ApiRequest::new(Endpoint::GetRoot, Some(CsrfToken::new("tok-0").unwrap()));
    let response = dispatcher.execute(request).await.unwrap();

    match response {
        DispatchResponse::Json(body) => {
            assert_eq!(body["csrf"], "tok-1");
            assert_eq!(body["isSuccessful"], true);
        }
        other => panic!("expected JSON, got {other:?}"),
    }
}

#[tokio::test]
async fn test_navigate_min_body_names_folder() {
    let (server, dispatcher) = setup_archive_mock().await;

    Mock::given(method("POST"))
        .and(path("/folder/navigateMin"))
        .and(body_partial_json(json!({
            "RequestVO": { "data": [{ "FolderVO": { "archiveNbr": "0a21-0000", "folder_linkId": 20 } }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success("t", json!({"FolderVO": {}}))))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = Endpoint::NavigateMin {
        archive_number: ArchiveNumber::new("0a21-0000").unwrap(),
        folder_link_id: FolderLinkId::new(20).unwrap(),
    };
    dispatcher
        .execute(ApiRequest::new(endpoint, None))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rejected_envelope_is_still_json() {
    let (server, dispatcher) = setup_archive_mock().await;
    mount_post(&server, "/folder/getRoot", rejected("warning.auth.mfaToken")).await;

    let response = dispatcher
        .execute(ApiRequest::new(Endpoint::GetRoot, None))
        .await
        .unwrap();
    assert!(matches!(response, DispatchResponse::Json(body) if body["isSuccessful"] == false));
}

#[tokio::test]
async fn test_error_status_carries_server_message() {
    let (server, dispatcher) = setup_archive_mock().await;
    Mock::given(method("POST"))
        .and(path("/folder/getRoot"))
        .respond_with(ResponseTemplate::new(401).set_body_json(rejected("warning.signin.required")))
        .mount(&server)
        .await;

    let err = dispatcher
        .execute(ApiRequest::new(Endpoint::GetRoot, None))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DispatchError::Status {
            code: 401,
            message: "warning.signin.required".into()
        }
    );
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_error_status_without_body_uses_reason() {
    let (server, dispatcher) = setup_archive_mock().await;
    Mock::given(method("POST"))
        .and(path("/folder/getRoot"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = dispatcher
        .execute(ApiRequest::new(Endpoint::GetRoot, None))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DispatchError::Status {
            code: 503,
            message: "Service Unavailable".into()
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_non_json_success_body_is_binary() {
    let (server, dispatcher) = setup_archive_mock().await;
    Mock::given(method("POST"))
        .and(path("/folder/getRoot"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let response = dispatcher
        .execute(ApiRequest::new(Endpoint::GetRoot, None))
        .await
        .unwrap();
    assert_eq!(
        response,
        DispatchResponse::Binary(b"<html>maintenance</html>".to_vec())
    );
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let dispatcher = permafiles_api::HttpDispatcher::with_base_url("http://127.0.0.1:1");
    let err = dispatcher
        .execute(ApiRequest::new(Endpoint::GetRoot, None))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Transport(_)));
    assert!(err.is_transient());
}
