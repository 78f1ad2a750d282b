//! Account, folder and item operations against a mock provider

use multicloud_core::domain::{FileDescriptor, FileKind, HttpVerb, RequestBody};
use multicloud_http::ops::{AccountInfoOp, AccountQuotaOp, DeleteOp, FolderCreateOp, FolderListOp, MoveOp};
use multicloud_http::{Operation, OperationPhase, OperationState};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_account_quota_is_normalized() {
    let server = common::start_provider().await;
    Mock::given(method("GET"))
        .and(path("/drive"))
        .and(header("Authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "quota": {"total": 5_000, "used": 1_200, "remaining": 3_800}
        })))
        .mount(&server)
        .await;

    let template = common::template(&server, HttpVerb::Get, "/drive")
        .with_mapping("totalBytes", "quota/total")
        .with_mapping("usedBytes", "quota/used")
        .with_mapping("freeBytes", "quota/remaining");
    let mut op = Operation::new(AccountQuotaOp::new(template), common::client());

    op.execute().await.expect("quota operation failed");

    let quota = op.result().expect("quota result");
    assert_eq!(quota.total_bytes, 5_000);
    assert_eq!(quota.used_bytes, 1_200);
    assert_eq!(quota.free_bytes, 3_800);
    assert_eq!(op.state(), OperationState::Done);
}

#[tokio::test]
async fn test_token_sent_as_query_parameter() {
    let server = common::start_provider().await;
    Mock::given(method("GET"))
        .and(path("/account"))
        .and(query_param("access_token", common::ACCESS_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uid": "u77",
            "display": "Jane Doe"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let template = common::template(&server, HttpVerb::Get, "/account")
        .with_authorization_param("access_token")
        .with_mapping("id", "uid")
        .with_mapping("name", "display");
    let mut op = Operation::new(AccountInfoOp::new(template), common::client());

    op.execute().await.unwrap();

    let info = op.into_outcome().result.expect("account info");
    assert_eq!(info.name.as_deref(), Some("Jane Doe"));
}

#[tokio::test]
async fn test_list_folder_with_nested_children() {
    let server = common::start_provider().await;
    Mock::given(method("GET"))
        .and(path("/folders/d1/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [
                {"key": "f1", "title": "notes.txt", "mimeType": "text/plain", "bytes": 12},
                {"key": "f2", "title": "Photos", "mimeType": "application/vnd.google-apps.folder"},
                {"key": "f3", "title": "old.txt", "mimeType": "text/plain", "trashed": true}
            ]
        })))
        .mount(&server)
        .await;

    let template = common::template(&server, HttpVerb::Get, "/folders/<id>/children")
        .with_mapping("content", "entries")
        .with_mapping("id", "key")
        .with_mapping("name", "title")
        .with_mapping("size", "bytes")
        .with_mapping("deleted", "trashed");
    let folder = FileDescriptor::folder_at("/docs").with_id("d1");
    let handler = FolderListOp::new(template, folder).unwrap();
    let mut op = Operation::new(handler, common::client());

    op.execute().await.unwrap();

    let listing = op.result().expect("listing");
    assert_eq!(listing.id.as_deref(), Some("d1"));
    assert_eq!(listing.kind, Some(FileKind::Folder));
    assert_eq!(listing.children.len(), 2);

    let notes = &listing.children[0];
    assert_eq!(notes.id.as_deref(), Some("f1"));
    assert_eq!(notes.name.as_deref(), Some("notes.txt"));
    assert_eq!(notes.size, 12);
    assert_eq!(notes.kind, Some(FileKind::File));
    assert_eq!(listing.children[1].kind, Some(FileKind::Folder));
}

#[tokio::test]
async fn test_create_folder_sends_mapped_body() {
    let server = common::start_provider().await;
    Mock::given(method("POST"))
        .and(path("/folders"))
        .and(body_json(json!({"title": "reports", "parent_ids": ["p1"]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "key": "n1",
            "title": "reports"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let body = json!({"title": "<name>", "parent_ids": ["<id>"]});
    let template = common::template(&server, HttpVerb::Post, "/folders")
        .with_body(RequestBody::Json(body.as_object().unwrap().clone()))
        .with_mapping("id", "key")
        .with_mapping("name", "title");
    let parent = FileDescriptor::folder_at("/docs").with_id("p1");
    let handler = FolderCreateOp::new(template, parent, "reports").unwrap();
    let mut op = Operation::new(handler, common::client());

    op.execute().await.unwrap();

    let created = op.result().expect("created folder");
    assert_eq!(created.id.as_deref(), Some("n1"));
    assert_eq!(created.name.as_deref(), Some("reports"));
    assert!(created.is_folder());
}

#[tokio::test]
async fn test_delete_with_empty_response() {
    let server = common::start_provider().await;
    Mock::given(method("DELETE"))
        .and(path("/files/f1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let template = common::template(&server, HttpVerb::Delete, "/files/<id>");
    let item = FileDescriptor::new("notes.txt", FileKind::File).with_id("f1");
    let mut op = Operation::new(DeleteOp::new(template, item), common::client());

    op.execute().await.unwrap();

    let outcome = op.into_outcome();
    assert!(outcome.is_success());
    let deleted = outcome.result.expect("deleted descriptor");
    assert!(deleted.deleted);
    assert_eq!(deleted.id.as_deref(), Some("f1"));
}

#[tokio::test]
async fn test_move_with_webdav_verb() {
    let server = common::start_provider().await;
    Mock::given(method("MOVE"))
        .and(path("/dav/docs/q3.pdf"))
        .and(header("Destination", "/archive/q3.pdf"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let template = common::template(&server, HttpVerb::Move, "/dav<path>")
        .with_header("Destination", "<destination_path>");
    let item = FileDescriptor::new("q3.pdf", FileKind::File)
        .with_id("f9")
        .with_path("/docs/q3.pdf");
    let destination = FileDescriptor::folder_at("/archive");
    let handler = MoveOp::new(template, item, destination, None).unwrap();
    let mut op = Operation::new(handler, common::client());

    op.execute().await.unwrap();

    let moved = op.result().expect("moved descriptor");
    assert_eq!(moved.id.as_deref(), Some("f9"));
    assert_eq!(moved.path.as_deref(), Some("/archive/q3.pdf"));
}

#[tokio::test]
async fn test_provider_error_is_recorded_not_raised() {
    let server = common::start_provider().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "account not found"}
        })))
        .mount(&server)
        .await;

    let template = common::template(&server, HttpVerb::Get, "/me");
    let mut op = Operation::new(AccountInfoOp::new(template), common::client());

    op.execute().await.expect("provider errors are not raised");

    let error = op.error().expect("recorded error");
    assert_eq!(error.code, 404);
    assert_eq!(error.message.as_deref(), Some("account not found"));
    assert!(op.result().is_none());
    assert_eq!(op.state(), OperationState::Failed(OperationPhase::Execute));
}

#[tokio::test]
async fn test_error_without_body_uses_status_line() {
    let server = common::start_provider().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let template = common::template(&server, HttpVerb::Get, "/me");
    let mut op = Operation::new(AccountInfoOp::new(template), common::client());
    op.execute().await.unwrap();

    assert_eq!(op.error().map(|e| e.code), Some(503));
}

#[tokio::test]
async fn test_unparsable_body_is_recorded() {
    let server = common::start_provider().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let template = common::template(&server, HttpVerb::Get, "/me");
    let mut op = Operation::new(AccountInfoOp::new(template), common::client());

    op.execute().await.unwrap();

    assert!(op.result().is_none());
    assert!(op.error().is_none());
    assert!(op.parse_failure().is_some());
}
