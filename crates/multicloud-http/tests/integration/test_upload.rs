//! Session-based chunked upload against a mock provider

use multicloud_core::domain::{FileDescriptor, FileKind, HttpVerb, RequestBody, RequestTemplate};
use multicloud_http::upload::{FileUploadOp, UploadTemplates};
use multicloud_http::{MultiCloudError, Operation, OperationPhase, OperationState};
use serde_json::json;
use wiremock::matchers::{body_bytes, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

fn folder() -> FileDescriptor {
    FileDescriptor::folder_at("/docs").with_id("d1")
}

fn session_templates(server: &MockServer) -> UploadTemplates {
    let metadata = json!({"name": "<name>", "parent": "<id>", "size": "<size>"});
    UploadTemplates {
        begin: Some(
            common::template(server, HttpVerb::Post, "/upload/start")
                .with_body(RequestBody::Json(metadata.as_object().unwrap().clone()))
                .with_mapping("sessionId", "upload_id"),
        ),
        execute: Some(
            common::template(server, HttpVerb::Put, "/upload/<session_id>")
                .with_header("Content-Range", "bytes <offset>-<range_end>/<size>")
                .with_body(RequestBody::Data),
        ),
        finish: Some(
            common::template(server, HttpVerb::Post, "/upload/<session_id>/commit")
                .with_mapping("id", "key")
                .with_mapping("name", "title")
                .with_mapping("size", "bytes"),
        ),
    }
}

#[tokio::test]
async fn test_upload_in_chunks_through_a_session() {
    let server = common::start_provider().await;
    let content = common::payload(10);

    Mock::given(method("POST"))
        .and(path("/upload/start"))
        .and(body_json(json!({"name": "notes.txt", "parent": "d1", "size": "10"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upload_id": "s1"})))
        .expect(1)
        .mount(&server)
        .await;
    for (start, end) in [(0usize, 4usize), (4, 8), (8, 10)] {
        Mock::given(method("PUT"))
            .and(path("/upload/s1"))
            .and(header(
                "Content-Range",
                format!("bytes {}-{}/10", start, end - 1).as_str(),
            ))
            .and(body_bytes(content[start..end].to_vec()))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/upload/s1/commit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key": "u1",
            "title": "notes.txt",
            "bytes": 10
        })))
        .expect(1)
        .mount(&server)
        .await;

    let handler = FileUploadOp::new(session_templates(&server), folder(), "notes.txt", 10, std::io::Cursor::new(content))
        .unwrap()
        .with_chunk_size(4)
        .unwrap();
    let mut op = Operation::new(handler, common::client());

    op.execute().await.expect("upload failed");

    assert_eq!(op.handler().session().session_id.as_deref(), Some("s1"));
    assert_eq!(op.handler().transferred(), 10);
    let uploaded = op.result().expect("uploaded file");
    assert_eq!(uploaded.id.as_deref(), Some("u1"));
    assert_eq!(uploaded.size, 10);
    assert_eq!(uploaded.kind, Some(FileKind::File));
}

#[tokio::test]
async fn test_session_read_from_location_header() {
    let server = common::start_provider().await;
    let location = format!("{}/resumable?upload_id=xyz", server.uri());

    Mock::given(method("POST"))
        .and(path("/upload/start"))
        .respond_with(ResponseTemplate::new(200).insert_header("Location", location.as_str()))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/resumable"))
        .and(query_param("upload_id", "xyz"))
        .and(body_bytes(b"hello".to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let templates = UploadTemplates {
        begin: Some(
            common::template(&server, HttpVerb::Post, "/upload/start").with_mapping("sessionId", "upload_id"),
        ),
        execute: Some(RequestTemplate::new(HttpVerb::Put, "<session_location>").with_body(RequestBody::Data)),
        finish: None,
    };
    let handler = FileUploadOp::new(templates, folder(), "hello.txt", 5, &b"hello"[..]).unwrap();
    let mut op = Operation::new(handler, common::client());

    op.execute().await.unwrap();

    assert_eq!(op.handler().session().session_id.as_deref(), Some("xyz"));
    let uploaded = op.result().expect("synthesized descriptor");
    assert_eq!(uploaded.name.as_deref(), Some("hello.txt"));
    assert_eq!(uploaded.path.as_deref(), Some("/docs/hello.txt"));
    assert!(uploaded.is_file());
}

#[tokio::test]
async fn test_provider_error_stops_upload() {
    let server = common::start_provider().await;
    Mock::given(method("POST"))
        .and(path("/upload/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upload_id": "s1"})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/s1"))
        .respond_with(ResponseTemplate::new(507).set_body_json(json!({
            "error": {"code": 507, "message": "quota exceeded"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/s1/commit"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let handler = FileUploadOp::new(session_templates(&server), folder(), "big.bin", 10, std::io::Cursor::new(common::payload(10)))
        .unwrap()
        .with_chunk_size(4)
        .unwrap();
    let mut op = Operation::new(handler, common::client());

    op.execute().await.unwrap();

    assert_eq!(op.state(), OperationState::Failed(OperationPhase::Execute));
    assert_eq!(op.error().map(|e| e.code), Some(507));
    assert_eq!(op.handler().transferred(), 0);
    assert!(op.result().is_none());
}

#[tokio::test]
async fn test_aborted_upload_sends_nothing() {
    let server = common::start_provider().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let handler = FileUploadOp::new(session_templates(&server), folder(), "a.txt", 1, &b"a"[..]).unwrap();
    let mut op = Operation::new(handler, common::client());
    op.abort_handle().cancel();

    let result = op.execute().await;

    assert!(matches!(result, Err(MultiCloudError::Aborted)));
    assert_eq!(op.state(), OperationState::Aborted(OperationPhase::Begin));
}

#[tokio::test]
async fn test_finish_sends_whole_stream() {
    let server = common::start_provider().await;
    let content = common::payload(10);
    Mock::given(method("PUT"))
        .and(path("/files/docs/notes.txt"))
        .and(body_bytes(content.clone()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "key": "u9",
            "title": "notes.txt",
            "bytes": 10
        })))
        .expect(1)
        .mount(&server)
        .await;

    let templates = UploadTemplates {
        begin: None,
        execute: None,
        finish: Some(
            common::template(&server, HttpVerb::Put, "/files<path>")
                .with_body(RequestBody::Data)
                .with_mapping("id", "key")
                .with_mapping("name", "title")
                .with_mapping("size", "bytes"),
        ),
    };
    let handler = FileUploadOp::new(templates, folder(), "notes.txt", 10, std::io::Cursor::new(content))
        .unwrap()
        .with_chunk_size(4)
        .unwrap();
    let mut op = Operation::new(handler, common::client());

    op.execute().await.unwrap();

    assert_eq!(op.state(), OperationState::Done);
    assert_eq!(op.handler().transferred(), 10);
    let uploaded = op.result().expect("uploaded file");
    assert_eq!(uploaded.id.as_deref(), Some("u9"));
    assert_eq!(uploaded.kind, Some(FileKind::File));
}

#[tokio::test]
async fn test_finish_without_body_synthesizes_file() {
    let server = common::start_provider().await;
    Mock::given(method("POST"))
        .and(path("/upload/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upload_id": "s1"})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/s1"))
        .respond_with(ResponseTemplate::new(202))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/s1/commit"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let handler = FileUploadOp::new(session_templates(&server), folder(), "notes.txt", 6, std::io::Cursor::new(common::payload(6)))
        .unwrap()
        .with_chunk_size(4)
        .unwrap();
    let mut op = Operation::new(handler, common::client());

    op.execute().await.unwrap();

    let uploaded = op.result().expect("synthesized descriptor");
    assert_eq!(uploaded.name.as_deref(), Some("notes.txt"));
    assert_eq!(uploaded.kind, Some(FileKind::File));
    assert_eq!(uploaded.size, 6);
    assert_eq!(uploaded.path.as_deref(), Some("/docs/notes.txt"));
    assert!(uploaded.id.is_none());
}

#[tokio::test]
async fn test_offset_mismatch_ends_upload() {
    let server = common::start_provider().await;
    Mock::given(method("POST"))
        .and(path("/upload/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upload_id": "s1"})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"offset": 2})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/s1/commit"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let handler = FileUploadOp::new(session_templates(&server), folder(), "notes.txt", 10, std::io::Cursor::new(common::payload(10)))
        .unwrap()
        .with_chunk_size(4)
        .unwrap();
    let mut op = Operation::new(handler, common::client());

    let result = op.execute().await;

    assert!(matches!(result, Err(MultiCloudError::UnexpectedResponse(_))));
    assert_eq!(op.state(), OperationState::Failed(OperationPhase::Execute));
}
