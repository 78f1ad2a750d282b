//! Multi-source chunked download against mock providers

use std::sync::{Arc, Mutex};

use multicloud_core::domain::{FileDescriptor, FileKind, HttpVerb};
use multicloud_core::ports::ProgressTracker;
use multicloud_http::download::{DownloadSource, FileDownloadOp};
use multicloud_http::{MultiCloudError, Operation, OperationState};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

const CHUNK: u64 = 4;

/// Serves every 4-byte range of `content` under `route` with 206 responses
async fn mount_ranges(server: &MockServer, route: &str, content: &[u8]) {
    for start in (0..content.len()).step_by(CHUNK as usize) {
        let end = (start + CHUNK as usize).min(content.len());
        Mock::given(method("GET"))
            .and(path(route))
            .and(header("Range", format!("bytes={}-{}", start, end - 1).as_str()))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(content[start..end].to_vec()))
            .mount(server)
            .await;
    }
}

async fn mount_failure(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

fn source(server: &MockServer, account: &str, size: u64) -> DownloadSource {
    DownloadSource::new(
        account,
        FileDescriptor::new("video.mp4", FileKind::File)
            .with_id("v1")
            .with_size(size),
        common::template(server, HttpVerb::Get, &format!("/{}/files/<id>", account)),
        common::token(),
    )
}

#[tokio::test]
async fn test_download_survives_a_failing_source() {
    let server = common::start_provider().await;
    let content = common::payload(10);
    mount_ranges(&server, "/healthy/files/v1", &content).await;
    mount_failure(&server, "/broken/files/v1").await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("video.mp4");
    let sources = vec![
        source(&server, "healthy", 10),
        source(&server, "broken", 10),
    ];
    let handler = FileDownloadOp::new(sources, &destination)
        .unwrap()
        .with_chunk_size(CHUNK);
    let mut op = Operation::new(handler, common::client());

    op.execute().await.expect("download failed");

    assert_eq!(op.state(), OperationState::Done);
    assert_eq!(op.handler().remaining_chunks(), 0);
    assert_eq!(std::fs::read(&destination).unwrap(), content);
    assert_eq!(op.result().and_then(|f| f.name.as_deref()), Some("video.mp4"));
}

#[tokio::test]
async fn test_download_spreads_chunks_across_sources() {
    let server = common::start_provider().await;
    let content = common::payload(23);
    mount_ranges(&server, "/one/files/v1", &content).await;
    mount_ranges(&server, "/two/files/v1", &content).await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("video.mp4");
    let sources = vec![source(&server, "one", 23), source(&server, "two", 23)];
    let handler = FileDownloadOp::new(sources, &destination)
        .unwrap()
        .with_chunk_size(CHUNK);
    let mut op = Operation::new(handler, common::client());

    op.execute().await.unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), content);
}

#[tokio::test]
async fn test_download_fails_when_every_source_fails() {
    let server = common::start_provider().await;
    mount_failure(&server, "/a/files/v1").await;
    mount_failure(&server, "/b/files/v1").await;

    let dir = tempfile::tempdir().unwrap();
    let sources = vec![source(&server, "a", 10), source(&server, "b", 10)];
    let handler = FileDownloadOp::new(sources, dir.path().join("out"))
        .unwrap()
        .with_chunk_size(CHUNK);
    let mut op = Operation::new(handler, common::client());

    let result = op.execute().await;

    match result {
        Err(MultiCloudError::Download { remaining, .. }) => assert_eq!(remaining, 3),
        other => panic!("expected incomplete download, got {:?}", other),
    }
    assert!(op.result().is_none());
}

#[tokio::test]
async fn test_single_chunk_accepts_full_response() {
    let server = common::start_provider().await;
    let content = common::payload(10);
    Mock::given(method("GET"))
        .and(path("/only/files/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("video.mp4");
    let handler = FileDownloadOp::new(vec![source(&server, "only", 10)], &destination).unwrap();
    let mut op = Operation::new(handler, common::client());

    op.execute().await.unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), content);
}

#[tokio::test]
async fn test_progress_reports_final_total() {
    let server = common::start_provider().await;
    let content = common::payload(10);
    mount_ranges(&server, "/healthy/files/v1", &content).await;

    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let tracker = Arc::new(ProgressTracker::new(Arc::new(move |done: u64, total: u64| {
        sink.lock().unwrap().push((done, total));
    })));

    let dir = tempfile::tempdir().unwrap();
    let handler = FileDownloadOp::new(vec![source(&server, "healthy", 10)], dir.path().join("v"))
        .unwrap()
        .with_chunk_size(CHUNK)
        .with_progress(Arc::clone(&tracker));
    let mut op = Operation::new(handler, common::client());

    op.execute().await.unwrap();

    assert_eq!(reports.lock().unwrap().last(), Some(&(10, 10)));
    assert_eq!(tracker.transferred(), 10);
}
