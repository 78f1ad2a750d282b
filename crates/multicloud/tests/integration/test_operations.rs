//! Operations dispatched through the client

use std::time::Duration;

use multicloud::{FacadeError, MultiCloudError};
use multicloud_core::domain::{DomainError, FileDescriptor, FileKind, OperationKind, Token};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

async fn mount_slow_account(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/mock/account"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"uid": "u1"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_second_call_while_busy_is_rejected() {
    let server = MockServer::start().await;
    mount_slow_account(&server).await;
    let harness = common::harness(&server);
    common::authorized_account(&harness, "work", common::PROVIDER, &Token::bearer("at")).await;

    let cloud = harness.cloud.clone();
    let running = tokio::spawn(async move { cloud.account_info("work").await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = harness.cloud.account_info("work").await;
    assert!(matches!(second, Err(FacadeError::OperationInProgress)));
    assert!(running.await.unwrap().unwrap().is_success());
}

#[tokio::test]
async fn test_abort_running_operation() {
    let server = MockServer::start().await;
    mount_slow_account(&server).await;
    let harness = common::harness(&server);
    common::authorized_account(&harness, "work", common::PROVIDER, &Token::bearer("at")).await;

    let cloud = harness.cloud.clone();
    let running = tokio::spawn(async move { cloud.account_info("work").await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.cloud.abort();

    let result = running.await.unwrap();
    assert!(matches!(
        result,
        Err(FacadeError::Operation(MultiCloudError::Aborted))
    ));
    assert!(harness.cloud.account_info("work").await.is_ok());
}

#[tokio::test]
async fn test_provider_error_is_carried_by_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mock/account"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "Forbidden"}
        })))
        .mount(&server)
        .await;
    let harness = common::harness(&server);
    common::authorized_account(&harness, "work", common::PROVIDER, &Token::bearer("at")).await;

    let outcome = harness.cloud.account_info("work").await.unwrap();

    assert!(!outcome.is_success());
    assert_eq!(outcome.error.map(|e| e.code), Some(403));
}

#[tokio::test]
async fn test_missing_template_is_rejected_before_sending() {
    let server = MockServer::start().await;
    let harness = common::harness(&server);
    common::authorized_account(&harness, "work", common::PROVIDER, &Token::bearer("at")).await;

    let result = harness.cloud.account_quota("work").await;

    assert!(matches!(
        result,
        Err(FacadeError::MissingTemplate {
            kind: OperationKind::AccountQuota,
            ..
        })
    ));
}

#[tokio::test]
async fn test_listing_a_file_is_rejected() {
    let server = MockServer::start().await;
    let harness = common::harness(&server);
    common::authorized_account(&harness, "work", common::PROVIDER, &Token::bearer("at")).await;
    let file = FileDescriptor::new("notes.txt", FileKind::File).with_id("f1");

    let result = harness.cloud.list_folder("work", &file, false).await;

    assert!(matches!(
        result,
        Err(FacadeError::Validation(DomainError::NotAFolder(_)))
    ));
}

#[tokio::test]
async fn test_list_root_folder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mock/folders/root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [
                {"key": "f1", "title": "notes.txt", "mimeType": "text/plain"}
            ]
        })))
        .mount(&server)
        .await;
    let harness = common::harness(&server);
    common::authorized_account(&harness, "work", common::PROVIDER, &Token::bearer("at")).await;
    let root = harness.cloud.root_folder("work").unwrap().with_id("root");

    let outcome = harness.cloud.list_folder("work", &root, false).await.unwrap();

    let listing = outcome.result.expect("listing");
    assert_eq!(listing.children.len(), 1);
    assert_eq!(listing.children[0].name.as_deref(), Some("notes.txt"));
}

#[tokio::test]
async fn test_download_from_two_accounts() {
    let server = MockServer::start().await;
    let content = common::payload(12);
    for (provider, token) in [(common::PROVIDER, "at-a"), (common::MIRROR, "at-b")] {
        for start in (0..content.len()).step_by(4) {
            Mock::given(method("GET"))
                .and(path(format!("/{}/files/v1", provider)))
                .and(header("Authorization", format!("Bearer {}", token).as_str()))
                .and(header("Range", format!("bytes={}-{}", start, start + 3).as_str()))
                .respond_with(
                    ResponseTemplate::new(206).set_body_bytes(content[start..start + 4].to_vec()),
                )
                .mount(&server)
                .await;
        }
    }

    let harness = common::harness(&server);
    common::authorized_account(&harness, "a", common::PROVIDER, &Token::bearer("at-a")).await;
    common::authorized_account(&harness, "b", common::MIRROR, &Token::bearer("at-b")).await;
    let file = FileDescriptor::new("video.mp4", FileKind::File)
        .with_id("v1")
        .with_size(12);

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("video.mp4");
    let sources = [("a", file.clone()), ("b", file)];
    let outcome = harness.cloud.download(&sources, &destination).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(std::fs::read(&destination).unwrap(), content);
}

#[tokio::test]
async fn test_download_needs_sources() {
    let server = MockServer::start().await;
    let harness = common::harness(&server);
    let dir = tempfile::tempdir().unwrap();

    let result = harness.cloud.download(&[], dir.path().join("out")).await;

    assert!(matches!(result, Err(FacadeError::NoSources)));
}
