//! Integration tests for artifact endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{PREFIX, TestServer};
use mountain_core::config::{NexusConfig, RepositoryConfig, StorageConfig};
use serde_json::Value;

const ROCKSPEC: &str = "lpeg-1.1.0-1.rockspec";

fn artifact_uri(name: &str) -> String {
    format!("{PREFIX}/{name}")
}

#[tokio::test]
async fn put_get_delete_round_trip() {
    let server = TestServer::new().await;
    let uri = artifact_uri(ROCKSPEC);

    assert_eq!(server.put(&uri, b"package = 'lpeg'").await, StatusCode::NO_CONTENT);

    let (status, content_type, body) = server.get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/plain; charset=utf-8"));
    assert_eq!(body, b"package = 'lpeg'");
    assert!(server.storage_dir.join(ROCKSPEC).is_file());

    assert_eq!(server.delete(&uri).await, StatusCode::NO_CONTENT);
    let (status, _, _) = server.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_missing_artifact_is_not_found() {
    let server = TestServer::new().await;

    let response = server
        .send(
            Request::builder()
                .uri(artifact_uri("missing-1.0-1.rockspec"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "not_found");
}

#[tokio::test]
async fn rewrite_is_rejected_by_default() {
    let server = TestServer::new().await;
    let uri = artifact_uri(ROCKSPEC);

    assert_eq!(server.put(&uri, b"first").await, StatusCode::NO_CONTENT);
    assert_eq!(server.put(&uri, b"second").await, StatusCode::CONFLICT);

    let (_, _, body) = server.get(&uri).await;
    assert_eq!(body, b"first");
}

#[tokio::test]
async fn rewrite_allowed_when_configured() {
    let server = TestServer::with_repository(|repo| repo.allow_rewrite = true).await;
    let uri = artifact_uri(ROCKSPEC);

    assert_eq!(server.put(&uri, b"first").await, StatusCode::NO_CONTENT);
    assert_eq!(server.put(&uri, b"second").await, StatusCode::NO_CONTENT);

    let (_, _, body) = server.get(&uri).await;
    assert_eq!(body, b"second");
}

#[tokio::test]
async fn disallowed_extension_is_rejected() {
    let server = TestServer::new().await;

    assert_eq!(
        server.put(&artifact_uri("evil.sh"), b"rm -rf /").await,
        StatusCode::BAD_REQUEST
    );
    let (status, _, body) = server.get(&artifact_uri("notes.txt")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["message"].as_str().unwrap().contains(".rockspec"));
}

#[tokio::test]
async fn extension_check_uses_decoded_filename() {
    let server = TestServer::new().await;

    // `%63` decodes to `c`, so the stored name is a plain rockspec.
    assert_eq!(
        server.put(&artifact_uri("lpeg-1.1.0-1.rockspe%63"), b"spec").await,
        StatusCode::NO_CONTENT
    );
    assert!(server.storage_dir.join(ROCKSPEC).is_file());

    let (status, _, body) = server.get(&artifact_uri(ROCKSPEC)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"spec");

    assert_eq!(
        server.put(&artifact_uri("evil%2Esh"), b"x").await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn invalid_storage_does_not_block_other_repositories() {
    let server = TestServer::with_config(|config| {
        config.storages.insert(
            "remote".to_string(),
            StorageConfig::Nexus(NexusConfig::new("", "rocks")),
        );
        config
            .repositories
            .push(RepositoryConfig::new("/remote", "remote"));
    })
    .await;

    assert!(server.state.storages.contains_key("local"));
    assert!(!server.state.storages.contains_key("remote"));
    assert_eq!(server.state.repositories.len(), 1);

    let uri = artifact_uri(ROCKSPEC);
    assert_eq!(server.put(&uri, b"spec").await, StatusCode::NO_CONTENT);
    let (status, _, _) = server.get(&uri).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = server.get(&format!("/remote/{ROCKSPEC}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn custom_extensions_are_honoured() {
    let server = TestServer::with_repository(|repo| {
        repo.allowed_file_extensions = vec![".rock".to_string()];
    })
    .await;

    assert_eq!(
        server.put(&artifact_uri("lpeg-1.1.0-1.linux-x86_64.rock"), b"bin").await,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        server.put(&artifact_uri(ROCKSPEC), b"spec").await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn empty_upload_is_rejected() {
    let server = TestServer::new().await;

    assert_eq!(
        server.put(&artifact_uri(ROCKSPEC), b"").await,
        StatusCode::BAD_REQUEST
    );
    assert!(!server.storage_dir.join(ROCKSPEC).exists());
}

#[tokio::test]
async fn upload_without_length_is_rejected() {
    let server = TestServer::new().await;

    let request = Request::builder()
        .method("PUT")
        .uri(artifact_uri(ROCKSPEC))
        .body(Body::from("data"))
        .unwrap();
    assert_eq!(
        server.send(request).await.status(),
        StatusCode::LENGTH_REQUIRED
    );
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let server = TestServer::with_repository(|repo| repo.max_file_size = 4).await;

    assert_eq!(
        server.put(&artifact_uri(ROCKSPEC), b"too large").await,
        StatusCode::PAYLOAD_TOO_LARGE
    );
    assert!(!server.storage_dir.join(ROCKSPEC).exists());
}

#[tokio::test]
async fn understated_length_is_caught_while_streaming() {
    let server = TestServer::with_repository(|repo| repo.max_file_size = 4).await;

    let request = Request::builder()
        .method("PUT")
        .uri(artifact_uri(ROCKSPEC))
        .header("content-length", "3")
        .body(Body::from("much more than four bytes"))
        .unwrap();
    assert_eq!(
        server.send(request).await.status(),
        StatusCode::PAYLOAD_TOO_LARGE
    );
    assert!(!server.storage_dir.join(ROCKSPEC).exists());
}

#[tokio::test]
async fn delete_with_body_is_rejected() {
    let server = TestServer::new().await;
    server.seed(ROCKSPEC, b"keep me");

    let request = Request::builder()
        .method("DELETE")
        .uri(artifact_uri(ROCKSPEC))
        .body(Body::from("payload"))
        .unwrap();
    assert_eq!(server.send(request).await.status(), StatusCode::BAD_REQUEST);
    assert!(server.storage_dir.join(ROCKSPEC).is_file());
}

#[tokio::test]
async fn delete_missing_artifact_succeeds() {
    let server = TestServer::new().await;
    assert_eq!(
        server.delete(&artifact_uri("ghost-0.1-1.rockspec")).await,
        StatusCode::NO_CONTENT
    );
}

#[tokio::test]
async fn unknown_prefix_is_not_found() {
    let server = TestServer::new().await;
    let (status, _, _) = server.get(&format!("/other/{ROCKSPEC}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn root_prefix_serves_artifacts() {
    let server = TestServer::with_repository(|repo| repo.prefix = "/".to_string()).await;

    assert_eq!(
        server.put(&format!("/{ROCKSPEC}"), b"root").await,
        StatusCode::NO_CONTENT
    );
    let (status, _, body) = server.get(&format!("/{ROCKSPEC}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"root");
}

#[tokio::test]
async fn responses_carry_request_id() {
    let server = TestServer::new().await;

    let generated = server
        .send(
            Request::builder()
                .uri(format!("{PREFIX}/manifest"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(generated.headers().contains_key("x-request-id"));

    let echoed = server
        .send(
            Request::builder()
                .uri(format!("{PREFIX}/manifest"))
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(echoed.headers()["x-request-id"], "abc-123");
}
