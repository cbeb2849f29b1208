//! Server test utilities.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use mountain_core::config::{AppConfig, FilesystemConfig, RepositoryConfig, StorageConfig};
use mountain_server::bootstrap::build_state;
use mountain_server::{AppState, create_router};
use std::path::PathBuf;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Prefix of the repository every test server mounts.
#[allow(dead_code)]
pub const PREFIX: &str = "/rocks";

/// A test server backed by a temporary filesystem storage.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub storage_dir: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server with one repository at [`PREFIX`].
    pub async fn new() -> Self {
        Self::with_repository(|_| {}).await
    }

    /// Create a test server with custom repository settings.
    pub async fn with_repository<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut RepositoryConfig),
    {
        Self::with_config(|config| {
            if let Some(repo) = config.repositories.first_mut() {
                modifier(repo);
            }
        })
        .await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let storage_dir = temp_dir.path().join("storage");

        let mut config = AppConfig::default();
        config.storages.insert(
            "local".to_string(),
            StorageConfig::Filesystem(FilesystemConfig {
                dir: storage_dir.clone(),
            }),
        );
        config.repositories = vec![RepositoryConfig::new(PREFIX, "local")];

        modifier(&mut config);

        mountain_server::metrics::register_metrics();
        let state = build_state(config, &CancellationToken::new()).await;
        let router = create_router(state.clone());

        Self {
            router,
            state,
            storage_dir,
            _temp_dir: temp_dir,
        }
    }

    /// Send a request through the router.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// GET a path, returning status, content type and body.
    pub async fn get(&self, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.send(request).await;

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, body.to_vec())
    }

    /// PUT a body with a matching Content-Length.
    pub async fn put(&self, uri: &str, body: &[u8]) -> StatusCode {
        let request = Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-length", body.len())
            .body(Body::from(body.to_vec()))
            .unwrap();
        self.send(request).await.status()
    }

    /// DELETE without a body.
    pub async fn delete(&self, uri: &str) -> StatusCode {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await.status()
    }

    /// Write an artifact straight into the storage directory.
    pub fn seed(&self, name: &str, data: &[u8]) {
        std::fs::write(self.storage_dir.join(name), data).expect("Failed to seed artifact");
    }
}
