//! Storage trait definitions.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads and writes.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Flat artifact store.
///
/// Names are single path components (`foo-1.0.0-1.rockspec`). The listing is
/// the only input used to build manifests, so every backend must list exactly
/// the names that `get` can serve.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Stream an artifact. `NotFound` when absent.
    async fn get(&self, name: &str) -> StorageResult<ByteStream>;

    /// Check if an artifact exists.
    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Store an artifact, overwriting any previous content.
    ///
    /// Overwrite policy is the caller's concern.
    async fn put(&self, name: &str, data: ByteStream) -> StorageResult<()>;

    /// Remove an artifact. Removing a missing name succeeds.
    async fn delete(&self, name: &str) -> StorageResult<()>;

    /// Names of all stored artifacts.
    async fn list(&self) -> StorageResult<Vec<String>>;

    /// Static identifier for the backend type, used in logs and metrics.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is usable.
    ///
    /// The default implementation returns Ok(()).
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Reject names that are not a single, plain path component.
pub fn validate_name(name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidKey("empty name".to_string()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        return Err(StorageError::InvalidKey(format!(
            "name must be a single path component: {name}"
        )));
    }
    Ok(())
}

/// Wrap an in-memory buffer as a [`ByteStream`].
pub fn bytes_stream(data: impl Into<Bytes>) -> ByteStream {
    let data = data.into();
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// Drain a [`ByteStream`] into one buffer.
pub async fn collect_bytes(mut stream: ByteStream) -> StorageResult<Bytes> {
    use futures::StreamExt;

    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(Bytes::from(buf))
}
