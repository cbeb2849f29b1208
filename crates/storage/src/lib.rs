//! Artifact storage abstraction and backends for mountain.
//!
//! This crate provides:
//! - The [`Storage`] trait every repository is served through
//! - A flat local filesystem backend
//! - A Nexus raw repository backend with a locally cached asset index

pub mod backends;
pub mod error;
pub mod nexus;
pub mod traits;

pub use backends::{
    filesystem::FilesystemBackend,
    nexus::{NexusBackend, RefreshStatus},
};
pub use error::{StorageError, StorageResult};
pub use traits::{ByteStream, Storage, bytes_stream, collect_bytes, validate_name};

use mountain_core::config::StorageConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Create a storage backend from configuration.
///
/// Background tasks of the backend stop when `shutdown` is cancelled.
pub async fn from_config(
    name: &str,
    config: &StorageConfig,
    shutdown: &CancellationToken,
) -> StorageResult<Arc<dyn Storage>> {
    config
        .validate()
        .map_err(|e| StorageError::Config(format!("storage '{name}': {e}")))?;

    match config {
        StorageConfig::Filesystem(fs) => {
            let backend = FilesystemBackend::new(&fs.dir).await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::Nexus(nexus) => {
            let backend = NexusBackend::new(nexus, shutdown).await?;
            Ok(Arc::new(backend))
        }
    }
}
