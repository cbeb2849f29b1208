//! Application state shared across handlers.

use mountain_core::config::{AppConfig, RepositoryConfig};
use mountain_storage::Storage;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named storage backends that were successfully constructed.
pub type StorageMap = BTreeMap<String, Arc<dyn Storage>>;

/// Server-wide state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Storages by configured name.
    pub storages: Arc<StorageMap>,
    /// Repositories that resolved to a live storage.
    pub repositories: Arc<Vec<RepositoryState>>,
}

impl AppState {
    pub fn new(config: AppConfig, storages: StorageMap, repositories: Vec<RepositoryState>) -> Self {
        Self {
            config: Arc::new(config),
            storages: Arc::new(storages),
            repositories: Arc::new(repositories),
        }
    }
}

/// State of a single mounted repository.
#[derive(Clone)]
pub struct RepositoryState {
    pub config: Arc<RepositoryConfig>,
    /// Normalized mount prefix (`/` or `/name`).
    pub prefix: String,
    pub storage: Arc<dyn Storage>,
}

impl RepositoryState {
    pub fn new(config: RepositoryConfig, storage: Arc<dyn Storage>) -> Self {
        let prefix = config.normalized_prefix();
        Self {
            config: Arc::new(config),
            prefix,
            storage,
        }
    }

    /// Name of the storage backing this repository.
    pub fn storage_name(&self) -> &str {
        &self.config.storage
    }
}
