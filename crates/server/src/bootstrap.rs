//! Storage and repository initialization.

use crate::state::{AppState, RepositoryState, StorageMap};
use mountain_core::config::AppConfig;
use tokio_util::sync::CancellationToken;

/// Construct every configured storage.
///
/// A storage that fails to initialize is logged and left out; repositories
/// referencing it are skipped by [`build_repositories`].
pub async fn build_storages(config: &AppConfig, shutdown: &CancellationToken) -> StorageMap {
    let mut storages = StorageMap::new();

    for (name, storage_config) in &config.storages {
        match mountain_storage::from_config(name, storage_config, shutdown).await {
            Ok(storage) => {
                tracing::info!(
                    storage = %name,
                    backend = storage.backend_name(),
                    "Storage initialized"
                );
                storages.insert(name.clone(), storage);
            }
            Err(e) => {
                tracing::error!(
                    storage = %name,
                    backend = storage_config.kind(),
                    error = %e,
                    "Failed to initialize storage, skipping"
                );
            }
        }
    }

    storages
}

/// Bind repositories to their storages, skipping those whose storage is unavailable.
pub fn build_repositories(config: &AppConfig, storages: &StorageMap) -> Vec<RepositoryState> {
    let mut repositories = Vec::with_capacity(config.repositories.len());

    for repo in &config.repositories {
        let Some(storage) = storages.get(&repo.storage) else {
            tracing::warn!(
                prefix = %repo.normalized_prefix(),
                storage = %repo.storage,
                "Repository references an unavailable storage, skipping"
            );
            continue;
        };

        tracing::info!(
            prefix = %repo.normalized_prefix(),
            storage = %repo.storage,
            allow_rewrite = repo.allow_rewrite,
            "Repository mounted"
        );
        repositories.push(RepositoryState::new(repo.clone(), storage.clone()));
    }

    repositories
}

/// Build the full application state from configuration.
pub async fn build_state(config: AppConfig, shutdown: &CancellationToken) -> AppState {
    let storages = build_storages(&config, shutdown).await;
    let repositories = build_repositories(&config, &storages);
    AppState::new(config, storages, repositories)
}
