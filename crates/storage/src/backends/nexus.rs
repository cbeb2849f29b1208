//! Nexus raw repository storage backend.
//!
//! Reads are served from a local [`AssetIndex`] of the remote repository,
//! rebuilt on a timer by a background task. The remote catalog is eventually
//! consistent, so uploads are confirmed by searching for the new asset before
//! it is added to the index. A rebuild that races a just-confirmed upload may
//! drop it from the index until the next rebuild.

use crate::error::{StorageError, StorageResult};
use crate::nexus::models::RAW_FORMAT;
use crate::nexus::{Asset, AssetIndex, NexusClient};
use crate::traits::{ByteStream, Storage, validate_name};
use async_trait::async_trait;
use mountain_core::config::NexusConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Outcome of the most recent index rebuilds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStatus {
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_success: Option<OffsetDateTime>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    /// Index size after the last successful rebuild.
    pub assets: usize,
}

struct Shared {
    client: NexusClient,
    repository: String,
    index: AssetIndex,
    status: RwLock<RefreshStatus>,
    confirm_attempts: u32,
    confirm_delay: Duration,
}

impl Shared {
    /// Page through every asset and swap in the resulting index.
    async fn rebuild(&self) -> StorageResult<usize> {
        let mut assets = HashMap::with_capacity(self.index.len());
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .client
                .list_assets(&self.repository, token.as_deref())
                .await?;
            pages += 1;

            let next = page.next_token().map(str::to_string);
            for asset in page.items {
                assets.insert(asset.path.clone(), asset);
            }

            match next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        let count = assets.len();
        self.index.replace(assets);
        tracing::debug!(repository = %self.repository, pages, assets = count, "Asset index rebuilt");
        Ok(count)
    }

    fn record_success(&self, assets: usize) {
        let mut status = self.status.write().unwrap_or_else(|p| p.into_inner());
        status.last_success = Some(OffsetDateTime::now_utc());
        status.last_error = None;
        status.consecutive_failures = 0;
        status.assets = assets;
    }

    fn record_failure(&self, error: String) {
        let mut status = self.status.write().unwrap_or_else(|p| p.into_inner());
        status.last_error = Some(error);
        status.consecutive_failures = status.consecutive_failures.saturating_add(1);
    }

    fn status(&self) -> RefreshStatus {
        self.status
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

/// Nexus-backed artifact store.
pub struct NexusBackend {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    refresh_task: JoinHandle<()>,
}

impl NexusBackend {
    /// Connect to the repository and build the first index.
    ///
    /// Fails if the repository cannot be fetched, is not a raw repository, or
    /// the first rebuild fails. The refresh task stops when `shutdown` is
    /// cancelled or the backend is dropped.
    pub async fn new(config: &NexusConfig, shutdown: &CancellationToken) -> StorageResult<Self> {
        if config.repository.trim().is_empty() {
            return Err(StorageError::Config(
                "nexus repository name is required".to_string(),
            ));
        }

        let client = NexusClient::new(&config.address, config.request_timeout())?;

        let repository = client.get_repository(&config.repository).await?;
        if repository.format != RAW_FORMAT {
            return Err(StorageError::FormatMismatch {
                repository: config.repository.clone(),
                format: repository.format,
            });
        }

        let shared = Arc::new(Shared {
            client,
            repository: config.repository.clone(),
            index: AssetIndex::new(),
            status: RwLock::new(RefreshStatus::default()),
            confirm_attempts: config.confirm_attempts.max(1),
            confirm_delay: config.confirm_delay(),
        });

        tracing::info!(repository = %config.repository, "Building first asset index");
        let assets = shared.rebuild().await?;
        shared.record_success(assets);
        tracing::info!(
            repository = %config.repository,
            assets,
            "Nexus storage ready"
        );

        let cancel = shutdown.child_token();
        let refresh_task = spawn_refresh_task(
            shared.clone(),
            config.index_update_interval(),
            cancel.clone(),
        );

        Ok(Self {
            shared,
            cancel,
            refresh_task,
        })
    }

    pub fn repository(&self) -> &str {
        &self.shared.repository
    }

    pub fn index(&self) -> &AssetIndex {
        &self.shared.index
    }

    pub fn refresh_status(&self) -> RefreshStatus {
        self.shared.status()
    }

    /// Rebuild the index now, outside the timer.
    pub async fn refresh(&self) -> StorageResult<usize> {
        match self.shared.rebuild().await {
            Ok(assets) => {
                self.shared.record_success(assets);
                Ok(assets)
            }
            Err(e) => {
                self.shared.record_failure(e.to_string());
                Err(e)
            }
        }
    }

    /// Whether the refresh task has exited.
    pub fn is_refresh_stopped(&self) -> bool {
        self.refresh_task.is_finished()
    }

    /// Stop the refresh task.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Pause before confirmation `attempt`: none before the first search, then
/// growing linearly by `step`.
fn confirm_delay(step: Duration, attempt: u32) -> Duration {
    step.saturating_mul(attempt)
}

impl Drop for NexusBackend {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Rebuild the index every `interval` until `cancel` fires.
///
/// Each rebuild is bounded by `interval`. Failures are logged and recorded;
/// the previous index stays in place until a rebuild succeeds.
fn spawn_refresh_task(
    shared: Arc<Shared>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately and the index is already fresh.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = tokio::time::timeout(interval, shared.rebuild()) => outcome,
            };

            match outcome {
                Ok(Ok(assets)) => {
                    shared.record_success(assets);
                    tracing::info!(
                        repository = %shared.repository,
                        assets,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Asset index refreshed"
                    );
                }
                Ok(Err(e)) => {
                    tracing::error!(repository = %shared.repository, error = %e, "Asset index refresh failed");
                    shared.record_failure(e.to_string());
                }
                Err(_) => {
                    tracing::error!(
                        repository = %shared.repository,
                        timeout_secs = interval.as_secs(),
                        "Asset index refresh timed out"
                    );
                    shared.record_failure(format!("refresh timed out after {interval:?}"));
                }
            }
        }

        tracing::info!(repository = %shared.repository, "Asset index refresh stopped");
    })
}

#[async_trait]
impl Storage for NexusBackend {
    #[instrument(skip(self), fields(backend = "nexus"))]
    async fn get(&self, name: &str) -> StorageResult<ByteStream> {
        let asset = self
            .shared
            .index
            .get(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        self.shared.client.download(&asset.download_url).await
    }

    #[instrument(skip(self), fields(backend = "nexus"))]
    async fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.shared.index.contains(name))
    }

    #[instrument(skip(self, data), fields(backend = "nexus"))]
    async fn put(&self, name: &str, data: ByteStream) -> StorageResult<()> {
        validate_name(name)?;

        self.shared
            .client
            .save_asset(&self.shared.repository, name, data)
            .await?;

        for attempt in 0..self.shared.confirm_attempts {
            let delay = confirm_delay(self.shared.confirm_delay, attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let assets: Vec<Asset> = self
                .shared
                .client
                .search_assets(&self.shared.repository, name, None)
                .await?
                .into_assets()
                .collect();

            let found = match assets.iter().position(|a| a.path == name) {
                Some(pos) => assets.into_iter().nth(pos),
                None => assets.into_iter().next(),
            };

            match found {
                Some(asset) => {
                    tracing::debug!(attempt = attempt + 1, ?delay, "Uploaded asset found");
                    self.shared.index.store(name, asset);
                    return Ok(());
                }
                None => {
                    tracing::debug!(attempt = attempt + 1, ?delay, "Uploaded asset not found yet");
                }
            }
        }

        tracing::warn!(
            attempts = self.shared.confirm_attempts,
            "Uploaded asset never became searchable"
        );
        Err(StorageError::UploadNotConfirmed {
            name: name.to_string(),
            attempts: self.shared.confirm_attempts,
        })
    }

    #[instrument(skip(self), fields(backend = "nexus"))]
    async fn delete(&self, name: &str) -> StorageResult<()> {
        let Some(asset) = self.shared.index.get(name) else {
            return Ok(());
        };

        self.shared.client.delete_asset(&asset.id).await?;
        self.shared.index.remove(name);
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "nexus"))]
    async fn list(&self) -> StorageResult<Vec<String>> {
        Ok(self.shared.index.keys())
    }

    fn backend_name(&self) -> &'static str {
        "nexus"
    }

    async fn health_check(&self) -> StorageResult<()> {
        let status = self.shared.status();
        if status.consecutive_failures > 0 {
            return Err(StorageError::IndexStale(format!(
                "{} consecutive refresh failures, last: {}",
                status.consecutive_failures,
                status.last_error.unwrap_or_default()
            )));
        }
        Ok(())
    }
}
