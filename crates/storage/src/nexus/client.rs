//! Minimal Nexus REST client.
//!
//! Covers the handful of calls the backend needs. Metadata calls carry the
//! configured request timeout; artifact transfers are bounded by the connect
//! timeout only since bodies may be large.

use super::models::{AssetPage, Repository, SearchPage};
use crate::error::{StorageError, StorageResult};
use crate::traits::ByteStream;
use futures::TryStreamExt;
use reqwest::{Method, Request, Response};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use url::Url;

/// Path of the REST API below the server address.
pub const REST_API_PREFIX: [&str; 3] = ["service", "rest", "v1"];

/// Default timeout for metadata calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct NexusClient {
    http: reqwest::Client,
    base: Url,
    request_timeout: Duration,
}

impl NexusClient {
    pub fn new(address: &str, request_timeout: Duration) -> StorageResult<Self> {
        let base = Url::parse(address)?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(StorageError::Config(format!(
                "nexus address must be an http(s) URL: {address}"
            )));
        }

        let request_timeout = if request_timeout.is_zero() {
            DEFAULT_REQUEST_TIMEOUT
        } else {
            request_timeout
        };

        let http = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .user_agent(concat!("mountain/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// `base` extended with `segments`, each percent-encoded as one segment.
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn api_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        self.url(REST_API_PREFIX.into_iter().chain(segments))
    }

    /// Send a request, logging its outcome and mapping non-2xx to an error.
    async fn execute(&self, request: Request) -> StorageResult<Response> {
        let method = request.method().clone();
        let url = request.url().clone();
        let started = Instant::now();

        match self.http.execute(request).await {
            Ok(response) => {
                let status = response.status();
                tracing::debug!(
                    %method,
                    %url,
                    status = status.as_u16(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Nexus request finished"
                );
                if status.is_success() {
                    Ok(response)
                } else {
                    Err(StorageError::UnexpectedStatus {
                        method: method.to_string(),
                        url: url.to_string(),
                        status: status.as_u16(),
                    })
                }
            }
            Err(e) => {
                tracing::debug!(
                    %method,
                    %url,
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Nexus request failed"
                );
                Err(StorageError::Http(e))
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> StorageResult<T> {
        let request = self
            .http
            .request(Method::GET, url)
            .timeout(self.request_timeout)
            .build()?;
        let response = self.execute(request).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Repository metadata.
    pub async fn get_repository(&self, name: &str) -> StorageResult<Repository> {
        self.get_json(self.api_url(["repositories", name])).await
    }

    /// One page of the repository's assets.
    pub async fn list_assets(
        &self,
        repository: &str,
        continuation_token: Option<&str>,
    ) -> StorageResult<AssetPage> {
        let mut url = self.api_url(["assets"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("repository", repository);
            if let Some(token) = continuation_token.filter(|t| !t.is_empty()) {
                query.append_pair("continuationToken", token);
            }
        }
        self.get_json(url).await
    }

    /// Search components by name within a repository.
    pub async fn search_assets(
        &self,
        repository: &str,
        name: &str,
        continuation_token: Option<&str>,
    ) -> StorageResult<SearchPage> {
        let mut url = self.api_url(["search"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("repository", repository);
            query.append_pair("name", name);
            if let Some(token) = continuation_token.filter(|t| !t.is_empty()) {
                query.append_pair("continuationToken", token);
            }
        }
        self.get_json(url).await
    }

    /// Upload content to `repository/{repository}/{path}`.
    pub async fn save_asset(
        &self,
        repository: &str,
        path: &str,
        data: ByteStream,
    ) -> StorageResult<()> {
        let url = self.url(["repository", repository, path]);
        let request = self
            .http
            .request(Method::PUT, url)
            .body(reqwest::Body::wrap_stream(data))
            .build()?;
        self.execute(request).await?;
        Ok(())
    }

    /// Delete an asset by id.
    pub async fn delete_asset(&self, id: &str) -> StorageResult<()> {
        let request = self
            .http
            .request(Method::DELETE, self.api_url(["assets", id]))
            .timeout(self.request_timeout)
            .build()?;
        self.execute(request).await?;
        Ok(())
    }

    /// Stream the body of an asset download URL.
    pub async fn download(&self, download_url: &str) -> StorageResult<ByteStream> {
        let url = Url::parse(download_url)?;
        let request = self.http.request(Method::GET, url).build()?;
        let response = self.execute(request).await?;
        Ok(Box::pin(response.bytes_stream().map_err(StorageError::from)))
    }
}
