//! In-process fake of the Nexus REST endpoints used by the storage backend.
#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use mountain_storage::nexus::{Asset, AssetPage, Component, Repository, SearchPage};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeState {
    pub base_url: String,
    pub format: String,
    /// Assets keyed by path, with their content.
    pub assets: BTreeMap<String, (Asset, Vec<u8>)>,
    pub page_size: usize,
    /// Searches that return nothing before uploads become visible.
    pub search_misses: usize,
    /// Uploads are accepted but never become searchable.
    pub hide_uploads: bool,
    pub fail_listing: bool,
    pub fail_deletes: bool,
    pub next_id: u64,
    pub list_calls: usize,
    pub search_calls: usize,
    pub delete_calls: usize,
    pub upload_calls: usize,
}

#[derive(Clone)]
pub struct FakeNexus {
    pub url: String,
    pub state: Arc<Mutex<FakeState>>,
}

#[allow(dead_code)]
impl FakeNexus {
    /// Start a fake serving a raw repository named `rocks`.
    pub async fn start() -> Self {
        Self::start_with_format("raw").await
    }

    pub async fn start_with_format(format: &str) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let state = Arc::new(Mutex::new(FakeState {
            base_url: url.clone(),
            format: format.to_string(),
            page_size: 100,
            ..Default::default()
        }));

        let app = Router::new()
            .route("/service/rest/v1/repositories/{name}", get(repository))
            .route("/service/rest/v1/assets", get(list_assets))
            .route("/service/rest/v1/assets/{id}", delete(delete_asset))
            .route("/service/rest/v1/search", get(search))
            .route(
                "/repository/{repo}/{path}",
                get(download_asset).put(upload_asset),
            )
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { url, state }
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Add an asset directly on the "server side".
    pub fn seed(&self, path: &str, content: &[u8]) {
        self.with_state(|s| insert_asset(s, "rocks", path, content.to_vec()));
    }

    pub fn contains(&self, path: &str) -> bool {
        self.with_state(|s| s.assets.contains_key(path))
    }
}

fn insert_asset(state: &mut FakeState, repo: &str, path: &str, content: Vec<u8>) {
    state.next_id += 1;
    let asset = Asset {
        download_url: format!("{}/repository/{repo}/{path}", state.base_url),
        path: path.to_string(),
        id: format!("asset-{}", state.next_id),
        repository: repo.to_string(),
        format: "raw".to_string(),
        file_size: content.len() as u64,
        ..Default::default()
    };
    state.assets.insert(path.to_string(), (asset, content));
}

async fn repository(
    State(state): State<Arc<Mutex<FakeState>>>,
    Path(name): Path<String>,
) -> Json<Repository> {
    let state = state.lock().unwrap();
    Json(Repository {
        url: format!("{}/repository/{name}", state.base_url),
        name,
        format: state.format.clone(),
        kind: "hosted".to_string(),
        attributes: serde_json::Value::Null,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    repository: String,
    continuation_token: Option<String>,
}

async fn list_assets(
    State(state): State<Arc<Mutex<FakeState>>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.list_calls += 1;
    if state.fail_listing {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let start: usize = query
        .continuation_token
        .as_deref()
        .map(|t| t.parse().unwrap())
        .unwrap_or(0);
    let items: Vec<Asset> = state
        .assets
        .values()
        .filter(|(a, _)| a.repository == query.repository)
        .skip(start)
        .take(state.page_size)
        .map(|(a, _)| a.clone())
        .collect();

    let end = start + items.len();
    let continuation_token = (end < state.assets.len()).then(|| end.to_string());

    Json(AssetPage {
        items,
        continuation_token,
    })
    .into_response()
}

#[derive(Deserialize)]
struct SearchQuery {
    repository: String,
    name: String,
}

async fn search(
    State(state): State<Arc<Mutex<FakeState>>>,
    Query(query): Query<SearchQuery>,
) -> Json<SearchPage> {
    let mut state = state.lock().unwrap();
    state.search_calls += 1;

    if state.hide_uploads || state.search_misses > 0 {
        state.search_misses = state.search_misses.saturating_sub(1);
        return Json(SearchPage::default());
    }

    let items = state
        .assets
        .get(&query.name)
        .filter(|(a, _)| a.repository == query.repository)
        .map(|(a, _)| Component {
            name: a.path.clone(),
            repository: a.repository.clone(),
            format: "raw".to_string(),
            assets: vec![a.clone()],
            ..Default::default()
        })
        .into_iter()
        .collect();

    Json(SearchPage {
        items,
        continuation_token: None,
    })
}

async fn upload_asset(
    State(state): State<Arc<Mutex<FakeState>>>,
    Path((repo, path)): Path<(String, String)>,
    body: Bytes,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    state.upload_calls += 1;
    insert_asset(&mut state, &repo, &path, body.to_vec());
    StatusCode::CREATED
}

async fn download_asset(
    State(state): State<Arc<Mutex<FakeState>>>,
    Path((_repo, path)): Path<(String, String)>,
) -> Response {
    let state = state.lock().unwrap();
    match state.assets.get(&path) {
        Some((_, content)) => content.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_asset(
    State(state): State<Arc<Mutex<FakeState>>>,
    Path(id): Path<String>,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    state.delete_calls += 1;
    if state.fail_deletes {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    let path = state
        .assets
        .iter()
        .find(|(_, (a, _))| a.id == id)
        .map(|(p, _)| p.clone());
    match path {
        Some(path) => {
            state.assets.remove(&path);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}
