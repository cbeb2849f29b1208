//! Route configuration.

use crate::handlers;
use crate::metrics::{metrics_handler, track_requests};
use crate::request_id::{RequestId, request_id_middleware};
use crate::state::{AppState, RepositoryState};
use axum::Router;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::middleware;
use axum::routing::get;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

/// Routes of a single repository, relative to its prefix.
fn repository_router(repo: RepositoryState) -> Router {
    let mut manifests = Router::new();
    for path in handlers::manifest_paths() {
        manifests = manifests.route(&path, get(handlers::get_manifest));
    }

    let artifacts = Router::new()
        .route(
            "/{filename}",
            get(handlers::get_artifact)
                .put(handlers::put_artifact)
                .delete(handlers::delete_artifact),
        )
        .route_layer(middleware::from_fn_with_state(
            repo.clone(),
            handlers::allowed_extension_guard,
        ));

    manifests
        .merge(artifacts)
        // Uploads are bounded per repository by `max_file_size`.
        .layer(DefaultBodyLimit::disable())
        .with_state(repo)
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new().route("/health", get(handlers::health_check));

    if state.config.listen.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    let mut router = router.with_state(state.clone());

    for repo in state.repositories.iter() {
        let prefix = repo.prefix.clone();
        let repo_router = repository_router(repo.clone());
        router = if prefix == "/" {
            router.merge(repo_router)
        } else {
            router.nest(&prefix, repo_router)
        };
    }

    // Layers run outermost last-added: request id -> panic guard -> trace -> metrics -> handler.
    router
        .layer(middleware::from_fn(track_requests))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                let request_id = req
                    .extensions()
                    .get::<RequestId>()
                    .map(|id| id.0.clone())
                    .unwrap_or_default();
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn(request_id_middleware))
}
