//! Prometheus metrics for the mountain server.
//!
//! Exposes request counts and latency per route, manifest build cost,
//! and artifact transfer volume. The `/metrics` endpoint is unauthenticated
//! and can be turned off with `listen.metrics_enabled = false`.

use axum::extract::{MatchedPath, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};
use std::time::Instant;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static HTTP_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mountain_http_requests_total",
            "Total HTTP requests by method, route and status",
        ),
        &["method", "route", "status"],
    )
    .expect("metric creation failed")
});

pub static HTTP_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mountain_http_request_duration_seconds",
            "HTTP request latency by method and route",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "route"],
    )
    .expect("metric creation failed")
});

pub static MANIFEST_BUILDS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mountain_manifest_builds_total",
            "Total manifests rendered by repository and format",
        ),
        &["repository", "format"],
    )
    .expect("metric creation failed")
});

pub static MANIFEST_BUILD_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mountain_manifest_build_duration_seconds",
            "Time to list storage and render a manifest",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["format"],
    )
    .expect("metric creation failed")
});

pub static BYTES_UPLOADED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mountain_bytes_uploaded_total",
            "Total artifact bytes accepted by repository",
        ),
        &["repository"],
    )
    .expect("metric creation failed")
});

pub static ARTIFACT_OPERATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mountain_artifact_operations_total",
            "Artifact operations by repository, operation and outcome",
        ),
        &["repository", "operation", "outcome"],
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests building several routers can call it freely.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(HTTP_REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(HTTP_REQUEST_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MANIFEST_BUILDS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MANIFEST_BUILD_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ARTIFACT_OPERATIONS.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record request count and latency, labelled by the matched route template.
pub async fn track_requests(req: Request, next: Next) -> Response {
    let method = req.method().as_str().to_string();
    // Unmatched paths share one label to keep cardinality bounded.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(req).await;

    HTTP_REQUESTS
        .with_label_values(&[&method, &route, response.status().as_str()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &route])
        .observe(started.elapsed().as_secs_f64());
    response
}

/// Helper to record the outcome of an artifact operation.
pub fn record_artifact_operation(repository: &str, operation: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    ARTIFACT_OPERATIONS
        .with_label_values(&[repository, operation, outcome])
        .inc();
}
