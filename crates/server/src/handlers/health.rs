//! Server health endpoint.

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;

/// Health of one storage backend.
#[derive(Debug, Serialize)]
pub struct StorageHealth {
    pub backend: &'static str,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storages: BTreeMap<String, StorageHealth>,
}

/// GET /health - Health check.
///
/// Unauthenticated, for load balancers and orchestrator probes. Responds 503
/// when any storage reports unhealthy (for example a remote index whose
/// last refresh failed).
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut storages = BTreeMap::new();
    let mut healthy = true;

    for (name, storage) in state.storages.iter() {
        let result = storage.health_check().await;
        if let Err(e) = &result {
            tracing::warn!(storage = %name, error = %e, "Storage health check failed");
            healthy = false;
        }
        storages.insert(
            name.clone(),
            StorageHealth {
                backend: storage.backend_name(),
                healthy: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            },
        );
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            storages,
        }),
    )
}
