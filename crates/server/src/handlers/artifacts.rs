//! Artifact download, upload and removal.

use crate::error::{ApiError, ApiResult};
use crate::metrics::{BYTES_UPLOADED, record_artifact_operation};
use crate::state::RepositoryState;
use axum::body::{Body, Bytes, HttpBody};
use axum::extract::{Path, Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use mountain_storage::{ByteStream, StorageError, StorageResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Content type of served artifacts.
pub const ARTIFACT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Reject artifact requests whose name does not end with an allowed extension.
///
/// Checks the percent-decoded `{filename}` segment, the same name the
/// handlers hand to storage.
pub async fn allowed_extension_guard(
    State(repo): State<RepositoryState>,
    Path(filename): Path<String>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !repo.config.allows(&filename) {
        return Err(ApiError::BadRequest(format!(
            "filename {filename} has a disallowed extension, allowed are: {}",
            repo.config.allowed_file_extensions.join(", ")
        )));
    }

    Ok(next.run(req).await)
}

/// GET /{prefix}/{filename} - Stream an artifact.
pub async fn get_artifact(
    State(repo): State<RepositoryState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let result = repo.storage.get(&filename).await;
    record_artifact_operation(&repo.prefix, "get", result.is_ok());
    let stream = result?;

    Ok(([(CONTENT_TYPE, ARTIFACT_CONTENT_TYPE)], Body::from_stream(stream)).into_response())
}

/// PUT /{prefix}/{filename} - Store an artifact.
///
/// Requires a non-zero `Content-Length` no larger than the repository's
/// `max_file_size`. Existing artifacts are only replaced when the repository
/// allows rewrites.
pub async fn put_artifact(
    State(repo): State<RepositoryState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<StatusCode> {
    let limit = repo.config.max_file_size;
    let declared = declared_length(&headers)?.ok_or(ApiError::LengthRequired)?;
    if declared == 0 {
        return Err(ApiError::BadRequest("empty body not allowed".to_string()));
    }
    if declared > limit {
        return Err(ApiError::PayloadTooLarge { limit });
    }

    if !repo.config.allow_rewrite && repo.storage.exists(&filename).await? {
        return Err(ApiError::Conflict(format!("{filename} already exists")));
    }

    let received = Arc::new(AtomicU64::new(0));
    let data = limited_stream(body, limit, received.clone());

    let result = repo.storage.put(&filename, data).await;
    record_artifact_operation(&repo.prefix, "put", result.is_ok());

    let size = received.load(Ordering::Relaxed);
    match result {
        Ok(()) => {
            BYTES_UPLOADED.with_label_values(&[&repo.prefix]).inc_by(size);
            tracing::info!(
                repository = %repo.prefix,
                filename = %filename,
                size,
                "Artifact stored"
            );
            Ok(StatusCode::NO_CONTENT)
        }
        Err(_) if size > limit => Err(ApiError::PayloadTooLarge { limit }),
        Err(e) => Err(e.into()),
    }
}

/// DELETE /{prefix}/{filename} - Remove an artifact.
///
/// Succeeds when the artifact is already absent.
pub async fn delete_artifact(
    State(repo): State<RepositoryState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<StatusCode> {
    let declared = declared_length(&headers)?;
    if declared.is_some_and(|n| n > 0) || body.size_hint().exact() != Some(0) {
        return Err(ApiError::BadRequest("request body not allowed".to_string()));
    }

    let result = repo.storage.delete(&filename).await;
    record_artifact_operation(&repo.prefix, "delete", result.is_ok());
    result?;

    tracing::info!(repository = %repo.prefix, filename = %filename, "Artifact deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Parsed `Content-Length`, if the header is present.
fn declared_length(headers: &HeaderMap) -> ApiResult<Option<u64>> {
    let Some(value) = headers.get(CONTENT_LENGTH) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest("invalid content-length header".to_string()))
}

/// Adapt a request body into a [`ByteStream`] that fails once more than
/// `limit` bytes have been read. `received` tracks the running total.
fn limited_stream(body: Body, limit: u64, received: Arc<AtomicU64>) -> ByteStream {
    Box::pin(body.into_data_stream().map(move |chunk| -> StorageResult<Bytes> {
        let chunk = chunk.map_err(|e| StorageError::Io(std::io::Error::other(e)))?;
        let total = received.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
        if total > limit {
            return Err(StorageError::Io(std::io::Error::other(format!(
                "body exceeds {limit} bytes"
            ))));
        }
        Ok(chunk)
    }))
}
