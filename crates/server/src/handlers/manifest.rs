//! Generated repository manifests.

use crate::error::ApiResult;
use crate::metrics::{MANIFEST_BUILD_DURATION, MANIFEST_BUILDS};
use crate::state::RepositoryState;
use axum::extract::State;
use axum::http::Uri;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use mountain_core::manifest::{self, MANIFEST_NAMES, ManifestFormat};
use mountain_core::Catalog;
use std::time::Instant;

/// Suffixes selecting the manifest encoding.
const MANIFEST_SUFFIXES: [&str; 3] = ["", ".json", ".zip"];

/// Every manifest path a repository serves, relative to its prefix.
pub fn manifest_paths() -> Vec<String> {
    MANIFEST_NAMES
        .iter()
        .flat_map(|name| MANIFEST_SUFFIXES.iter().map(move |ext| format!("/{name}{ext}")))
        .collect()
}

fn format_label(format: ManifestFormat) -> &'static str {
    match format {
        ManifestFormat::Lua => "lua",
        ManifestFormat::Json => "json",
        ManifestFormat::Zip => "zip",
    }
}

/// GET /{prefix}/manifest[-5.x][.json|.zip] - Render the manifest of the
/// repository's current listing.
///
/// Names that do not parse as artifacts are left out.
pub async fn get_manifest(State(repo): State<RepositoryState>, uri: Uri) -> ApiResult<Response> {
    let format = ManifestFormat::from_path(uri.path());
    let started = Instant::now();

    let names = repo.storage.list().await?;
    let catalog = Catalog::from_names(&names);
    let body = manifest::render(&catalog, format, uri.path())?;

    let label = format_label(format);
    MANIFEST_BUILDS.with_label_values(&[&repo.prefix, label]).inc();
    MANIFEST_BUILD_DURATION
        .with_label_values(&[label])
        .observe(started.elapsed().as_secs_f64());
    tracing::debug!(
        repository = %repo.prefix,
        format = label,
        artifacts = names.len(),
        packages = catalog.packages().len(),
        "Manifest rendered"
    );

    Ok(([(CONTENT_TYPE, format.content_type())], body).into_response())
}
