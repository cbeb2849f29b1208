//! Artifact filename parsing.
//!
//! Rocks carry no metadata of their own in storage, so the package name,
//! version and build architecture are reconstructed from the filename:
//!
//! - `lpeg-1.1.0-1.rockspec` -> (`lpeg`, `1.1.0-1`, `rockspec`)
//! - `lpeg-1.1.0-1.linux-x86_64.rock` -> (`lpeg`, `1.1.0-1`, `linux-x86_64`)
//! - `lpeg-scm-1.src.rock` -> (`lpeg`, `scm-1`, `src`)

use regex::Regex;
use std::sync::LazyLock;

/// Suffix of a package specification file.
pub const ROCKSPEC_SUFFIX: &str = ".rockspec";

/// Suffix of a packed (source or binary) rock.
pub const ROCK_SUFFIX: &str = ".rock";

/// Architecture tag reported for rockspec files.
pub const ROCKSPEC_ARCH: &str = "rockspec";

/// Marker for source-control versions (`scm-1`, `dev-scm-0`, ...).
const SCM_MARKER: &str = "scm";

static SEMVER_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)",
        r"(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?",
        r"(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    ))
    .expect("semver pattern is valid")
});

/// A filename decomposed into package, version and architecture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactName {
    pub package: String,
    pub version: String,
    pub arch: String,
}

/// Parse a stored filename.
///
/// Returns `None` for anything that is not a recognisable rockspec or rock;
/// callers skip such files rather than failing the whole listing.
pub fn parse_artifact_name(filename: &str) -> Option<ArtifactName> {
    let (stem, arch) = if let Some(stem) = filename.strip_suffix(ROCKSPEC_SUFFIX) {
        (stem, ROCKSPEC_ARCH)
    } else if let Some(rest) = filename.strip_suffix(ROCK_SUFFIX) {
        let dot = rest.rfind('.')?;
        (&rest[..dot], &rest[dot + 1..])
    } else {
        tracing::debug!(filename, "unable to define file arch");
        return None;
    };

    if arch.is_empty() {
        tracing::debug!(filename, "empty architecture tag");
        return None;
    }

    let Some((package, version)) = split_name_version(stem) else {
        tracing::debug!(filename, "unable to parse version");
        return None;
    };

    Some(ArtifactName {
        package: package.to_string(),
        version: version.to_string(),
        arch: arch.to_string(),
    })
}

/// Split `name-version` into its parts, trimming separators off the name.
fn split_name_version(stem: &str) -> Option<(&str, &str)> {
    let (name, version) = match stem.find(SCM_MARKER) {
        Some(index) if index > 0 => (&stem[..index], &stem[index..]),
        _ => {
            let found = SEMVER_SUFFIX.find(stem)?;
            (&stem[..found.start()], found.as_str())
        }
    };

    let name = name.trim_end_matches(['-', '.']);
    if name.is_empty() || version.is_empty() {
        return None;
    }

    Some((name, version))
}
