//! Configuration types shared across crates.
//!
//! A configuration is assembled by [`AppConfig::load`] from an optional file
//! (TOML or YAML, picked by extension) overlaid with `MOUNTAIN_`-prefixed
//! environment variables, `__` separating nested keys
//! (`MOUNTAIN_LISTEN__PORT=8080`).

use crate::error::{Error, Result};
use figment::Figment;
use figment::providers::{Env, Format, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "MOUNTAIN_";

/// File names probed in each search directory, in order.
pub const CONFIG_FILE_NAMES: [&str; 3] = ["config.toml", "config.yaml", "config.yml"];

/// System-wide configuration directory.
pub const SYSTEM_CONFIG_DIR: &str = "/etc/mountain";

/// Default maximum artifact size: 2 GiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 << 30;

/// Listener configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListenConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Serve Prometheus metrics on `/metrics` (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    2023
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ListenConfig {
    /// `address:port`, bracketing IPv6 literals.
    pub fn bind_addr(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

/// Log output encoding.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file path. Stdout when absent.
    #[serde(default)]
    pub target: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
            target: None,
        }
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Flat directory on local disk.
    #[serde(alias = "fs")]
    Filesystem(FilesystemConfig),
    /// Raw repository on a Nexus server.
    #[serde(alias = "remote")]
    Nexus(NexusConfig),
}

/// Local filesystem storage.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilesystemConfig {
    /// Root directory holding the artifacts.
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("/var/mountain")
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

/// Nexus raw repository storage.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NexusConfig {
    /// Base URL of the Nexus server. Checked by [`StorageConfig::validate`].
    #[serde(default)]
    pub address: String,
    /// Name of the raw repository.
    #[serde(default)]
    pub repository: String,
    /// Timeout for metadata calls in seconds.
    #[serde(default = "default_request_timeout_secs", alias = "request_timeout")]
    pub request_timeout_secs: u64,
    /// Seconds between asset index rebuilds.
    #[serde(
        default = "default_index_update_interval_secs",
        alias = "index_update_interval"
    )]
    pub index_update_interval_secs: u64,
    /// Searches issued after an upload before giving up on it.
    #[serde(default = "default_confirm_attempts")]
    pub confirm_attempts: u32,
    /// Delay step between confirmation searches, multiplied by the attempt.
    #[serde(default = "default_confirm_delay_ms")]
    pub confirm_delay_ms: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_index_update_interval_secs() -> u64 {
    60
}

fn default_confirm_attempts() -> u32 {
    5
}

fn default_confirm_delay_ms() -> u64 {
    100
}

impl NexusConfig {
    /// Configuration for `address`/`repository` with every default applied.
    pub fn new(address: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            repository: repository.into(),
            request_timeout_secs: default_request_timeout_secs(),
            index_update_interval_secs: default_index_update_interval_secs(),
            confirm_attempts: default_confirm_attempts(),
            confirm_delay_ms: default_confirm_delay_ms(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn index_update_interval(&self) -> Duration {
        Duration::from_secs(self.index_update_interval_secs)
    }

    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }
}

impl StorageConfig {
    /// Short backend label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StorageConfig::Filesystem(_) => "filesystem",
            StorageConfig::Nexus(_) => "nexus",
        }
    }

    /// Validate storage configuration invariants.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            StorageConfig::Filesystem(fs) => {
                if fs.dir.as_os_str().is_empty() {
                    return Err("filesystem storage requires a non-empty 'dir'".to_string());
                }
                Ok(())
            }
            StorageConfig::Nexus(nexus) => {
                let address = nexus.address.trim();
                if address.is_empty() {
                    return Err("nexus storage requires 'address'".to_string());
                }
                if !(address.starts_with("http://") || address.starts_with("https://")) {
                    return Err(format!(
                        "nexus address '{address}' must start with http:// or https://"
                    ));
                }
                if nexus.repository.trim().is_empty() {
                    return Err("nexus storage requires 'repository'".to_string());
                }
                if nexus.request_timeout_secs == 0 {
                    return Err("nexus request_timeout_secs cannot be 0".to_string());
                }
                // tokio::time::interval panics on a zero period.
                if nexus.index_update_interval_secs == 0 {
                    return Err("nexus index_update_interval_secs cannot be 0".to_string());
                }
                if nexus.confirm_attempts == 0 {
                    return Err("nexus confirm_attempts must be at least 1".to_string());
                }
                Ok(())
            }
        }
    }
}

/// One HTTP-exposed repository bound to a named storage.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// URL prefix the repository is mounted at (e.g. `/rocks`).
    #[serde(default)]
    pub prefix: String,
    /// Key into [`AppConfig::storages`].
    pub storage: String,
    #[serde(default = "default_allowed_file_extensions")]
    pub allowed_file_extensions: Vec<String>,
    #[serde(default)]
    pub allow_rewrite: bool,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_allowed_file_extensions() -> Vec<String> {
    vec![
        ".rockspec".to_string(),
        ".src.rock".to_string(),
        ".all.rock".to_string(),
    ]
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

impl RepositoryConfig {
    /// Repository on `prefix` backed by `storage`, defaults elsewhere.
    pub fn new(prefix: impl Into<String>, storage: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            storage: storage.into(),
            allowed_file_extensions: default_allowed_file_extensions(),
            allow_rewrite: false,
            max_file_size: default_max_file_size(),
        }
    }

    /// Prefix with a single leading slash and no trailing slash; `/` for root.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}")
        }
    }

    /// Whether `filename` ends with one of the allowed extensions.
    pub fn allows(&self, filename: &str) -> bool {
        self.allowed_file_extensions
            .iter()
            .any(|ext| filename.ends_with(ext.as_str()))
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub logs: LogConfig,
    /// Named storage backends.
    #[serde(default)]
    pub storages: BTreeMap<String, StorageConfig>,
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

impl AppConfig {
    /// Load from an optional file merged with `MOUNTAIN_` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = path {
            if !path.is_file() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate cross-field invariants.
    ///
    /// Returns warnings for settings that are served around (an invalid
    /// storage and the repositories referencing it are skipped) and an error
    /// for settings that cannot be served at all.
    pub fn validate(&self) -> std::result::Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        // An invalid storage only disables itself and the repositories using it.
        for (name, storage) in &self.storages {
            if let Err(e) = storage.validate() {
                warnings.push(format!("storages.{name}: {e}; storage will be skipped"));
            }
        }

        let mut prefixes = HashSet::new();
        for repo in &self.repositories {
            let prefix = repo.normalized_prefix();
            if !prefixes.insert(prefix.clone()) {
                return Err(format!("duplicate repository prefix '{prefix}'"));
            }
            if repo.max_file_size == 0 {
                return Err(format!(
                    "repository '{prefix}': max_file_size cannot be 0"
                ));
            }
            if !self.storages.contains_key(&repo.storage) {
                warnings.push(format!(
                    "repository '{prefix}' references unknown storage '{}' and will be skipped",
                    repo.storage
                ));
            }
            if repo.allowed_file_extensions.is_empty() {
                warnings.push(format!(
                    "repository '{prefix}' allows no file extensions; every artifact request will be rejected"
                ));
            }
        }

        if self.repositories.is_empty() {
            warnings.push("no repositories configured".to_string());
        }

        Ok(warnings)
    }
}

/// Default directories probed for a config file: cwd, `~/.mountain`, `/etc/mountain`.
pub fn default_search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::with_capacity(3);
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(home) = std::env::var_os("HOME").filter(|h| !h.is_empty()) {
        dirs.push(PathBuf::from(home).join(".mountain"));
    }
    dirs.push(PathBuf::from(SYSTEM_CONFIG_DIR));
    dirs
}

/// First existing config file in `dirs`.
pub fn search_config<P: AsRef<Path>>(dirs: &[P]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |f| dir.as_ref().join(f)))
        .find(|p| p.is_file())
}
