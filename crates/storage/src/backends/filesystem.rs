//! Local filesystem storage backend.
//!
//! Artifacts live as plain files directly under the root directory. Writes go
//! to a hidden temp file in the same directory which is fsynced and renamed
//! over the target, so readers never observe a partial artifact. There is no
//! in-process locking: two concurrent writers of one name race and the last
//! rename wins.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, Storage, validate_name};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::instrument;
use uuid::Uuid;

/// Chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Suffix of in-flight upload files.
const TEMP_SUFFIX: &str = ".upload";

/// Local filesystem artifact store.
#[derive(Debug)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend, creating the root if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        if root.as_os_str().is_empty() {
            return Err(StorageError::Config(
                "filesystem storage root cannot be empty".to_string(),
            ));
        }

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::Config(format!(
                "unable to create storage root {}: {e}",
                root.display()
            ))
        })?;

        tracing::info!(root = %root.display(), "Filesystem storage ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn name_path(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.root
            .join(format!(".{name}.{}{TEMP_SUFFIX}", Uuid::new_v4()))
    }

    async fn write_temp(&self, temp_path: &Path, mut data: ByteStream) -> StorageResult<u64> {
        let mut file = fs::File::create(temp_path).await?;
        let mut written = 0u64;
        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;
        Ok(written)
    }
}

fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

fn not_found_or_io(name: &str, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(name.to_string())
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl Storage for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, name: &str) -> StorageResult<ByteStream> {
        let path = self.name_path(name)?;

        let meta = fs::symlink_metadata(&path)
            .await
            .map_err(|e| not_found_or_io(name, e))?;
        if !meta.file_type().is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        let file = fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_io(name, e))?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, name: &str) -> StorageResult<bool> {
        let path = self.name_path(name)?;
        match fs::symlink_metadata(&path).await {
            Ok(meta) => Ok(meta.file_type().is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self, data), fields(backend = "filesystem"))]
    async fn put(&self, name: &str, data: ByteStream) -> StorageResult<()> {
        let path = self.name_path(name)?;
        let temp_path = self.temp_path(name);

        match self.write_temp(&temp_path, data).await {
            Ok(size) => {
                if let Err(e) = fs::rename(&temp_path, &path).await {
                    let _ = fs::remove_file(&temp_path).await;
                    return Err(StorageError::Io(e));
                }
                tracing::debug!(size, "Artifact stored");
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(e)
            }
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, name: &str) -> StorageResult<()> {
        let path = self.name_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            // file_type() does not follow symlinks, so links are skipped here.
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if !is_temp_name(&name) => names.push(name),
                Ok(_) => {}
                Err(raw) => {
                    tracing::debug!(name = ?raw, "Skipping non UTF-8 file name");
                }
            }
        }

        Ok(names)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {}", self.root.display()),
            )));
        }

        fs::read_dir(&self.root).await?;
        Ok(())
    }
}
