//! Byte transfer into the local media tree

use crate::error::{LibraryError, Result};
use async_trait::async_trait;
use bridge_traits::error::BridgeError;
use bridge_traits::http::HttpClient;
use bytes::Bytes;
use core_runtime::config::ConflictBehavior;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

/// Places media payloads under a root directory.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Fetches `url` into `relative_path` under the store root and returns
    /// the stored location (relative, `/`-separated).
    ///
    /// Parent directories are created as needed. A server status of 400 or
    /// above fails with [`LibraryError::TransferStatus`].
    async fn transfer(&self, url: &str, relative_path: &str) -> Result<String>;

    /// Reads a stored payload back.
    async fn read(&self, location: &str) -> Result<Bytes>;
}

/// [`MediaStore`] on the local filesystem.
pub struct FileMediaStore {
    root: PathBuf,
    http_client: Arc<dyn HttpClient>,
    conflict_behavior: ConflictBehavior,
}

impl FileMediaStore {
    pub fn new(
        root: impl Into<PathBuf>,
        http_client: Arc<dyn HttpClient>,
        conflict_behavior: ConflictBehavior,
    ) -> Self {
        Self {
            root: root.into(),
            http_client,
            conflict_behavior,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute(&self, relative_path: &str) -> Result<PathBuf> {
        let relative = Path::new(relative_path);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir));
        if relative_path.is_empty() || escapes {
            return Err(LibraryError::InvalidInput {
                field: "relative_path".to_string(),
                message: format!("'{}' is not a path inside the store", relative_path),
            });
        }
        Ok(self.root.join(relative))
    }

    async fn download(&self, url: &str, target: &Path) -> Result<()> {
        let mut reader = self
            .http_client
            .download_stream(url.to_string())
            .await
            .map_err(|e| match e {
                BridgeError::HttpStatus { status, url } => {
                    LibraryError::TransferStatus { status, url }
                }
                other => LibraryError::Bridge(other),
            })?;

        let partial = partial_path(target);
        let result = async {
            let mut file = tokio::fs::File::create(&partial).await?;
            let written = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&partial, target).await?;
            Ok::<u64, std::io::Error>(written)
        }
        .await;

        match result {
            Ok(written) => {
                debug!(bytes = written, "Transfer complete");
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl MediaStore for FileMediaStore {
    #[instrument(skip(self), fields(conflict = ?self.conflict_behavior))]
    async fn transfer(&self, url: &str, relative_path: &str) -> Result<String> {
        if url.is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "url".to_string(),
                message: format!("no download URL for {}", relative_path),
            });
        }

        let target = self.absolute(relative_path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if tokio::fs::try_exists(&target).await? {
            match self.conflict_behavior {
                ConflictBehavior::Replace => {
                    warn!(path = %target.display(), "File existed and was removed");
                    tokio::fs::remove_file(&target).await?;
                }
                ConflictBehavior::Keep => {
                    warn!(path = %target.display(), "File existed and was kept");
                    return Ok(relative_path.to_string());
                }
            }
        }

        self.download(url, &target).await?;
        Ok(relative_path.to_string())
    }

    async fn read(&self, location: &str) -> Result<Bytes> {
        let path = self.absolute(location)?;
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(LibraryError::NotFound {
                entity_type: "StoredMedia".to_string(),
                id: location.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}
