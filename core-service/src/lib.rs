//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations into the mirror:
//! it opens the catalog and the media store under the configured store root,
//! builds the Flickr source and the Immich backend from [`MirrorConfig`], and
//! runs either the download pass or the upload pass. Desktop hosts enable the
//! `desktop-shims` feature, which provides a `reqwest` backed HTTP client and
//! the `photo-mirror` binary.

pub mod error;

pub use error::{CoreError, Result};

use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::http::HttpClient;
use core_auth::{AccessToken, ConsumerCredentials, RequestSigner};
use core_library::{FileMediaLibrary, FileMediaStore, MediaLibrary, MediaStore};
use core_runtime::config::{MirrorConfig, StorageService};
use core_sync::{ErrorLedger, PublishReport, Publisher, SyncEngine, SyncReport};
use provider_flickr::{FlickrConnector, FlickrPhoto, FlickrPhotoset, FlickrRequester};
use provider_immich::ImmichConnector;
use tracing::{info, instrument};

/// Name of the directory under the store root holding transferred files.
pub const MEDIA_DIR: &str = "media";

type Catalog = Arc<dyn MediaLibrary<FlickrPhoto, FlickrPhotoset>>;

/// Aggregated handle to the bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
}

impl CoreDependencies {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }
}

/// One pass of the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorCommand {
    /// Pull the remote library into the local store.
    Download,
    /// Republish downloaded media and albums to the storage backend.
    Upload,
}

/// Outcome of a [`MirrorCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorReport {
    Download(SyncReport),
    Upload(PublishReport),
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<MirrorConfig>,
    deps: Arc<CoreDependencies>,
}

impl CoreService {
    /// Create a new service from a validated configuration and the provided
    /// dependencies.
    pub fn new(config: MirrorConfig, deps: CoreDependencies) -> Self {
        Self {
            config: Arc::new(config),
            deps: Arc::new(deps),
        }
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Access the bridge dependencies being used by the service.
    pub fn dependencies(&self) -> Arc<CoreDependencies> {
        Arc::clone(&self.deps)
    }

    /// Directory holding transferred files.
    pub fn media_root(&self) -> PathBuf {
        self.config.store_path.join(MEDIA_DIR)
    }

    /// Runs one pass.
    pub async fn run(&self, command: MirrorCommand) -> Result<MirrorReport> {
        match command {
            MirrorCommand::Download => self.run_download().await.map(MirrorReport::Download),
            MirrorCommand::Upload => self.run_upload().await.map(MirrorReport::Upload),
        }
    }

    /// Mirrors the remote library into the store.
    ///
    /// When an access token is configured the credentials are checked first
    /// and a rejected login aborts the pass.
    #[instrument(skip(self))]
    pub async fn run_download(&self) -> Result<SyncReport> {
        let source = self.config.require_source()?;
        let connector = self.flickr_connector()?;

        if source.oauth_token.is_some() {
            let user = connector.check_login().await?;
            info!(user = %user, "Logged in to media source");
        }

        let engine = SyncEngine::new(self.open_catalog().await?, Arc::new(connector), self.store())
            .with_ledger(self.ledger());
        let report = engine.run().await?;
        Ok(report)
    }

    /// Republishes downloaded media and albums to the storage backend.
    #[instrument(skip(self))]
    pub async fn run_upload(&self) -> Result<PublishReport> {
        let target = match self.config.require_storage_service()? {
            StorageService::Immich { api_url, api_key } => ImmichConnector::new(
                Arc::clone(&self.deps.http_client),
                api_url.clone(),
                api_key.clone(),
            ),
        };

        let publisher = Publisher::new(self.open_catalog().await?, self.store(), Arc::new(target))
            .with_ledger(self.ledger());
        let report = publisher.run().await?;
        Ok(report)
    }

    fn flickr_connector(&self) -> Result<FlickrConnector> {
        let source = self.config.require_source()?;
        let token = match (&source.oauth_token, &source.oauth_token_secret) {
            (Some(token), Some(secret)) => Some(AccessToken::new(token.clone(), secret.clone())),
            _ => None,
        };
        let signer = RequestSigner::new(
            ConsumerCredentials::new(source.consumer_key.clone(), source.consumer_secret.clone()),
            token,
        );
        let requester = FlickrRequester::new(Arc::clone(&self.deps.http_client), signer);
        Ok(FlickrConnector::new(requester, source.user_id.clone()))
    }

    async fn open_catalog(&self) -> Result<Catalog> {
        let library = FileMediaLibrary::open(&self.config.store_path).await?;
        Ok(Arc::new(library))
    }

    fn store(&self) -> Arc<dyn MediaStore> {
        Arc::new(FileMediaStore::new(
            self.media_root(),
            Arc::clone(&self.deps.http_client),
            self.config.conflict_behavior,
        ))
    }

    fn ledger(&self) -> ErrorLedger {
        ErrorLedger::new(self.config.max_attempts)
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// use core_runtime::config::MirrorConfig;
/// use core_service::{bootstrap_desktop, MirrorCommand};
///
/// let core = bootstrap_desktop(MirrorConfig::from_env()?)?;
/// let report = core.run(MirrorCommand::Download).await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(config: MirrorConfig) -> Result<CoreService> {
    let http_client = bridge_desktop::ReqwestHttpClient::new()
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;
    Ok(CoreService::new(
        config,
        CoreDependencies::new(Arc::new(http_client)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::{HttpRequest, HttpResponse};
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Answers Flickr listings with empty pages and records every URL.
    #[derive(Default)]
    struct EmptyRemote {
        urls: Mutex<Vec<String>>,
    }

    impl EmptyRemote {
        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    fn json(body: serde_json::Value) -> HttpResponse {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        HttpResponse {
            status: 200,
            headers,
            body: Bytes::from(body.to_string()),
        }
    }

    #[async_trait]
    impl HttpClient for EmptyRemote {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.urls.lock().unwrap().push(request.url.clone());
            let url = request.url;
            if url.contains("method=flickr.test.login") {
                Ok(json(serde_json::json!({"user": {"id": "1@N0"}, "stat": "ok"})))
            } else if url.contains("method=flickr.people.getPhotos") {
                Ok(json(serde_json::json!({
                    "photos": {"page": 1, "pages": 1, "photo": []},
                    "stat": "ok"
                })))
            } else if url.contains("method=flickr.photosets.getList") {
                Ok(json(serde_json::json!({
                    "photosets": {"page": 1, "pages": 1, "photoset": []},
                    "stat": "ok"
                })))
            } else {
                Err(BridgeError::OperationFailed(format!("unexpected {}", url)))
            }
        }

        async fn download_stream(
            &self,
            url: String,
        ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
            Err(BridgeError::OperationFailed(format!("unexpected {}", url)))
        }
    }

    fn service(config: MirrorConfig, remote: Arc<EmptyRemote>) -> CoreService {
        CoreService::new(config, CoreDependencies::new(remote))
    }

    #[tokio::test]
    async fn test_download_requires_source_credentials() {
        let dir = TempDir::new().unwrap();
        let config = MirrorConfig::builder()
            .store_path(dir.path())
            .build()
            .unwrap();

        let result = service(config, Arc::default())
            .run(MirrorCommand::Download)
            .await;

        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_upload_requires_storage_service() {
        let dir = TempDir::new().unwrap();
        let config = MirrorConfig::builder()
            .store_path(dir.path())
            .source_credentials("ck", "cs")
            .build()
            .unwrap();

        let result = service(config, Arc::default())
            .run(MirrorCommand::Upload)
            .await;

        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_download_against_empty_library() {
        let dir = TempDir::new().unwrap();
        let config = MirrorConfig::builder()
            .store_path(dir.path())
            .source_credentials("ck", "cs")
            .source_token("tok", "ts")
            .build()
            .unwrap();
        let remote = Arc::new(EmptyRemote::default());

        let report = service(config, Arc::clone(&remote))
            .run(MirrorCommand::Download)
            .await
            .unwrap();

        assert_eq!(report, MirrorReport::Download(SyncReport::default()));
        let urls = remote.urls();
        assert!(urls[0].contains("method=flickr.test.login"));
        assert!(urls.iter().any(|u| u.contains("user_id=me")));
    }

    #[tokio::test]
    async fn test_login_skipped_without_token() {
        let dir = TempDir::new().unwrap();
        let config = MirrorConfig::builder()
            .store_path(dir.path())
            .source_credentials("ck", "cs")
            .source_user_id("42@N0")
            .build()
            .unwrap();
        let remote = Arc::new(EmptyRemote::default());

        service(config, Arc::clone(&remote))
            .run_download()
            .await
            .unwrap();

        let urls = remote.urls();
        assert!(!urls.iter().any(|u| u.contains("flickr.test.login")));
        assert!(urls.iter().any(|u| u.contains("user_id=42%40N0")));
    }

    #[test]
    fn test_media_root_under_store() {
        let config = MirrorConfig::builder()
            .store_path("/srv/photos")
            .build()
            .unwrap();
        let core = service(config, Arc::default());

        assert_eq!(core.media_root(), PathBuf::from("/srv/photos/media"));
    }
}
