//! # Mirror Configuration
//!
//! A builder constructs a [`MirrorConfig`] holding every setting the mirror
//! needs: the store root, credentials for the remote media source, the
//! secondary storage backend, the transfer conflict policy and the retry
//! threshold. `build()` validates eagerly so that a bad deployment fails
//! before any network or disk I/O happens.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{ConflictBehavior, MirrorConfig};
//!
//! let config = MirrorConfig::builder()
//!     .store_path("/srv/photos")
//!     .source_credentials("consumer-key", "consumer-secret")
//!     .conflict_behavior(ConflictBehavior::Keep)
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.max_attempts, 3);
//! ```
//!
//! Deployments usually load everything from the environment instead, see
//! [`MirrorConfig::from_env`].

use crate::error::{Error, Result};
use crate::logging::{redact_if_sensitive, LogFormat, LogLevel, LoggingConfig};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default number of failed attempts before an operation is skipped for an
/// entity.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// What the transfer step does when the destination file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictBehavior {
    /// Delete the existing file and transfer again.
    #[default]
    Replace,
    /// Leave the existing file and report its path as the result.
    Keep,
}

impl FromStr for ConflictBehavior {
    type Err = Error;

    /// Anything other than `keep` means replace.
    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("keep") {
            Ok(ConflictBehavior::Keep)
        } else {
            Ok(ConflictBehavior::Replace)
        }
    }
}

/// Credentials for the remote media source.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub oauth_token: Option<String>,
    pub oauth_token_secret: Option<String>,
    /// Remote user id whose library is mirrored. `None` means the token owner.
    pub user_id: Option<String>,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field(
                "consumer_key",
                &redact_if_sensitive("consumer_key", &self.consumer_key),
            )
            .field(
                "consumer_secret",
                &redact_if_sensitive("consumer_secret", &self.consumer_secret),
            )
            .field(
                "oauth_token",
                &self
                    .oauth_token
                    .as_deref()
                    .map(|t| redact_if_sensitive("oauth_token", t)),
            )
            .field(
                "oauth_token_secret",
                &self
                    .oauth_token_secret
                    .as_deref()
                    .map(|t| redact_if_sensitive("oauth_token_secret", t)),
            )
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Secondary storage backend that downloaded media is republished to.
#[derive(Clone, PartialEq, Eq)]
pub enum StorageService {
    Immich { api_url: String, api_key: String },
}

impl fmt::Debug for StorageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageService::Immich { api_url, api_key } => f
                .debug_struct("Immich")
                .field("api_url", api_url)
                .field("api_key", &redact_if_sensitive("api_key", api_key))
                .finish(),
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Root directory holding the catalog documents and the `media/` tree.
    pub store_path: PathBuf,
    pub source: Option<SourceConfig>,
    pub storage_service: Option<StorageService>,
    pub conflict_behavior: ConflictBehavior,
    /// Failed attempts per (entity, failure class) before the operation is
    /// skipped on later passes.
    pub max_attempts: u32,
    pub logging: LoggingConfig,
}

impl MirrorConfig {
    pub fn builder() -> MirrorConfigBuilder {
        MirrorConfigBuilder::default()
    }

    /// Loads configuration from the process environment, after reading an
    /// optional `.env` file from the working directory.
    ///
    /// | Variable | Meaning |
    /// |----------|---------|
    /// | `REPOSITORY` | store root (required) |
    /// | `KEY`, `SECRET` | source consumer key and secret |
    /// | `OAUTH_TOKEN`, `OAUTH_TOKEN_SECRET` | source access token |
    /// | `NSID` | source user id |
    /// | `CONFLICT_BEHAVIOR` | `keep` or `replace` |
    /// | `STORAGE_SERVICE` | `immich` |
    /// | `IMMICH_API_URL`, `IMMICH_TOKEN` | backend endpoint and key |
    /// | `MAX_ATTEMPTS` | retry threshold |
    /// | `LOG_LEVEL`, `LOG_FORMAT` | logging |
    pub fn from_env() -> Result<Self> {
        // A missing .env file is normal in production
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut builder = MirrorConfig::builder();

        if let Some(path) = var("REPOSITORY") {
            builder = builder.store_path(path);
        }

        match (var("KEY"), var("SECRET")) {
            (Some(key), Some(secret)) => {
                builder = builder.source_credentials(key, secret);
                if let (Some(token), Some(token_secret)) =
                    (var("OAUTH_TOKEN"), var("OAUTH_TOKEN_SECRET"))
                {
                    builder = builder.source_token(token, token_secret);
                } else if var("OAUTH_TOKEN").is_some() || var("OAUTH_TOKEN_SECRET").is_some() {
                    return Err(Error::Config(
                        "OAUTH_TOKEN and OAUTH_TOKEN_SECRET must be set together".to_string(),
                    ));
                }
                if let Some(nsid) = var("NSID") {
                    builder = builder.source_user_id(nsid);
                }
            }
            (None, None) => {}
            _ => {
                return Err(Error::Config(
                    "KEY and SECRET must be set together".to_string(),
                ))
            }
        }

        if let Some(behavior) = var("CONFLICT_BEHAVIOR") {
            builder = builder.conflict_behavior(behavior.parse()?);
        }

        if let Some(service) = var("STORAGE_SERVICE") {
            if !service.trim().eq_ignore_ascii_case("immich") {
                return Err(Error::Config(format!(
                    "Unsupported STORAGE_SERVICE: {}",
                    service
                )));
            }
            let api_url = var("IMMICH_API_URL").ok_or_else(|| {
                Error::Config("IMMICH_API_URL is required for STORAGE_SERVICE=immich".to_string())
            })?;
            let api_key = var("IMMICH_TOKEN").ok_or_else(|| {
                Error::Config("IMMICH_TOKEN is required for STORAGE_SERVICE=immich".to_string())
            })?;
            builder = builder.storage_service(StorageService::Immich { api_url, api_key });
        }

        if let Some(max_attempts) = var("MAX_ATTEMPTS") {
            let parsed = max_attempts.trim().parse::<u32>().map_err(|_| {
                Error::Config(format!("MAX_ATTEMPTS is not a number: {}", max_attempts))
            })?;
            builder = builder.max_attempts(parsed);
        }

        let mut logging = LoggingConfig::default();
        if let Some(level) = var("LOG_LEVEL") {
            logging = logging.with_level(level.parse::<LogLevel>()?);
        }
        if let Some(format) = var("LOG_FORMAT") {
            logging = logging.with_format(format.parse::<LogFormat>()?);
        }

        builder.logging(logging).build()
    }

    /// Source credentials, or a configuration error naming what is missing.
    pub fn require_source(&self) -> Result<&SourceConfig> {
        self.source.as_ref().ok_or_else(|| {
            Error::Config(
                "Source credentials are required: set KEY and SECRET".to_string(),
            )
        })
    }

    /// Storage backend, or a configuration error naming what is missing.
    pub fn require_storage_service(&self) -> Result<&StorageService> {
        self.storage_service.as_ref().ok_or_else(|| {
            Error::Config(
                "A storage service is required: set STORAGE_SERVICE".to_string(),
            )
        })
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.store_path.as_os_str().is_empty() {
            return Err(Error::Config("Store path cannot be empty".to_string()));
        }

        if self.max_attempts == 0 {
            return Err(Error::Config(
                "Max attempts must be greater than 0".to_string(),
            ));
        }

        if let Some(source) = &self.source {
            if source.consumer_key.is_empty() || source.consumer_secret.is_empty() {
                return Err(Error::Config(
                    "Consumer key and secret cannot be empty".to_string(),
                ));
            }
            if source.oauth_token.is_some() != source.oauth_token_secret.is_some() {
                return Err(Error::Config(
                    "OAuth token and token secret must be provided together".to_string(),
                ));
            }
        }

        if let Some(StorageService::Immich { api_url, api_key }) = &self.storage_service {
            if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "Immich API URL must be an http(s) URL: {}",
                    api_url
                )));
            }
            if api_key.is_empty() {
                return Err(Error::Config("Immich API key cannot be empty".to_string()));
            }
        }

        Ok(())
    }
}

/// Builder for constructing [`MirrorConfig`] instances.
#[derive(Default)]
pub struct MirrorConfigBuilder {
    store_path: Option<PathBuf>,
    source: Option<SourceConfig>,
    storage_service: Option<StorageService>,
    conflict_behavior: ConflictBehavior,
    max_attempts: Option<u32>,
    logging: Option<LoggingConfig>,
}

impl MirrorConfigBuilder {
    /// Sets the store root directory (required).
    pub fn store_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Sets the source consumer key and secret.
    pub fn source_credentials(
        mut self,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Self {
        let source = self.source.get_or_insert_with(|| SourceConfig {
            consumer_key: String::new(),
            consumer_secret: String::new(),
            oauth_token: None,
            oauth_token_secret: None,
            user_id: None,
        });
        source.consumer_key = consumer_key.into();
        source.consumer_secret = consumer_secret.into();
        self
    }

    /// Sets the access token pair. Requires [`source_credentials`](Self::source_credentials).
    pub fn source_token(mut self, token: impl Into<String>, secret: impl Into<String>) -> Self {
        if let Some(source) = self.source.as_mut() {
            source.oauth_token = Some(token.into());
            source.oauth_token_secret = Some(secret.into());
        }
        self
    }

    /// Sets the remote user whose library is mirrored.
    pub fn source_user_id(mut self, user_id: impl Into<String>) -> Self {
        if let Some(source) = self.source.as_mut() {
            source.user_id = Some(user_id.into());
        }
        self
    }

    pub fn storage_service(mut self, service: StorageService) -> Self {
        self.storage_service = Some(service);
        self
    }

    /// Default: [`ConflictBehavior::Replace`]
    pub fn conflict_behavior(mut self, behavior: ConflictBehavior) -> Self {
        self.conflict_behavior = behavior;
        self
    }

    /// Default: [`DEFAULT_MAX_ATTEMPTS`]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the store path is missing or any provided
    /// value is invalid.
    pub fn build(self) -> Result<MirrorConfig> {
        let store_path = self.store_path.ok_or_else(|| {
            Error::Config("Store path is required: set REPOSITORY".to_string())
        })?;

        let config = MirrorConfig {
            store_path,
            source: self.source,
            storage_service: self.storage_service,
            conflict_behavior: self.conflict_behavior,
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            logging: self.logging.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}
