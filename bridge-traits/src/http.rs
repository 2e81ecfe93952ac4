//! HTTP Client Abstraction
//!
//! Provides async HTTP operations, multipart uploads and streamed downloads.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

/// One field of a `multipart/form-data` body
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content: Bytes,
    },
}

impl MultipartPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(name: impl Into<String>, file_name: impl Into<String>, content: Bytes) -> Self {
        Self::File {
            name: name.into(),
            file_name: file_name.into(),
            content,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::File { name, .. } => name,
        }
    }
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    /// Multipart form fields. Takes precedence over `body` when set.
    pub multipart: Option<Vec<MultipartPart>>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            multipart: None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let json = serde_json::to_vec(body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON serialization failed: {}", e))
        })?;
        self.body = Some(Bytes::from(json));
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn multipart(mut self, parts: Vec<MultipartPart>) -> Self {
        self.multipart = Some(parts);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Parse response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON deserialization failed: {}", e))
        })
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Media type of the body without parameters (`application/json; charset=utf-8`
    /// becomes `application/json`)
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
            .map(|value| value.split(';').next().unwrap_or(value).trim())
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub use_exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    /// A single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.base_delay.min(self.max_delay);
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Statuses worth another attempt under a [`RetryPolicy`].
pub fn is_transient_status(status: u16) -> bool {
    status >= 500 || status == 429
}

/// Async HTTP client trait
///
/// Implementations own transport concerns: TLS and connection pooling.
/// Every status comes back as a normal [`HttpResponse`] so callers can
/// inspect the body; the remote APIs of the mirror report their own errors
/// in it.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request once
    ///
    /// # Errors
    ///
    /// Returns error if the connection fails or the request times out.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Execute an HTTP request, retrying transient statuses and broken
    /// connections as `policy` allows. Only idempotent requests should be
    /// sent this way.
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let _ = policy;
        self.execute(request).await
    }

    /// Download a resource as a stream of bytes
    ///
    /// # Errors
    ///
    /// Fails with [`BridgeError::HttpStatus`] when the server answers with a
    /// status >= 400, so callers can tell a refused transfer from a broken
    /// connection.
    async fn download_stream(
        &self,
        url: String,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let request = HttpRequest::new(HttpMethod::Get, "https://example.com")
            .header("User-Agent", "test")
            .header("x-api-key", "secret")
            .timeout(Duration::from_secs(30));

        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.headers.get("User-Agent"), Some(&"test".to_string()));
        assert!(request.headers.contains_key("x-api-key"));
        assert!(request.multipart.is_none());
    }

    #[test]
    fn test_http_request_json_sets_content_type() {
        let request = HttpRequest::new(HttpMethod::Post, "https://example.com")
            .json(&serde_json::json!({ "albumName": "Trip" }))
            .unwrap();

        assert_eq!(
            request.headers.get("Content-Type"),
            Some(&"application/json".to_string())
        );
        assert_eq!(request.body.unwrap(), Bytes::from(r#"{"albumName":"Trip"}"#));
    }

    #[test]
    fn test_http_response_json_and_header_lookup() {
        let mut headers = HashMap::new();
        headers.insert("X-Request-Id".to_string(), "abc".to_string());
        let response = HttpResponse {
            status: 201,
            headers,
            body: Bytes::from(r#"{"id":"album-1"}"#),
        };

        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["id"], "album-1");
        assert_eq!(response.header("x-request-id"), Some("abc"));
        assert!(response.json::<Vec<String>>().is_err());
    }

    #[test]
    fn test_content_type_strips_parameters() {
        let mut headers = HashMap::new();
        headers.insert(
            "Content-Type".to_string(),
            "application/json; charset=utf-8".to_string(),
        );
        let response = HttpResponse {
            status: 200,
            headers,
            body: Bytes::new(),
        };

        assert_eq!(response.content_type(), Some("application/json"));
    }

    #[test]
    fn test_retry_policy_delays() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(1),
            use_exponential_backoff: true,
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_secs(1));
        assert_eq!(policy.delay_after(3), Duration::from_secs(1));

        let flat = RetryPolicy {
            use_exponential_backoff: false,
            ..policy
        };
        assert_eq!(flat.delay_after(4), Duration::from_millis(500));
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(503));
        assert!(is_transient_status(429));
        assert!(!is_transient_status(401));
        assert!(!is_transient_status(201));
    }

    #[test]
    fn test_multipart_part_names() {
        let text = MultipartPart::text("deviceId", "flickr");
        let file = MultipartPart::file("assetData", "a.jpg", Bytes::from_static(b"x"));

        assert_eq!(text.name(), "deviceId");
        assert_eq!(file.name(), "assetData");
    }
}
