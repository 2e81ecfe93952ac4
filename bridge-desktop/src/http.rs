//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{
        is_transient_status, HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartPart,
        RetryPolicy,
    },
};
use futures_util::TryStreamExt;
use reqwest::{multipart, Client};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("photo-mirror/", env!("CARGO_PKG_VERSION"));

/// Reqwest-based HTTP client implementation
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - Opt-in retry with exponential backoff on transient answers
/// - Multipart form uploads
/// - Streamed downloads that never buffer the whole payload
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(60))
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        }
    }

    fn build_form(parts: Vec<MultipartPart>) -> multipart::Form {
        parts
            .into_iter()
            .fold(multipart::Form::new(), |form, part| match part {
                MultipartPart::Text { name, value } => form.text(name, value),
                MultipartPart::File {
                    name,
                    file_name,
                    content,
                } => form.part(
                    name,
                    multipart::Part::bytes(content.to_vec()).file_name(file_name),
                ),
            })
    }

    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in request.headers {
            // reqwest sets its own boundary-bearing content type for forms
            if request.multipart.is_some() && key.eq_ignore_ascii_case("content-type") {
                continue;
            }
            req = req.header(key, value);
        }

        if let Some(parts) = request.multipart {
            req = req.multipart(Self::build_form(parts));
        } else if let Some(body) = request.body {
            req = req.body(body);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let response = self
            .build_request(request.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BridgeError::OperationFailed("Request timed out".to_string())
                } else if e.is_connect() {
                    BridgeError::OperationFailed(format!("Connection failed: {}", e))
                } else {
                    BridgeError::OperationFailed(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(url = %request.url, "Executing HTTP request");
        self.send_once(&request).await
    }

    /// The last answer is returned as is, even with a transient status, so
    /// the caller still sees its body.
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(attempt, max_attempts, url = %request.url, "Executing HTTP request");
            let outcome = self.send_once(&request).await;

            let retryable = match &outcome {
                Ok(response) => is_transient_status(response.status),
                Err(_) => true,
            };
            if !retryable || attempt >= max_attempts {
                return outcome;
            }

            match &outcome {
                Ok(response) => warn!(
                    status = response.status,
                    attempt, "HTTP request failed with retryable status"
                ),
                Err(e) => warn!(error = %e, attempt, "HTTP request failed"),
            }

            let delay = policy.delay_after(attempt);
            debug!(delay_ms = delay.as_millis(), "Retrying after delay");
            sleep(delay).await;
            attempt += 1;
        }
    }

    async fn download_stream(
        &self,
        url: String,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(BridgeError::HttpStatus { status, url });
        }

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = tokio_util::io::StreamReader::new(stream);

        Ok(Box::new(reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers each connection with the next canned response (the last one
    /// repeats) and counts the connections.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/services/rest", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let index = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = responses[index.min(responses.len() - 1)];

                let mut request = Vec::new();
                let mut buffer = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buffer).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buffer[..n]),
                    }
                }

                let reply = format!(
                    "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (url, hits)
    }

    fn client() -> ReqwestHttpClient {
        ReqwestHttpClient::with_client(Client::builder().no_proxy().build().unwrap())
    }

    fn quick_retries() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            use_exponential_backoff: true,
        }
    }

    #[tokio::test]
    async fn test_http_client_creation() {
        assert!(ReqwestHttpClient::new().is_ok());
    }

    #[tokio::test]
    async fn test_execute_sends_once_and_keeps_error_body() {
        let (url, hits) = serve(vec![(503, r#"{"stat":"fail","code":105}"#)]).await;

        let response = client()
            .execute(HttpRequest::new(HttpMethod::Post, url))
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["code"], 105);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_stops_at_first_final_answer() {
        let (url, hits) = serve(vec![(503, "{}"), (200, r#"{"stat":"ok"}"#)]).await;

        let response = client()
            .execute_with_retry(HttpRequest::new(HttpMethod::Get, url), quick_retries())
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_answer() {
        let (url, hits) = serve(vec![(502, r#"{"stat":"fail"}"#)]).await;

        let response = client()
            .execute_with_retry(HttpRequest::new(HttpMethod::Get, url), quick_retries())
            .await
            .unwrap();

        assert_eq!(response.status, 502);
        assert_eq!(response.body, Bytes::from_static(br#"{"stat":"fail"}"#));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_multipart_request_drops_explicit_content_type() {
        let client = ReqwestHttpClient::new().unwrap();
        let request = HttpRequest::new(HttpMethod::Post, "https://example.com/upload")
            .header("Content-Type", "multipart/form-data")
            .multipart(vec![
                MultipartPart::text("deviceId", "flickr"),
                MultipartPart::file("assetData", "a.jpg", Bytes::from_static(b"jpeg")),
            ]);

        let built = client.build_request(request).build().unwrap();
        let content_type = built
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        assert!(content_type.starts_with("multipart/form-data; boundary="));
    }
}
