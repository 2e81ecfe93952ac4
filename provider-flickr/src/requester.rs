//! Signed calls to the Flickr REST endpoint
//!
//! Every call is a GET carrying the method name, the caller's parameters and
//! the OAuth 1.0a protocol parameters in the query string. The response body
//! is JSON when the server says so; otherwise it is parsed as a flat
//! `key=value&...` mapping, which is how some failures come back.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_auth::RequestSigner;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{describe_rejection, FlickrError, Result};

/// Flickr REST API base URL
pub const REST_ENDPOINT: &str = "https://api.flickr.com/services/rest";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct FlickrRequester {
    http_client: Arc<dyn HttpClient>,
    signer: RequestSigner,
    endpoint: String,
}

impl FlickrRequester {
    pub fn new(http_client: Arc<dyn HttpClient>, signer: RequestSigner) -> Self {
        Self {
            http_client,
            signer,
            endpoint: REST_ENDPOINT.to_string(),
        }
    }

    /// Point at another endpoint (a proxy or a test server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Calls `method` and returns the parsed body.
    ///
    /// Fails with [`FlickrError::Rejected`] when the body's `stat` is not
    /// `"ok"`, including on HTTP error statuses.
    #[instrument(skip(self, params))]
    pub async fn get(&self, method: &str, params: &[(&str, &str)]) -> Result<Value> {
        let mut all_params = vec![
            ("nojsoncallback", "1"),
            ("format", "json"),
            ("method", method),
        ];
        all_params.extend_from_slice(params);

        let signed = self.signer.sign("GET", &self.endpoint, &all_params)?;
        let request = HttpRequest::new(HttpMethod::Get, signed.url(&self.endpoint))
            .timeout(REQUEST_TIMEOUT);

        let response = self.http_client.execute(request).await?;
        let content = parse_body(&response)?;

        match content.get("stat").and_then(Value::as_str) {
            Some("ok") => {
                debug!(status = response.status, "Flickr call succeeded");
                Ok(content)
            }
            _ => {
                warn!(
                    status = response.status,
                    reason = %describe_rejection(&content),
                    "Flickr call rejected"
                );
                Err(FlickrError::Rejected(content))
            }
        }
    }

    /// Calls `method` and deserializes the body into `T`.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let content = self.get(method, params).await?;
        serde_json::from_value(content)
            .map_err(|e| FlickrError::ParseError(format!("{}: {}", method, e)))
    }
}

fn parse_body(response: &HttpResponse) -> Result<Value> {
    let is_json = response
        .content_type()
        .map(|ct| ct.eq_ignore_ascii_case("application/json"))
        .unwrap_or(false);

    if is_json {
        return serde_json::from_slice(&response.body)
            .map_err(|e| FlickrError::ParseError(e.to_string()));
    }

    let text = String::from_utf8_lossy(&response.body);
    Ok(parse_text(&text))
}

/// `a=1&b=2` into `{"a": "1", "b": "2"}`. Text without any `&` is returned
/// as `{"text": <text>}`.
pub fn parse_text(text: &str) -> Value {
    if !text.contains('&') {
        let mut single = Map::new();
        single.insert("text".to_string(), Value::String(text.to_string()));
        return Value::Object(single);
    }

    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(text).unwrap_or_else(|_| {
        text.split('&')
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect()
    });

    Value::Object(
        pairs
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
    )
}
