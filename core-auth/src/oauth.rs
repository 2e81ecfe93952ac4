//! OAuth 1.0a Request Signing (HMAC-SHA1)
//!
//! # Overview
//!
//! Signing a request takes five steps:
//! 1. Merge the protocol parameters (`oauth_consumer_key`, `oauth_nonce`,
//!    `oauth_signature_method`, `oauth_timestamp`, `oauth_token` when a token
//!    is configured, `oauth_version`) with the method parameters.
//! 2. Percent-encode every key and value (RFC 3986, see [`percent_encode`]),
//!    sort the pairs, and join them as `key=value` with `&`.
//! 3. Build the base string `VERB&enc(url)&enc(canonical_params)`.
//! 4. Build the key `enc(consumer_secret)&enc(token_secret)`; the token part
//!    is empty when there is no token.
//! 5. `oauth_signature = base64(HMAC-SHA1(key, base_string))`.
//!
//! The signed parameter set (now carrying `oauth_signature`) is then sent as
//! the query string of the request.
//!
//! # Example
//!
//! ```
//! use bridge_traits::time::FixedClock;
//! use core_auth::{ConsumerCredentials, RequestSigner};
//! use std::sync::Arc;
//!
//! let signer = RequestSigner::new(ConsumerCredentials::new("ck", "cs"), None)
//!     .with_clock(Arc::new(FixedClock::from_unix(1_700_000_000)));
//!
//! let signed = signer
//!     .sign("GET", "https://api.example.com/rest", &[("method", "photos.list")])
//!     .unwrap();
//! assert!(signed.query_string().contains("oauth_signature="));
//! ```

use crate::error::{AuthError, Result};
use crate::types::{AccessToken, ConsumerCredentials};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bridge_traits::time::{Clock, SystemClock};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;
use std::sync::Arc;
use tracing::{instrument, trace};
use url::Url;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";
const NONCE_BYTES: usize = 12;

/// Percent-encodes a string per RFC 3986.
///
/// Only the unreserved set `A-Z a-z 0-9 - . _ ~` passes through. In
/// particular `! ' ( ) *` are escaped, which `encodeURIComponent`-style
/// encoders leave alone and which the remote API requires escaped.
///
/// ```
/// assert_eq!(core_auth::percent_encode("it's (fun)!*"), "it%27s%20%28fun%29%21%2A");
/// ```
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Result of signing: the base string that was signed, the signature, and
/// the full parameter list to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub base_string: String,
    pub signature: String,
    /// Sorted, unencoded parameters including `oauth_signature`.
    pub params: Vec<(String, String)>,
}

impl SignedRequest {
    /// Encoded `key=value&...` query string, in canonical order.
    pub fn query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// `base_url?query`
    pub fn url(&self, base_url: &str) -> String {
        format!("{}?{}", base_url, self.query_string())
    }
}

/// Signs requests with a consumer key and an optional access token.
pub struct RequestSigner {
    consumer: ConsumerCredentials,
    token: Option<AccessToken>,
    clock: Arc<dyn Clock>,
}

impl RequestSigner {
    pub fn new(consumer: ConsumerCredentials, token: Option<AccessToken>) -> Self {
        Self {
            consumer,
            token,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source used for `oauth_timestamp`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn consumer(&self) -> &ConsumerCredentials {
        &self.consumer
    }

    /// Signs a request with the current time and a fresh random nonce.
    #[instrument(skip(self, params))]
    pub fn sign(
        &self,
        verb: &str,
        base_url: &str,
        params: &[(&str, &str)],
    ) -> Result<SignedRequest> {
        let timestamp = self.clock.unix_timestamp().to_string();
        let nonce = generate_nonce();
        self.sign_with(verb, base_url, params, &timestamp, &nonce)
    }

    /// Signs a request with an explicit timestamp and nonce.
    ///
    /// Deterministic: the same inputs always produce the same signature.
    pub fn sign_with(
        &self,
        verb: &str,
        base_url: &str,
        params: &[(&str, &str)],
        timestamp: &str,
        nonce: &str,
    ) -> Result<SignedRequest> {
        validate_base_url(base_url)?;
        if self.consumer.key.is_empty() {
            return Err(AuthError::MissingCredential("consumer key"));
        }

        let mut all_params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        all_params.push(("oauth_consumer_key".into(), self.consumer.key.clone()));
        all_params.push(("oauth_nonce".into(), nonce.to_string()));
        all_params.push(("oauth_signature_method".into(), SIGNATURE_METHOD.into()));
        all_params.push(("oauth_timestamp".into(), timestamp.to_string()));
        if let Some(token) = &self.token {
            all_params.push(("oauth_token".into(), token.token.clone()));
        }
        all_params.push(("oauth_version".into(), OAUTH_VERSION.into()));

        let canonical = canonicalize(&all_params);
        let base_string = format!(
            "{}&{}&{}",
            verb.to_ascii_uppercase(),
            percent_encode(base_url),
            percent_encode(&canonical)
        );
        trace!(base_string = %base_string, "Computed signature base string");

        let signing_key = format!(
            "{}&{}",
            percent_encode(&self.consumer.secret),
            self.token
                .as_ref()
                .map(|t| percent_encode(&t.secret))
                .unwrap_or_default()
        );

        let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes())
            .map_err(|e| AuthError::SigningFailed(e.to_string()))?;
        mac.update(base_string.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        all_params.push(("oauth_signature".into(), signature.clone()));
        sort_params(&mut all_params);

        Ok(SignedRequest {
            base_string,
            signature,
            params: all_params,
        })
    }
}

/// 12 random bytes, base64 encoded.
fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill(&mut bytes);
    STANDARD.encode(bytes)
}

fn validate_base_url(base_url: &str) -> Result<()> {
    let parsed = Url::parse(base_url).map_err(|e| AuthError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(AuthError::InvalidUrl {
            url: base_url.to_string(),
            reason: "base URL must not carry a query or fragment".to_string(),
        });
    }

    Ok(())
}

/// Pairs sorted by encoded key, then encoded value.
fn sort_params(params: &mut [(String, String)]) {
    params.sort_by_cached_key(|(k, v)| (percent_encode(k), percent_encode(v)));
}

fn canonicalize(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    encoded
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}
