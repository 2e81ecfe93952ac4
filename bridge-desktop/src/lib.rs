//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with opt-in `RetryPolicy` retries for 5xx and 429 answers,
//!   multipart uploads and streamed downloads
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use bridge_traits::HttpClient;
//! use std::sync::Arc;
//!
//! let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);
//! ```

mod http;

pub use http::ReqwestHttpClient;
