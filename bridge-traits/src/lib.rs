//! # Host Bridge Traits
//!
//! Platform abstraction traits that the mirror core depends on but does not
//! implement itself.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations and byte streams
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Provider
//! crates convert their own error enums into `BridgeError` at the boundary so
//! the sync core only ever sees one error type from collaborators.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so implementations can be
//! shared behind `Arc` across async tasks.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpMethod};
//!
//! async fn fetch(client: &dyn HttpClient) -> bridge_traits::error::Result<serde_json::Value> {
//!     let request = HttpRequest::new(HttpMethod::Get, "https://api.example.com/data");
//!     client.execute(request).await?.json()
//! }
//! ```

pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

pub use http::{
    is_transient_status, HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartPart,
    RetryPolicy,
};
pub use time::{Clock, SystemClock};
