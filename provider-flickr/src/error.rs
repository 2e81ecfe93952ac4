//! Error types for the Flickr provider

use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

/// Flickr provider errors
#[derive(Error, Debug)]
pub enum FlickrError {
    /// The API answered but did not report `stat: ok`. Carries the parsed body.
    #[error("Flickr rejected the request: {0}")]
    Rejected(serde_json::Value),

    /// Request could not be signed
    #[error("Signing failed: {0}")]
    Signing(#[from] AuthError),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Video has no downloadable stream
    #[error("No stream available for video {photo_id}")]
    NoStream { photo_id: String },

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Flickr operations
pub type Result<T> = std::result::Result<T, FlickrError>;

/// Error message and code of a rejected call, or the raw body.
pub fn describe_rejection(body: &serde_json::Value) -> String {
    match body.get("message").and_then(|m| m.as_str()) {
        Some(message) => match body.get("code") {
            Some(code) => format!("{} (code {})", message, code),
            None => message.to_string(),
        },
        None => body.to_string(),
    }
}

impl From<FlickrError> for BridgeError {
    fn from(error: FlickrError) -> Self {
        match error {
            FlickrError::BridgeError(e) => e,
            FlickrError::Rejected(body) => BridgeError::OperationFailed(format!(
                "Flickr rejected the request: {}",
                describe_rejection(&body)
            )),
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
