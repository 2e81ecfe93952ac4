//! Error types for the Immich provider

use bridge_traits::error::BridgeError;
use core_sync::PublishError;
use thiserror::Error;

/// Immich provider errors
#[derive(Error, Debug)]
pub enum ImmichError {
    /// API key validation failed
    #[error("Connection failed with status {status}: {body}")]
    AuthenticationFailed { status: u16, body: String },

    /// Server already holds the asset
    #[error("Duplicate of asset {asset_id}")]
    Duplicate { asset_id: String },

    /// API request returned an error
    #[error("Immich API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Immich operations
pub type Result<T> = std::result::Result<T, ImmichError>;

impl From<ImmichError> for BridgeError {
    fn from(error: ImmichError) -> Self {
        match error {
            ImmichError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

impl From<ImmichError> for PublishError {
    fn from(error: ImmichError) -> Self {
        match error {
            ImmichError::Duplicate { asset_id } => PublishError::Duplicate {
                external_id: asset_id,
            },
            other => PublishError::Failed(other.to_string()),
        }
    }
}
