use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Login to storage backend failed: {0}")]
    LoginFailed(String),
}

impl From<BridgeError> for SyncError {
    fn from(error: BridgeError) -> Self {
        SyncError::Provider(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
