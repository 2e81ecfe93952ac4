use bridge_traits::error::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store document {} is corrupt: {reason}", path.display())]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("Got status code {status} while downloading {url}")]
    TransferStatus { status: u16, url: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, LibraryError>;
