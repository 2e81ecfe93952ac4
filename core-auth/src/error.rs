use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}

pub type Result<T> = std::result::Result<T, AuthError>;
