//! Collaborator traits
//!
//! The engine and the publisher only see these traits. Provider crates
//! implement them and translate their wire formats into catalog entities.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bytes::Bytes;
use core_library::{Media, MediaSet, Record};
use thiserror::Error;

/// Remote media library being mirrored.
///
/// Listing calls page internally; callers see the flattened result.
#[async_trait]
pub trait MediaSource: Send + Sync {
    type MediaRecord: Record;
    type SetRecord: Record;

    /// Everything uploaded at or after `watermark` (epoch ms). `None` lists
    /// the whole library.
    async fn list_media_since(
        &self,
        watermark: Option<i64>,
    ) -> BridgeResult<Vec<Media<Self::MediaRecord>>>;

    /// Downloadable URL of a video.
    async fn resolve_video_url(&self, media: &Media<Self::MediaRecord>) -> BridgeResult<String>;

    async fn list_albums(&self) -> BridgeResult<Vec<MediaSet<Self::SetRecord>>>;

    /// Member ids of `set`, in remote display order.
    async fn list_album_members(&self, set: &MediaSet<Self::SetRecord>)
        -> BridgeResult<Vec<String>>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The backend already holds this payload under `external_id`.
    #[error("Duplicate of {external_id}")]
    Duplicate { external_id: String },

    #[error("{0}")]
    Failed(String),
}

impl From<BridgeError> for PublishError {
    fn from(error: BridgeError) -> Self {
        PublishError::Failed(error.to_string())
    }
}

/// Secondary storage backend receiving republished media.
#[async_trait]
pub trait PublishTarget<M: Record, S: Record>: Send + Sync {
    async fn login(&self) -> Result<(), PublishError>;

    /// Uploads one stored payload and returns the backend id.
    async fn upload_media(&self, media: &Media<M>, content: Bytes) -> Result<String, PublishError>;

    /// Creates an album from already published members and returns its id.
    async fn create_album(
        &self,
        set: &MediaSet<S>,
        primary_external_id: &str,
        member_external_ids: &[String],
    ) -> Result<String, PublishError>;
}
