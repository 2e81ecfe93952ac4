//! Immich API payloads

use serde::{Deserialize, Serialize};

/// `POST /auth/validateToken`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenResponse {
    #[serde(default)]
    pub auth_status: bool,
}

/// `POST /asset/upload`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub duplicate: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// `PUT /asset/{id}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssetRequest<'a> {
    pub tag_ids: Vec<String>,
    pub original_file_name: &'a str,
    pub is_favorite: bool,
    pub is_archived: bool,
    pub description: &'a str,
}

/// `POST /album`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlbumRequest<'a> {
    pub album_name: &'a str,
    pub album_thumbnail_asset_id: &'a str,
    pub asset_ids: &'a [String],
}

/// `POST /album` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAlbumResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
