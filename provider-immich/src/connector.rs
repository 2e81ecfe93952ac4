//! Immich API connector implementation
//!
//! Implements `PublishTarget` for any catalog payload type: only the common
//! media and set fields are sent to the server.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartPart};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use core_library::{Media, MediaSet, Record};
use core_sync::{PublishError, PublishTarget};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::error::{ImmichError, Result};
use crate::types::{
    CreateAlbumRequest, CreateAlbumResponse, UpdateAssetRequest, UploadResponse,
    ValidateTokenResponse,
};

/// Device id reported for every uploaded asset.
pub const DEVICE_ID: &str = "flickr";

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

pub struct ImmichConnector {
    http_client: Arc<dyn HttpClient>,
    api_url: String,
    api_key: String,
}

impl ImmichConnector {
    /// `api_url` is the server's API root, e.g. `https://photos.example.com/api`.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}{}", self.api_url, path))
            .header("Accept", "application/json")
            .header("x-api-key", self.api_key.clone())
    }

    #[instrument(skip(self))]
    pub async fn validate_token(&self) -> Result<()> {
        let response = self
            .http_client
            .execute(self.request(HttpMethod::Post, "/auth/validateToken"))
            .await?;
        let body: Option<ValidateTokenResponse> = parse_lenient(&response);

        if response.status != 201 || !body.map(|b| b.auth_status).unwrap_or(false) {
            return Err(ImmichError::AuthenticationFailed {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).to_string(),
            });
        }
        debug!("Immich: token validation success");
        Ok(())
    }

    /// Uploads the payload and returns the new asset id.
    #[instrument(skip(self, media, content), fields(id = %media.id))]
    pub async fn upload_asset<M>(&self, media: &Media<M>, content: Bytes) -> Result<String> {
        let file_name = if media.original_name.is_empty() {
            media.id.clone()
        } else {
            media.original_name.clone()
        };

        let parts = vec![
            MultipartPart::file("assetData", file_name, content),
            MultipartPart::text("deviceAssetId", media.id.clone()),
            MultipartPart::text("deviceId", DEVICE_ID),
            MultipartPart::text("fileCreatedAt", iso_timestamp(media.taken_date)),
            MultipartPart::text("fileModifiedAt", iso_timestamp(media.upload_date)),
            MultipartPart::text("isFavorite", "false"),
        ];
        let request = self
            .request(HttpMethod::Post, "/asset/upload")
            .multipart(parts)
            .timeout(UPLOAD_TIMEOUT);

        let response = self.http_client.execute(request).await?;
        let body: UploadResponse = parse_lenient(&response).unwrap_or_default();

        match body.id {
            Some(asset_id) if body.duplicate => Err(ImmichError::Duplicate { asset_id }),
            Some(asset_id) if response.status == 201 => {
                debug!(%asset_id, "Immich: upload success");
                Ok(asset_id)
            }
            _ => Err(ImmichError::ApiError {
                status_code: response.status,
                message: format!(
                    "Error uploading {}: {}",
                    media.title,
                    body.error.unwrap_or_else(|| body_text(&response))
                ),
            }),
        }
    }

    /// Sets the original file name and description of an uploaded asset.
    #[instrument(skip(self, media), fields(id = %media.id))]
    pub async fn update_asset<M>(&self, asset_id: &str, media: &Media<M>) -> Result<()> {
        let payload = UpdateAssetRequest {
            tag_ids: Vec::new(),
            original_file_name: &media.original_name,
            is_favorite: false,
            is_archived: false,
            description: &media.title,
        };
        let request = self
            .request(HttpMethod::Put, &format!("/asset/{}", asset_id))
            .json(&payload)?;

        let response = self.http_client.execute(request).await?;
        if response.status != 200 {
            return Err(ImmichError::ApiError {
                status_code: response.status,
                message: body_text(&response),
            });
        }
        debug!(%asset_id, "Immich: update success");
        Ok(())
    }

    #[instrument(skip(self, set, member_ids), fields(id = %set.id))]
    pub async fn create_album_for<S>(
        &self,
        set: &MediaSet<S>,
        primary_id: &str,
        member_ids: &[String],
    ) -> Result<String> {
        let payload = CreateAlbumRequest {
            album_name: &set.name,
            album_thumbnail_asset_id: primary_id,
            asset_ids: member_ids,
        };
        let request = self.request(HttpMethod::Post, "/album").json(&payload)?;

        let response = self.http_client.execute(request).await?;
        let body: CreateAlbumResponse = parse_lenient(&response).unwrap_or_default();

        match body.id {
            Some(album_id) if response.status == 201 => Ok(album_id),
            _ => Err(ImmichError::ApiError {
                status_code: response.status,
                message: format!(
                    "Error creating album {}: {}",
                    set.name,
                    body.error.unwrap_or_else(|| body_text(&response))
                ),
            }),
        }
    }
}

#[async_trait]
impl<M: Record, S: Record> PublishTarget<M, S> for ImmichConnector {
    async fn login(&self) -> std::result::Result<(), PublishError> {
        Ok(self.validate_token().await?)
    }

    async fn upload_media(
        &self,
        media: &Media<M>,
        content: Bytes,
    ) -> std::result::Result<String, PublishError> {
        let asset_id = self.upload_asset(media, content).await?;

        if let Err(e) = self.update_asset(&asset_id, media).await {
            error!(%asset_id, error = %e, "Immich: error updating asset");
        }
        Ok(asset_id)
    }

    async fn create_album(
        &self,
        set: &MediaSet<S>,
        primary_external_id: &str,
        member_external_ids: &[String],
    ) -> std::result::Result<String, PublishError> {
        Ok(self
            .create_album_for(set, primary_external_id, member_external_ids)
            .await?)
    }
}

/// JavaScript-style ISO timestamp (`2021-03-04T05:06:07.000Z`).
fn iso_timestamp(epoch_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_lenient<T: DeserializeOwned>(response: &HttpResponse) -> Option<T> {
    response.json().ok()
}

fn body_text(response: &HttpResponse) -> String {
    String::from_utf8_lossy(&response.body).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use core_library::MediaType;
    use mockall::mock;
    use mockall::Sequence;
    use serde_json::json;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn download_stream(
                &self,
                url: String,
            ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
        }
    }

    fn response(status: u16, body: serde_json::Value) -> HttpResponse {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        HttpResponse {
            status,
            headers,
            body: Bytes::from(body.to_string()),
        }
    }

    fn media() -> Media<()> {
        // 2021-03-04T05:06:07Z taken, 2021-03-05T00:00:00Z uploaded
        let mut media = Media::new(
            "51",
            "Beach",
            1_614_902_400_000,
            1_614_834_367_000,
            MediaType::Photo,
            (),
        );
        media.original_name = "Beach.jpg".to_string();
        media.mark_downloaded("2021/2021-03-04-51-Beach.jpg");
        media
    }

    fn connector(http: MockHttpClient) -> ImmichConnector {
        ImmichConnector::new(Arc::new(http), "https://immich.test/api/", "secret-key")
    }

    fn text_field<'a>(parts: &'a [MultipartPart], field: &str) -> Option<&'a str> {
        parts.iter().find_map(|part| match part {
            MultipartPart::Text { name, value } if name == field => Some(value.as_str()),
            _ => None,
        })
    }

    #[tokio::test]
    async fn test_login_requires_201_and_auth_status() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                request.method == HttpMethod::Post
                    && request.url == "https://immich.test/api/auth/validateToken"
                    && request.headers.get("x-api-key").map(String::as_str) == Some("secret-key")
            })
            .times(1)
            .returning(|_| Ok(response(201, json!({"authStatus": true}))));

        let target = connector(http);
        PublishTarget::<(), ()>::login(&target).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Ok(response(401, json!({"message": "Invalid API key"}))));

        let result = connector(http).validate_token().await;

        assert!(matches!(
            result,
            Err(ImmichError::AuthenticationFailed { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_upload_sends_form_then_updates_metadata() {
        let mut http = MockHttpClient::new();
        let mut seq = Sequence::new();
        http.expect_execute()
            .withf(|request| {
                let Some(parts) = request.multipart.as_deref() else {
                    return false;
                };
                let file_ok = parts.iter().any(|part| {
                    matches!(
                        part,
                        MultipartPart::File { name, file_name, content }
                            if name == "assetData"
                                && file_name == "Beach.jpg"
                                && &content[..] == b"jpeg"
                    )
                });
                request.url == "https://immich.test/api/asset/upload"
                    && file_ok
                    && text_field(parts, "deviceAssetId") == Some("51")
                    && text_field(parts, "deviceId") == Some("flickr")
                    && text_field(parts, "fileCreatedAt") == Some("2021-03-04T05:06:07.000Z")
                    && text_field(parts, "fileModifiedAt") == Some("2021-03-05T00:00:00.000Z")
                    && text_field(parts, "isFavorite") == Some("false")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(201, json!({"id": "asset-1", "duplicate": false}))));
        http.expect_execute()
            .withf(|request| {
                let body: serde_json::Value =
                    serde_json::from_slice(request.body.as_deref().unwrap_or_default())
                        .unwrap_or_default();
                request.method == HttpMethod::Put
                    && request.url == "https://immich.test/api/asset/asset-1"
                    && body["originalFileName"] == "Beach.jpg"
                    && body["description"] == "Beach"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(200, json!({"id": "asset-1"}))));

        let target = connector(http);
        let id = PublishTarget::<(), ()>::upload_media(&target, &media(), Bytes::from_static(b"jpeg"))
            .await;

        assert_eq!(id, Ok("asset-1".to_string()));
    }

    #[tokio::test]
    async fn test_metadata_update_failure_is_ignored() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| request.method == HttpMethod::Post)
            .returning(|_| Ok(response(201, json!({"id": "asset-2"}))));
        http.expect_execute()
            .withf(|request| request.method == HttpMethod::Put)
            .returning(|_| Err(BridgeError::OperationFailed("timeout".to_string())));

        let target = connector(http);
        let id = PublishTarget::<(), ()>::upload_media(&target, &media(), Bytes::new()).await;

        assert_eq!(id, Ok("asset-2".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_upload_is_distinguished() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Ok(response(200, json!({"id": "existing", "duplicate": true}))));

        let target = connector(http);
        let result = PublishTarget::<(), ()>::upload_media(&target, &media(), Bytes::new()).await;

        assert_eq!(
            result,
            Err(PublishError::Duplicate {
                external_id: "existing".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_upload_error_is_failure() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Ok(response(400, json!({"error": "Bad Request"}))));

        let target = connector(http);
        let result = PublishTarget::<(), ()>::upload_media(&target, &media(), Bytes::new()).await;

        assert!(matches!(result, Err(PublishError::Failed(msg)) if msg.contains("Bad Request")));
    }

    #[tokio::test]
    async fn test_create_album() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                let body: serde_json::Value =
                    serde_json::from_slice(request.body.as_deref().unwrap_or_default())
                        .unwrap_or_default();
                request.url == "https://immich.test/api/album"
                    && body == json!({
                        "albumName": "Trip",
                        "albumThumbnailAssetId": "a",
                        "assetIds": ["a", "b"]
                    })
            })
            .returning(|_| Ok(response(201, json!({"id": "album-9"}))));

        let set: MediaSet<()> = MediaSet::new("72", "Trip", "", "1", 10, ());
        let target = connector(http);
        let id = PublishTarget::<(), ()>::create_album(
            &target,
            &set,
            "a",
            &["a".to_string(), "b".to_string()],
        )
        .await;

        assert_eq!(id, Ok("album-9".to_string()));
    }
}
