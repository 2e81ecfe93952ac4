//! Flickr API connector implementation
//!
//! Implements `MediaSource` on top of the signed REST requester.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use chrono::NaiveDateTime;
use core_library::{Media, MediaSet, MediaType};
use core_sync::MediaSource;
use tracing::{debug, info, instrument};

use crate::error::{FlickrError, Result};
use crate::requester::FlickrRequester;
use crate::types::{
    FlickrPhoto, FlickrPhotoset, PeoplePhotosResponse, PhotosetListResponse,
    PhotosetPhotosResponse, StreamInfoResponse, PHOTO_EXTRAS,
};

/// Results per page
pub const PAGE_SIZE: u32 = 500;

/// User id that resolves to the token owner.
const AUTHENTICATED_USER: &str = "me";

const DATE_TAKEN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct FlickrConnector {
    requester: FlickrRequester,
    user_id: String,
}

impl FlickrConnector {
    /// Mirrors the library of `user_id`, or of the token owner when `None`.
    pub fn new(requester: FlickrRequester, user_id: Option<String>) -> Self {
        Self {
            requester,
            user_id: user_id.unwrap_or_else(|| AUTHENTICATED_USER.to_string()),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Checks the credentials with `flickr.test.login` and returns the id of
    /// the authenticated user.
    #[instrument(skip(self))]
    pub async fn check_login(&self) -> Result<String> {
        let body = self.requester.get("flickr.test.login", &[]).await?;
        body.get("user")
            .and_then(|user| user.get("id"))
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| FlickrError::ParseError("flickr.test.login: missing user id".to_string()))
    }

    fn to_media(photo: FlickrPhoto) -> Media<FlickrPhoto> {
        let upload_date = photo.dateupload * 1000;
        let taken_date = photo
            .datetaken
            .as_deref()
            .and_then(|taken| NaiveDateTime::parse_from_str(taken, DATE_TAKEN_FORMAT).ok())
            .map(|taken| taken.and_utc().timestamp_millis())
            .filter(|taken| *taken >= 0)
            .unwrap_or(upload_date);
        let media_type = match photo.media.as_str() {
            "photo" => MediaType::Photo,
            "video" => MediaType::Video,
            _ => MediaType::Undetermined,
        };
        let url = photo.url_o.clone().unwrap_or_default();

        Media::new(
            photo.id.clone(),
            photo.title.clone(),
            upload_date,
            taken_date,
            media_type,
            photo,
        )
        .with_url(url)
    }

    fn to_set(set: FlickrPhotoset) -> MediaSet<FlickrPhotoset> {
        MediaSet::new(
            set.id.clone(),
            set.title.content.clone(),
            set.description.content.clone(),
            set.primary.clone(),
            set.date_update,
            set,
        )
    }
}

#[async_trait]
impl MediaSource for FlickrConnector {
    type MediaRecord = FlickrPhoto;
    type SetRecord = FlickrPhotoset;

    #[instrument(skip(self))]
    async fn list_media_since(
        &self,
        watermark: Option<i64>,
    ) -> BridgeResult<Vec<Media<FlickrPhoto>>> {
        let min_upload_date = watermark.map(|ms| (ms / 1000).to_string());
        let per_page = PAGE_SIZE.to_string();
        let mut media = Vec::new();
        let mut page = 1i64;

        loop {
            let page_param = page.to_string();
            let mut params = vec![
                ("user_id", self.user_id.as_str()),
                ("extras", PHOTO_EXTRAS),
                ("per_page", per_page.as_str()),
                ("page", page_param.as_str()),
            ];
            if let Some(min) = &min_upload_date {
                params.push(("min_upload_date", min.as_str()));
            }

            let response: PeoplePhotosResponse = self
                .requester
                .get_as("flickr.people.getPhotos", &params)
                .await?;
            debug!(
                page = response.photos.page,
                pages = response.photos.pages,
                count = response.photos.photo.len(),
                "Listed photo page"
            );

            media.extend(response.photos.photo.into_iter().map(Self::to_media));
            if page >= response.photos.pages {
                break;
            }
            page += 1;
        }

        info!("Listed {} media from Flickr", media.len());
        Ok(media)
    }

    #[instrument(skip(self, media), fields(id = %media.id))]
    async fn resolve_video_url(&self, media: &Media<FlickrPhoto>) -> BridgeResult<String> {
        let response: StreamInfoResponse = self
            .requester
            .get_as(
                "flickr.video.getStreamInfo",
                &[
                    ("photo_id", media.id.as_str()),
                    ("secret", media.record.secret.as_str()),
                ],
            )
            .await?;

        let url = response
            .original_url()
            .ok_or_else(|| FlickrError::NoStream {
                photo_id: media.id.clone(),
            })?;
        Ok(url.to_string())
    }

    #[instrument(skip(self))]
    async fn list_albums(&self) -> BridgeResult<Vec<MediaSet<FlickrPhotoset>>> {
        let per_page = PAGE_SIZE.to_string();
        let mut sets = Vec::new();
        let mut page = 1i64;

        loop {
            let page_param = page.to_string();
            let response: PhotosetListResponse = self
                .requester
                .get_as(
                    "flickr.photosets.getList",
                    &[
                        ("user_id", self.user_id.as_str()),
                        ("per_page", per_page.as_str()),
                        ("page", page_param.as_str()),
                    ],
                )
                .await?;

            sets.extend(response.photosets.photoset.into_iter().map(Self::to_set));
            if page >= response.photosets.pages {
                break;
            }
            page += 1;
        }

        info!("Listed {} albums from Flickr", sets.len());
        Ok(sets)
    }

    #[instrument(skip(self, set), fields(id = %set.id))]
    async fn list_album_members(&self, set: &MediaSet<FlickrPhotoset>) -> BridgeResult<Vec<String>> {
        let per_page = PAGE_SIZE.to_string();
        let mut members = Vec::new();
        let mut page = 1i64;

        loop {
            let page_param = page.to_string();
            let response: PhotosetPhotosResponse = self
                .requester
                .get_as(
                    "flickr.photosets.getPhotos",
                    &[
                        ("photoset_id", set.id.as_str()),
                        ("user_id", self.user_id.as_str()),
                        ("media", "all"),
                        ("per_page", per_page.as_str()),
                        ("page", page_param.as_str()),
                    ],
                )
                .await?;

            members.extend(response.photoset.photo.into_iter().map(|p| p.id));
            if page >= response.photoset.pages {
                break;
            }
            page += 1;
        }

        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bridge_traits::time::FixedClock;
    use bytes::Bytes;
    use core_auth::{AccessToken, ConsumerCredentials, RequestSigner};
    use mockall::mock;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

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

    fn json_response(body: serde_json::Value) -> HttpResponse {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        HttpResponse {
            status: 200,
            headers,
            body: Bytes::from(body.to_string()),
        }
    }

    fn connector(http: MockHttpClient, user_id: Option<&str>) -> FlickrConnector {
        let signer = RequestSigner::new(
            ConsumerCredentials::new("ck", "cs"),
            Some(AccessToken::new("tok", "ts")),
        )
        .with_clock(Arc::new(FixedClock::from_unix(1_700_000_000)));
        FlickrConnector::new(
            FlickrRequester::new(Arc::new(http), signer),
            user_id.map(str::to_string),
        )
    }

    fn photo_json(id: &str, media: &str) -> serde_json::Value {
        json!({
            "id": id,
            "owner": "1@N0",
            "secret": "sec",
            "server": "65535",
            "farm": 66,
            "title": format!("Title {}", id),
            "media": media,
            "dateupload": "1614834367",
            "datetaken": "2021-03-01 10:00:00",
            "url_o": format!("https://live.staticflickr.com/65535/{}_o.jpg", id)
        })
    }

    #[tokio::test]
    async fn test_list_media_pages_and_converts_watermark() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                request.url.contains("method=flickr.people.getPhotos")
                    && request.url.contains("min_upload_date=1614834367&")
                    && request.url.contains("user_id=12%40N0")
                    && request.url.contains("page=1&")
            })
            .times(1)
            .returning(|_| {
                Ok(json_response(json!({
                    "photos": {"page": 1, "pages": 2, "photo": [photo_json("1", "photo")]},
                    "stat": "ok"
                })))
            });
        http.expect_execute()
            .withf(|request| request.url.contains("page=2&"))
            .times(1)
            .returning(|_| {
                Ok(json_response(json!({
                    "photos": {"page": 2, "pages": 2, "photo": [photo_json("2", "video")]},
                    "stat": "ok"
                })))
            });

        let connector = connector(http, Some("12@N0"));
        let media = connector
            .list_media_since(Some(1_614_834_367_999))
            .await
            .unwrap();

        assert_eq!(media.len(), 2);
        assert_eq!(media[0].id, "1");
        assert_eq!(media[0].media_type, MediaType::Photo);
        assert_eq!(media[0].upload_date, 1_614_834_367_000);
        // 2021-03-01T10:00:00Z
        assert_eq!(media[0].taken_date, 1_614_592_800_000);
        assert_eq!(media[0].url, "https://live.staticflickr.com/65535/1_o.jpg");
        assert_eq!(media[0].record.secret, "sec");
        assert_eq!(media[1].media_type, MediaType::Video);
    }

    #[tokio::test]
    async fn test_first_listing_has_no_lower_bound() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                !request.url.contains("min_upload_date") && request.url.contains("user_id=me")
            })
            .times(1)
            .returning(|_| {
                Ok(json_response(json!({
                    "photos": {"page": 1, "pages": 0, "photo": []},
                    "stat": "ok"
                })))
            });

        let media = connector(http, None).list_media_since(None).await.unwrap();
        assert!(media.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_video_url_uses_secret() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                request.url.contains("method=flickr.video.getStreamInfo")
                    && request.url.contains("photo_id=9")
                    && request.url.contains("secret=sec")
            })
            .returning(|_| {
                Ok(json_response(json!({
                    "streams": {"stream": [
                        {"type": "orig", "_content": "https://x.test/9/orig.mp4"}
                    ]},
                    "stat": "ok"
                })))
            });

        let video = FlickrConnector::to_media(serde_json::from_value(photo_json("9", "video")).unwrap());
        let url = connector(http, None).resolve_video_url(&video).await.unwrap();

        assert_eq!(url, "https://x.test/9/orig.mp4");
    }

    #[tokio::test]
    async fn test_resolve_video_url_rejection_is_bridge_error() {
        let mut http = MockHttpClient::new();
        http.expect_execute().returning(|_| {
            Ok(json_response(json!({
                "stat": "fail", "code": 1, "message": "Video not found"
            })))
        });

        let video = FlickrConnector::to_media(serde_json::from_value(photo_json("9", "video")).unwrap());
        let error = connector(http, None)
            .resolve_video_url(&video)
            .await
            .unwrap_err();

        assert!(matches!(error, BridgeError::OperationFailed(msg) if msg.contains("Video not found")));
    }

    #[tokio::test]
    async fn test_albums_and_members() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| request.url.contains("method=flickr.photosets.getList"))
            .returning(|_| {
                Ok(json_response(json!({
                    "photosets": {"page": 1, "pages": 1, "photoset": [{
                        "id": "72",
                        "primary": "1",
                        "title": {"_content": "Trip"},
                        "description": {"_content": "Summer"},
                        "date_update": "1700000000"
                    }]},
                    "stat": "ok"
                })))
            });
        http.expect_execute()
            .withf(|request| {
                request.url.contains("method=flickr.photosets.getPhotos")
                    && request.url.contains("photoset_id=72")
            })
            .returning(|_| {
                Ok(json_response(json!({
                    "photoset": {"id": "72", "page": "1", "pages": "1", "photo": [
                        {"id": "3"}, {"id": "1"}
                    ]},
                    "stat": "ok"
                })))
            });

        let connector = connector(http, None);
        let sets = connector.list_albums().await.unwrap();

        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].name, "Trip");
        assert_eq!(sets[0].description, "Summer");
        assert_eq!(sets[0].primary_photo_id, "1");
        assert_eq!(sets[0].last_update, 1_700_000_000);
        assert!(sets[0].is_outdated());

        let members = connector.list_album_members(&sets[0]).await.unwrap();
        assert_eq!(members, vec!["3", "1"]);
    }

    #[tokio::test]
    async fn test_check_login_returns_user() {
        let mut http = MockHttpClient::new();
        http.expect_execute().returning(|_| {
            Ok(json_response(json!({"user": {"id": "12@N0"}, "stat": "ok"})))
        });

        assert_eq!(connector(http, None).check_login().await.unwrap(), "12@N0");
    }
}
