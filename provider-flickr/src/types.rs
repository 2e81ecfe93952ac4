//! Flickr API response types
//!
//! Flickr is inconsistent about numbers: the same field arrives as `1` or
//! `"1"` depending on the method, so numeric fields deserialize leniently.

use serde::{Deserialize, Deserializer, Serialize};

/// Extras requested with every photo listing.
pub const PHOTO_EXTRAS: &str = "date_upload,date_taken,media,url_o";

fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) if text.trim().is_empty() => Ok(0),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// `{"_content": "..."}` wrapper used for titles and descriptions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "_content", default)]
    pub content: String,
}

/// One photo or video of a listing. Kept verbatim as the catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlickrPhoto {
    pub id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub server: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub farm: i64,
    #[serde(default)]
    pub title: String,
    /// `photo` or `video`
    #[serde(default)]
    pub media: String,
    #[serde(default)]
    pub url_o: Option<String>,
    /// Upload time, Unix seconds
    #[serde(default, deserialize_with = "lenient_i64")]
    pub dateupload: i64,
    /// Local capture time, `YYYY-MM-DD HH:MM:SS`
    #[serde(default)]
    pub datetaken: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoPage {
    #[serde(deserialize_with = "lenient_i64")]
    pub page: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub pages: i64,
    #[serde(default)]
    pub photo: Vec<FlickrPhoto>,
}

/// `flickr.people.getPhotos`
#[derive(Debug, Clone, Deserialize)]
pub struct PeoplePhotosResponse {
    pub photos: PhotoPage,
}

/// One album. Kept verbatim as the catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlickrPhotoset {
    pub id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub primary: String,
    #[serde(default)]
    pub title: Content,
    #[serde(default)]
    pub description: Content,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub date_update: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub photos: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub videos: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotosetPage {
    #[serde(deserialize_with = "lenient_i64")]
    pub page: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub pages: i64,
    #[serde(default)]
    pub photoset: Vec<FlickrPhotoset>,
}

/// `flickr.photosets.getList`
#[derive(Debug, Clone, Deserialize)]
pub struct PhotosetListResponse {
    pub photosets: PhotosetPage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotosetMember {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotosetMembers {
    #[serde(deserialize_with = "lenient_i64")]
    pub page: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub pages: i64,
    #[serde(default)]
    pub photo: Vec<PhotosetMember>,
}

/// `flickr.photosets.getPhotos`
#[derive(Debug, Clone, Deserialize)]
pub struct PhotosetPhotosResponse {
    pub photoset: PhotosetMembers,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Stream {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "_content", default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamList {
    #[serde(default)]
    pub stream: Vec<Stream>,
}

/// `flickr.video.getStreamInfo`
#[derive(Debug, Clone, Deserialize)]
pub struct StreamInfoResponse {
    pub streams: StreamList,
}

impl StreamInfoResponse {
    /// The `orig` stream, else the first one listed.
    pub fn original_url(&self) -> Option<&str> {
        self.streams
            .stream
            .iter()
            .find(|s| s.kind == "orig")
            .or_else(|| self.streams.stream.first())
            .map(|s| s.url.as_str())
            .filter(|url| !url.is_empty())
    }
}
