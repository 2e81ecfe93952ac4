//! Domain models for the mirrored library
//!
//! `Media<T>` and `MediaSet<T>` carry an opaque provider payload `T` that is
//! stored and returned untouched. Field names serialize in camelCase so the
//! catalog documents stay readable by other tools.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bounds every provider payload must satisfy to live in the catalog.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Record for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

// =============================================================================
// Media
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Undetermined,
    Photo,
    Video,
}

/// One remote asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media<T> {
    pub id: String,
    pub title: String,
    /// Epoch milliseconds; the incremental listing watermark.
    pub upload_date: i64,
    /// Epoch milliseconds; equals `upload_date` when unknown.
    pub taken_date: i64,
    #[serde(rename = "type", default)]
    pub media_type: MediaType,
    pub record: T,
    /// Best known fetch location. Empty for videos until resolved.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub original_name: String,
    #[serde(default)]
    pub downloaded: bool,
    /// Path relative to the media store root, set once downloaded.
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "ErrorHistory::is_empty")]
    pub errors: ErrorHistory,
    /// Identifier assigned by the secondary storage backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl<T> Media<T> {
    /// A freshly listed, not yet downloaded item.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        upload_date: i64,
        taken_date: i64,
        media_type: MediaType,
        record: T,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            upload_date,
            taken_date,
            media_type,
            record,
            url: String::new(),
            original_name: String::new(),
            downloaded: false,
            location: String::new(),
            errors: ErrorHistory::default(),
            external_id: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn is_video(&self) -> bool {
        self.media_type == MediaType::Video
    }

    pub fn is_republished(&self) -> bool {
        self.external_id.is_some()
    }

    /// Marks the item as stored at `location`.
    pub fn mark_downloaded(&mut self, location: impl Into<String>) {
        self.location = location.into();
        self.downloaded = true;
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Media id cannot be empty".to_string());
        }
        if self.downloaded && self.location.is_empty() {
            return Err(format!(
                "Media {} is marked downloaded without a location",
                self.id
            ));
        }
        if self.upload_date < 0 || self.taken_date < 0 {
            return Err(format!("Media {} has a negative timestamp", self.id));
        }
        Ok(())
    }
}

// =============================================================================
// MediaSet
// =============================================================================

/// One album.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSet<T> {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub primary_photo_id: String,
    /// Membership in display order.
    #[serde(default)]
    pub media_ids: Vec<String>,
    /// Remote modification watermark.
    pub last_update: i64,
    /// Value of `last_update` at the last successful membership refresh.
    #[serde(default)]
    pub content_as_of: i64,
    pub record: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl<T> MediaSet<T> {
    /// A freshly listed set. Membership is empty and `content_as_of` is zero,
    /// so the set starts outdated.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        primary_photo_id: impl Into<String>,
        last_update: i64,
        record: T,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            primary_photo_id: primary_photo_id.into(),
            media_ids: Vec::new(),
            last_update,
            content_as_of: 0,
            record,
            external_id: None,
        }
    }

    pub fn is_outdated(&self) -> bool {
        self.content_as_of != self.last_update
    }

    /// Replaces membership and marks the content current.
    pub fn refresh_content(&mut self, media_ids: Vec<String>) {
        self.media_ids = media_ids;
        self.content_as_of = self.last_update;
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Media set id cannot be empty".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Failure history
// =============================================================================

/// Accumulated failures of one class for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessError {
    pub code: String,
    pub message: String,
    pub count: u32,
}

/// Per-entity failure records keyed by failure class.
///
/// Serialized as a plain list of [`ProcessError`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ProcessError>", into = "Vec<ProcessError>")]
pub struct ErrorHistory(BTreeMap<String, ProcessError>);

impl ErrorHistory {
    pub fn get(&self, code: &str) -> Option<&ProcessError> {
        self.0.get(code)
    }

    /// Failures recorded for `code`, zero when none.
    pub fn count(&self, code: &str) -> u32 {
        self.0.get(code).map(|e| e.count).unwrap_or(0)
    }

    /// Increments the counter for `code` and overwrites its message,
    /// creating the record on first failure.
    pub fn record_failure(&mut self, code: &str, message: impl Into<String>) -> &ProcessError {
        let entry = self
            .0
            .entry(code.to_string())
            .or_insert_with(|| ProcessError {
                code: code.to_string(),
                message: String::new(),
                count: 0,
            });
        entry.count = entry.count.saturating_add(1);
        entry.message = message.into();
        entry
    }

    /// Drops the record for `code`, reopening the breaker for that class.
    pub fn clear(&mut self, code: &str) -> Option<ProcessError> {
        self.0.remove(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessError> {
        self.0.values()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<ProcessError>> for ErrorHistory {
    fn from(errors: Vec<ProcessError>) -> Self {
        let mut map = BTreeMap::new();
        for error in errors {
            // Later duplicates of a code win, matching update-in-place
            map.insert(error.code.clone(), error);
        }
        Self(map)
    }
}

impl From<ErrorHistory> for Vec<ProcessError> {
    fn from(history: ErrorHistory) -> Self {
        history.0.into_values().collect()
    }
}

/// Entities whose operations are guarded by per-class failure counters.
pub trait Tracked {
    fn entity_id(&self) -> &str;
    fn errors(&self) -> &ErrorHistory;
    fn errors_mut(&mut self) -> &mut ErrorHistory;
}

impl<T> Tracked for Media<T> {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn errors(&self) -> &ErrorHistory {
        &self.errors
    }

    fn errors_mut(&mut self) -> &mut ErrorHistory {
        &mut self.errors
    }
}
