//! Catalog trait and its JSON file implementation
//!
//! The catalog is the single owner of every `Media` and `MediaSet` record.
//! Callers read copies and hand modified copies back through the upsert
//! operations; nothing outside the catalog holds a live reference.

use crate::error::{LibraryError, Result};
use crate::models::{Media, MediaSet, Record};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

pub const MEDIA_DOCUMENT: &str = "media.json";
pub const SET_DOCUMENT: &str = "mediasets.json";

/// Persistent store of media and media sets, keyed by id.
#[async_trait]
pub trait MediaLibrary<M: Record, S: Record>: Send + Sync {
    /// Merge by id, then persist the whole media collection.
    async fn upsert_media(&self, media: Vec<Media<M>>) -> Result<()>;

    /// Merge by id, then persist the whole set collection.
    async fn upsert_sets(&self, sets: Vec<MediaSet<S>>) -> Result<()>;

    async fn get_media(&self, id: &str) -> Result<Option<Media<M>>>;

    async fn get_set(&self, id: &str) -> Result<Option<MediaSet<S>>>;

    async fn list_media(&self) -> Result<Vec<Media<M>>>;

    async fn list_sets(&self) -> Result<Vec<MediaSet<S>>>;

    /// Highest `upload_date` in the catalog, `None` when it holds no media.
    async fn max_upload_date(&self) -> Result<Option<i64>>;

    /// Sets whose `content_as_of` differs from `last_update`.
    async fn outdated_sets(&self) -> Result<Vec<MediaSet<S>>>;

    async fn not_downloaded(&self) -> Result<Vec<Media<M>>>;

    /// Downloaded media with no external id yet.
    async fn not_republished(&self) -> Result<Vec<Media<M>>>;

    /// Convenience wrapper around [`upsert_media`](Self::upsert_media).
    async fn save_media(&self, media: Media<M>) -> Result<()> {
        self.upsert_media(vec![media]).await
    }

    /// Convenience wrapper around [`upsert_sets`](Self::upsert_sets).
    async fn save_set(&self, set: MediaSet<S>) -> Result<()> {
        self.upsert_sets(vec![set]).await
    }
}

/// Catalog kept in memory and persisted as two JSON documents
/// (`media.json`, `mediasets.json`) under the store root.
///
/// Every save writes the full collection to a temporary file in the same
/// directory and renames it over the document, so a reader never sees a
/// half-written file. The temporary file is removed on every failure path,
/// and the in-memory collection only changes once the write succeeded.
pub struct FileMediaLibrary<M, S> {
    root: PathBuf,
    media: RwLock<BTreeMap<String, Media<M>>>,
    sets: RwLock<BTreeMap<String, MediaSet<S>>>,
}

impl<M: Record, S: Record> FileMediaLibrary<M, S> {
    /// Loads both documents from `root`, creating the directory when absent.
    ///
    /// # Errors
    ///
    /// [`LibraryError::StoreCorrupt`] when a document exists but is not valid.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;

        let media: BTreeMap<String, Media<M>> = load_document(&root.join(MEDIA_DOCUMENT)).await?;
        let sets: BTreeMap<String, MediaSet<S>> = load_document(&root.join(SET_DOCUMENT)).await?;

        info!(media = media.len(), sets = sets.len(), "Opened media library");

        Ok(Self {
            root,
            media: RwLock::new(media),
            sets: RwLock::new(sets),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl<M: Record, S: Record> MediaLibrary<M, S> for FileMediaLibrary<M, S> {
    async fn upsert_media(&self, media: Vec<Media<M>>) -> Result<()> {
        for item in &media {
            item.validate().map_err(|message| LibraryError::InvalidInput {
                field: "Media".to_string(),
                message,
            })?;
        }

        // Held across the write so saves land in merge order
        let mut guard = self.media.write().await;
        let mut merged = guard.clone();
        for item in media {
            merged.insert(item.id.clone(), item);
        }
        persist_document(&self.root, MEDIA_DOCUMENT, &merged).await?;
        *guard = merged;
        Ok(())
    }

    async fn upsert_sets(&self, sets: Vec<MediaSet<S>>) -> Result<()> {
        for set in &sets {
            set.validate().map_err(|message| LibraryError::InvalidInput {
                field: "MediaSet".to_string(),
                message,
            })?;
        }

        let mut guard = self.sets.write().await;
        let mut merged = guard.clone();
        for set in sets {
            merged.insert(set.id.clone(), set);
        }
        persist_document(&self.root, SET_DOCUMENT, &merged).await?;
        *guard = merged;
        Ok(())
    }

    async fn get_media(&self, id: &str) -> Result<Option<Media<M>>> {
        Ok(self.media.read().await.get(id).cloned())
    }

    async fn get_set(&self, id: &str) -> Result<Option<MediaSet<S>>> {
        Ok(self.sets.read().await.get(id).cloned())
    }

    async fn list_media(&self) -> Result<Vec<Media<M>>> {
        Ok(self.media.read().await.values().cloned().collect())
    }

    async fn list_sets(&self) -> Result<Vec<MediaSet<S>>> {
        Ok(self.sets.read().await.values().cloned().collect())
    }

    async fn max_upload_date(&self) -> Result<Option<i64>> {
        Ok(self
            .media
            .read()
            .await
            .values()
            .map(|media| media.upload_date)
            .max())
    }

    async fn outdated_sets(&self) -> Result<Vec<MediaSet<S>>> {
        Ok(self
            .sets
            .read()
            .await
            .values()
            .filter(|set| set.is_outdated())
            .cloned()
            .collect())
    }

    async fn not_downloaded(&self) -> Result<Vec<Media<M>>> {
        Ok(self
            .media
            .read()
            .await
            .values()
            .filter(|media| !media.downloaded)
            .cloned()
            .collect())
    }

    async fn not_republished(&self) -> Result<Vec<Media<M>>> {
        Ok(self
            .media
            .read()
            .await
            .values()
            .filter(|media| media.downloaded && !media.is_republished())
            .cloned()
            .collect())
    }
}

async fn load_document<T: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Document absent, starting empty");
            return Ok(BTreeMap::new());
        }
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes).map_err(|e| LibraryError::StoreCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Serializes `document` and atomically replaces `<root>/<name>` with it.
async fn persist_document<T: Serialize>(root: &Path, name: &str, document: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(document)?;
    let root = root.to_path_buf();
    let target = root.join(name);

    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut temp = tempfile::Builder::new()
            .prefix("tmp-")
            .suffix(".json")
            .tempfile_in(&root)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&target).map_err(|e| LibraryError::Io(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| LibraryError::Io(std::io::Error::other(e)))??;

    debug!(document = name, "Persisted library document");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    type Library = FileMediaLibrary<Value, Value>;

    fn media(id: &str, upload_date: i64) -> Media<Value> {
        Media::new(
            id,
            format!("title {}", id),
            upload_date,
            upload_date,
            MediaType::Photo,
            json!({"id": id}),
        )
    }

    fn set(id: &str, last_update: i64) -> MediaSet<Value> {
        MediaSet::new(id, format!("set {}", id), "", "1", last_update, json!({"id": id}))
    }

    #[tokio::test]
    async fn test_open_creates_missing_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested").join("store");

        let library = Library::open(&root).await.unwrap();

        assert!(root.is_dir());
        assert!(library.list_media().await.unwrap().is_empty());
        assert!(library.list_sets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_same_id_keeps_one_latest_record() {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path()).await.unwrap();

        library.upsert_media(vec![media("1", 100)]).await.unwrap();
        let mut updated = media("1", 100);
        updated.title = "renamed".to_string();
        library.upsert_media(vec![updated]).await.unwrap();

        let all = library.list_media().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "renamed");
    }

    #[tokio::test]
    async fn test_max_upload_date() {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path()).await.unwrap();
        assert_eq!(library.max_upload_date().await.unwrap(), None);

        library
            .upsert_media(vec![media("a", 100), media("b", 300)])
            .await
            .unwrap();
        assert_eq!(library.max_upload_date().await.unwrap(), Some(300));
    }

    #[tokio::test]
    async fn test_outdated_sets_follow_watermarks() {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path()).await.unwrap();

        let mut current = set("s", 500);
        current.content_as_of = 500;
        library.upsert_sets(vec![current.clone()]).await.unwrap();
        assert!(library.outdated_sets().await.unwrap().is_empty());

        current.last_update = 600;
        library.save_set(current.clone()).await.unwrap();
        let outdated = library.outdated_sets().await.unwrap();
        assert_eq!(outdated.len(), 1);

        let mut refreshed = outdated[0].clone();
        refreshed.refresh_content(vec!["1".to_string()]);
        library.save_set(refreshed).await.unwrap();
        assert!(library.outdated_sets().await.unwrap().is_empty());
        assert_eq!(
            library.get_set("s").await.unwrap().unwrap().content_as_of,
            600
        );
    }

    #[tokio::test]
    async fn test_filters() {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path()).await.unwrap();

        let pending = media("1", 1);
        let mut downloaded = media("2", 2);
        downloaded.mark_downloaded("1970/1970-01-01-2-a.jpg");
        let mut republished = media("3", 3);
        republished.mark_downloaded("1970/1970-01-01-3-a.jpg");
        republished.external_id = Some("ext".to_string());

        library
            .upsert_media(vec![pending, downloaded, republished])
            .await
            .unwrap();

        let not_downloaded: Vec<String> = library
            .not_downloaded()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(not_downloaded, vec!["1"]);

        let not_republished: Vec<String> = library
            .not_republished()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(not_republished, vec!["2"]);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_collections_unchanged() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("store");
        let library = Library::open(&root).await.unwrap();
        library.upsert_media(vec![media("1", 100)]).await.unwrap();

        std::fs::remove_dir_all(&root).unwrap();
        assert!(library.upsert_media(vec![media("2", 200)]).await.is_err());
        assert!(library.upsert_sets(vec![set("s", 5)]).await.is_err());

        assert!(library.get_media("2").await.unwrap().is_none());
        assert!(library.get_set("s").await.unwrap().is_none());
        assert_eq!(library.max_upload_date().await.unwrap(), Some(100));

        std::fs::create_dir_all(&root).unwrap();
        library.upsert_media(vec![media("3", 300)]).await.unwrap();

        let reopened = Library::open(&root).await.unwrap();
        let ids: Vec<String> = reopened
            .list_media()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let library = Library::open(dir.path()).await.unwrap();
            let mut item = media("1", 100);
            item.errors.record_failure("url", "boom");
            library.upsert_media(vec![item]).await.unwrap();
            library.upsert_sets(vec![set("s", 5)]).await.unwrap();
        }

        let reopened = Library::open(dir.path()).await.unwrap();
        let item = reopened.get_media("1").await.unwrap().unwrap();
        assert_eq!(item.errors.count("url"), 1);
        assert_eq!(item.record, json!({"id": "1"}));
        assert!(reopened.get_set("s").await.unwrap().is_some());

        // Canonical documents only, no temp files left behind
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![MEDIA_DOCUMENT, SET_DOCUMENT]);
    }

    #[tokio::test]
    async fn test_document_is_keyed_by_id() {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path()).await.unwrap();
        library.upsert_media(vec![media("77", 1)]).await.unwrap();

        let raw: Value =
            serde_json::from_slice(&std::fs::read(dir.path().join(MEDIA_DOCUMENT)).unwrap())
                .unwrap();
        assert_eq!(raw["77"]["id"], "77");
        assert_eq!(raw["77"]["uploadDate"], 1);
    }

    #[tokio::test]
    async fn test_corrupt_document_fails_open() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MEDIA_DOCUMENT), b"{ not json").unwrap();

        let result = Library::open(dir.path()).await;
        assert!(matches!(result, Err(LibraryError::StoreCorrupt { .. })));
    }

    #[tokio::test]
    async fn test_invalid_media_is_rejected_before_persist() {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path()).await.unwrap();

        let mut broken = media("1", 1);
        broken.downloaded = true;
        let result = library.upsert_media(vec![broken]).await;

        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
        assert!(!dir.path().join(MEDIA_DOCUMENT).exists());
    }
}
