//! Republishing downloaded media to a secondary storage backend
//!
//! Uploads run through the [`ErrorLedger`] under the `upload` class. A
//! duplicate reported by the backend is not a failure: the id of the
//! existing asset is kept in the `upload_duplicate` entry so later album
//! creation can still reference it.

use crate::error::{Result, SyncError};
use crate::ledger::{failure_class, Attempt, ErrorLedger};
use crate::remote::{PublishError, PublishTarget};
use core_library::{Media, MediaLibrary, MediaSet, MediaStore, Record};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub uploaded: u64,
    pub duplicates: u64,
    pub failed: u64,
    pub skipped: u64,
    pub albums_created: u64,
    /// Albums left for a later pass (outdated or with unpublished members)
    pub albums_skipped: u64,
    pub albums_failed: u64,
}

impl PublishReport {
    pub fn new() -> Self {
        Self::default()
    }
}

enum Uploaded {
    New(String),
    Duplicate(String),
}

pub struct Publisher<M: Record, S: Record> {
    library: Arc<dyn MediaLibrary<M, S>>,
    store: Arc<dyn MediaStore>,
    target: Arc<dyn PublishTarget<M, S>>,
    ledger: ErrorLedger,
}

impl<M: Record, S: Record> Publisher<M, S> {
    pub fn new(
        library: Arc<dyn MediaLibrary<M, S>>,
        store: Arc<dyn MediaStore>,
        target: Arc<dyn PublishTarget<M, S>>,
    ) -> Self {
        Self {
            library,
            store,
            target,
            ledger: ErrorLedger::default(),
        }
    }

    pub fn with_ledger(mut self, ledger: ErrorLedger) -> Self {
        self.ledger = ledger;
        self
    }

    /// Logs in, uploads pending media, then creates pending albums.
    ///
    /// A failed login aborts the pass before anything is touched.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<PublishReport> {
        let mut report = PublishReport::new();

        info!("Phase 1: Logging in to storage backend");
        self.target
            .login()
            .await
            .map_err(|e| SyncError::LoginFailed(e.to_string()))?;

        info!("Phase 2: Uploading media");
        self.upload_media(&mut report).await?;

        info!("Phase 3: Creating albums");
        self.upload_albums(&mut report).await?;

        info!(
            uploaded = report.uploaded,
            duplicates = report.duplicates,
            failed = report.failed,
            albums_created = report.albums_created,
            "Publish run finished"
        );
        Ok(report)
    }

    pub async fn upload_media(&self, report: &mut PublishReport) -> Result<()> {
        let pending = self.library.not_republished().await?;
        info!("{} media to upload", pending.len());

        for mut media in pending {
            if media.errors.count(failure_class::UPLOAD_DUPLICATE) >= 1 {
                debug!(id = %media.id, "Already known as a duplicate");
                report.skipped += 1;
                continue;
            }

            let snapshot = media.clone();
            let outcome = self
                .ledger
                .attempt(&mut media, failure_class::UPLOAD, || async {
                    let content = self
                        .store
                        .read(&snapshot.location)
                        .await
                        .map_err(|e| PublishError::Failed(e.to_string()))?;
                    match self.target.upload_media(&snapshot, content).await {
                        Ok(external_id) => Ok::<_, PublishError>(Uploaded::New(external_id)),
                        Err(PublishError::Duplicate { external_id }) => {
                            Ok(Uploaded::Duplicate(external_id))
                        }
                        Err(e) => Err(e),
                    }
                })
                .await;

            match outcome {
                Attempt::Succeeded(Uploaded::New(external_id)) => {
                    debug!(id = %media.id, %external_id, "Uploaded");
                    media.external_id = Some(external_id);
                    report.uploaded += 1;
                }
                Attempt::Succeeded(Uploaded::Duplicate(external_id)) => {
                    warn!(id = %media.id, %external_id, "Backend already holds this media");
                    media
                        .errors
                        .record_failure(failure_class::UPLOAD_DUPLICATE, external_id);
                    report.duplicates += 1;
                }
                Attempt::Failed => report.failed += 1,
                Attempt::Skipped => {
                    report.skipped += 1;
                    continue;
                }
            }

            self.library.save_media(media).await?;
        }
        Ok(())
    }

    pub async fn upload_albums(&self, report: &mut PublishReport) -> Result<()> {
        let media: HashMap<String, Media<M>> = self
            .library
            .list_media()
            .await?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();

        let pending: Vec<MediaSet<S>> = self
            .library
            .list_sets()
            .await?
            .into_iter()
            .filter(|set| set.external_id.is_none())
            .collect();
        info!("{} albums to create", pending.len());

        for mut set in pending {
            if set.is_outdated() {
                debug!(id = %set.id, "Album membership not reconciled yet");
                report.albums_skipped += 1;
                continue;
            }

            let Some((primary, members)) = resolve_album(&media, &set) else {
                report.albums_skipped += 1;
                continue;
            };

            match self.target.create_album(&set, &primary, &members).await {
                Ok(external_id) => {
                    debug!(id = %set.id, %external_id, "Album created");
                    set.external_id = Some(external_id);
                    self.library.save_set(set).await?;
                    report.albums_created += 1;
                }
                Err(e) => {
                    error!(id = %set.id, error = %e, "Failed to create album");
                    report.albums_failed += 1;
                }
            }
        }
        Ok(())
    }
}

/// Backend id of a catalog media: its own external id, or the id of the
/// asset it duplicates.
fn published_id<M>(media: &HashMap<String, Media<M>>, id: &str) -> Option<String> {
    let item = media.get(id)?;
    match item.errors.get(failure_class::UPLOAD_DUPLICATE) {
        Some(duplicate) if duplicate.count > 0 => Some(duplicate.message.clone()),
        _ => item.external_id.clone(),
    }
}

/// Primary and deduplicated member ids, or `None` if any is unpublished.
fn resolve_album<M, S>(
    media: &HashMap<String, Media<M>>,
    set: &MediaSet<S>,
) -> Option<(String, Vec<String>)> {
    let Some(primary) = published_id(media, &set.primary_photo_id) else {
        warn!(
            id = %set.id,
            primary = %set.primary_photo_id,
            "Album skipped, primary media is not published"
        );
        return None;
    };

    let mut seen = HashSet::new();
    let mut members = Vec::with_capacity(set.media_ids.len());
    for member_id in &set.media_ids {
        let Some(external_id) = published_id(media, member_id) else {
            warn!(id = %set.id, member = %member_id, "Album skipped, member is not published");
            return None;
        };
        if seen.insert(external_id.clone()) {
            members.push(external_id);
        }
    }
    Some((primary, members))
}
