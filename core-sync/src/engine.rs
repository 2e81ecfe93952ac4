//! # Sync Engine
//!
//! Drives one mirror run against the catalog. A run executes four phases in
//! a fixed order, each idempotent and safe to re-run after a partial failure:
//!
//! 1. List the remote delta since the catalog watermark and add unseen media.
//! 2. Resolve and transfer every media that is not downloaded yet.
//! 3. List albums, adding new ones and refreshing changed metadata.
//! 4. Refresh membership of every outdated album.
//!
//! Remote failures never abort a run: they are either captured in the
//! entity's error history through the [`ErrorLedger`] or logged and counted.
//! Only catalog persistence errors propagate.

use crate::error::Result;
use crate::ledger::{failure_class, Attempt, ErrorLedger};
use crate::remote::MediaSource;
use core_library::{naming, Media, MediaLibrary, MediaStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Media seen for the first time
    pub media_added: u64,
    pub media_downloaded: u64,
    /// Media whose URL resolution or transfer failed this run
    pub media_failed: u64,
    /// Media left alone because a failure class is exhausted
    pub media_skipped: u64,
    pub sets_added: u64,
    /// Known sets whose remote watermark moved
    pub sets_updated: u64,
    pub sets_reconciled: u64,
    pub sets_failed: u64,
    /// Remote listings (media or albums) that failed outright
    pub listing_failures: u64,
}

impl SyncReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing failed during the run.
    pub fn is_clean(&self) -> bool {
        self.media_failed == 0 && self.sets_failed == 0 && self.listing_failures == 0
    }
}

enum Completion {
    Downloaded,
    Failed,
    Skipped,
}

pub struct SyncEngine<Src: MediaSource> {
    library: Arc<dyn MediaLibrary<Src::MediaRecord, Src::SetRecord>>,
    source: Arc<Src>,
    store: Arc<dyn MediaStore>,
    ledger: ErrorLedger,
}

impl<Src: MediaSource> SyncEngine<Src> {
    pub fn new(
        library: Arc<dyn MediaLibrary<Src::MediaRecord, Src::SetRecord>>,
        source: Arc<Src>,
        store: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            library,
            source,
            store,
            ledger: ErrorLedger::default(),
        }
    }

    pub fn with_ledger(mut self, ledger: ErrorLedger) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn ledger(&self) -> &ErrorLedger {
        &self.ledger
    }

    /// Executes all phases in order.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<SyncReport> {
        let mut report = SyncReport::new();

        info!("Phase 1: Listing new media");
        self.sync_media_list(&mut report).await?;

        info!("Phase 2: Downloading missing media");
        self.download_missing(&mut report).await?;

        info!("Phase 3: Listing albums");
        self.sync_sets(&mut report).await?;

        info!("Phase 4: Reconciling outdated albums");
        self.sync_set_content(&mut report).await?;

        info!(
            added = report.media_added,
            downloaded = report.media_downloaded,
            failed = report.media_failed,
            skipped = report.media_skipped,
            sets_reconciled = report.sets_reconciled,
            sets_failed = report.sets_failed,
            "Sync run finished"
        );
        Ok(report)
    }

    /// Phase 1: adds remote media the catalog does not know yet.
    pub async fn sync_media_list(&self, report: &mut SyncReport) -> Result<()> {
        let watermark = self.library.max_upload_date().await?;
        debug!(?watermark, "Listing media since watermark");

        let listed = match self.source.list_media_since(watermark).await {
            Ok(listed) => listed,
            Err(e) => {
                error!(error = %e, "Failed to list media");
                report.listing_failures += 1;
                return Ok(());
            }
        };

        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        for media in listed {
            if !seen.insert(media.id.clone()) {
                continue;
            }
            if self.library.get_media(&media.id).await?.is_none() {
                fresh.push(media);
            }
        }

        info!("Found {} new media", fresh.len());
        if !fresh.is_empty() {
            report.media_added += fresh.len() as u64;
            self.library.upsert_media(fresh).await?;
        }
        Ok(())
    }

    /// Phase 2: resolves and transfers every media not yet downloaded.
    pub async fn download_missing(&self, report: &mut SyncReport) -> Result<()> {
        let pending = self.library.not_downloaded().await?;
        info!("{} media to download", pending.len());

        for mut media in pending {
            match self.complete(&mut media).await? {
                Completion::Downloaded => report.media_downloaded += 1,
                Completion::Failed => report.media_failed += 1,
                Completion::Skipped => report.media_skipped += 1,
            }
        }
        Ok(())
    }

    async fn complete(&self, media: &mut Media<Src::MediaRecord>) -> Result<Completion> {
        let mut failures = 0u32;

        if media.is_video() {
            let snapshot = media.clone();
            let resolved = loop {
                let outcome = self
                    .ledger
                    .attempt(&mut *media, failure_class::VIDEO_URL, || {
                        self.source.resolve_video_url(&snapshot)
                    })
                    .await;
                match outcome {
                    Attempt::Succeeded(url) => break Some(url),
                    Attempt::Failed => failures += 1,
                    Attempt::Skipped => break None,
                }
            };

            match resolved {
                Some(url) => media.url = url,
                None => {
                    if failures > 0 {
                        self.library.save_media(media.clone()).await?;
                        return Ok(Completion::Failed);
                    }
                    return Ok(Completion::Skipped);
                }
            }
        }

        media.original_name = naming::original_name(media);
        let relative_path = naming::relative_path(media);

        let url = media.url.clone();
        let outcome = self
            .ledger
            .attempt(&mut *media, failure_class::DOWNLOAD, || {
                self.store.transfer(&url, &relative_path)
            })
            .await;

        match outcome {
            Attempt::Succeeded(location) => {
                debug!(id = %media.id, %location, "Stored media");
                media.mark_downloaded(location);
                self.library.save_media(media.clone()).await?;
                Ok(Completion::Downloaded)
            }
            Attempt::Failed => {
                self.library.save_media(media.clone()).await?;
                Ok(Completion::Failed)
            }
            Attempt::Skipped if failures > 0 => {
                self.library.save_media(media.clone()).await?;
                Ok(Completion::Failed)
            }
            Attempt::Skipped => Ok(Completion::Skipped),
        }
    }

    /// Phase 3: adds new albums and refreshes metadata of changed ones.
    ///
    /// A changed album keeps its membership and `content_as_of`, which is
    /// what leaves it outdated for phase 4.
    pub async fn sync_sets(&self, report: &mut SyncReport) -> Result<()> {
        let remote_sets = match self.source.list_albums().await {
            Ok(sets) => sets,
            Err(e) => {
                error!(error = %e, "Failed to list albums");
                report.listing_failures += 1;
                return Ok(());
            }
        };

        let mut changed = Vec::new();
        for remote in remote_sets {
            match self.library.get_set(&remote.id).await? {
                None => {
                    report.sets_added += 1;
                    changed.push(remote);
                }
                Some(mut stored) if stored.last_update != remote.last_update => {
                    debug!(
                        id = %stored.id,
                        from = stored.last_update,
                        to = remote.last_update,
                        "Album changed remotely"
                    );
                    stored.name = remote.name;
                    stored.description = remote.description;
                    stored.primary_photo_id = remote.primary_photo_id;
                    stored.record = remote.record;
                    stored.last_update = remote.last_update;
                    report.sets_updated += 1;
                    changed.push(stored);
                }
                Some(_) => {}
            }
        }

        if !changed.is_empty() {
            self.library.upsert_sets(changed).await?;
        }
        Ok(())
    }

    /// Phase 4: refreshes membership of outdated albums.
    pub async fn sync_set_content(&self, report: &mut SyncReport) -> Result<()> {
        let outdated = self.library.outdated_sets().await?;
        info!("{} albums to reconcile", outdated.len());

        for mut set in outdated {
            match self.source.list_album_members(&set).await {
                Ok(member_ids) => {
                    set.refresh_content(member_ids);
                    self.library.save_set(set).await?;
                    report.sets_reconciled += 1;
                }
                Err(e) => {
                    warn!(id = %set.id, error = %e, "Failed to sync album content");
                    report.sets_failed += 1;
                }
            }
        }
        Ok(())
    }
}
