//! Per-entity circuit breaker
//!
//! Every guarded operation belongs to a failure class. The ledger looks up
//! the entity's counter for that class and refuses to run the operation once
//! the counter reaches the threshold. Counters live inside the entity, so the
//! breaker state is persisted with the catalog and survives restarts.
//!
//! A success never resets the counter: the history of past failures stays
//! visible until an operator clears it.

use core_library::Tracked;
use std::fmt::Display;
use std::future::Future;
use tracing::{error, warn};

/// Failure classes used by the mirror.
pub mod failure_class {
    /// Resolving the downloadable URL of a video.
    pub const VIDEO_URL: &str = "url";
    /// Transferring the payload into the media store.
    pub const DOWNLOAD: &str = "download";
    /// Uploading a payload to the storage backend.
    pub const UPLOAD: &str = "upload";
    /// Backend reported the payload as a duplicate; the message holds the
    /// external id of the existing asset.
    pub const UPLOAD_DUPLICATE: &str = "upload_duplicate";
}

/// Default attempts per (entity, failure class).
pub const DEFAULT_THRESHOLD: u32 = 3;

/// Outcome of a guarded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Succeeded(T),
    /// The operation ran and failed; the failure was recorded.
    Failed,
    /// The operation was not run because the threshold was reached.
    Skipped,
}

impl<T> Attempt<T> {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Attempt::Succeeded(_))
    }

    pub fn succeeded(self) -> Option<T> {
        match self {
            Attempt::Succeeded(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorLedger {
    threshold: u32,
}

impl Default for ErrorLedger {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl ErrorLedger {
    /// A threshold of zero is raised to one.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_exhausted<E: Tracked>(&self, entity: &E, class: &str) -> bool {
        entity.errors().count(class) >= self.threshold
    }

    /// Runs `operation` unless `entity` already failed `class` too often.
    ///
    /// On failure the counter for `class` is incremented and its message
    /// replaced with the error text. The caller persists the entity.
    pub async fn attempt<E, T, Err, F, Fut>(
        &self,
        entity: &mut E,
        class: &str,
        operation: F,
    ) -> Attempt<T>
    where
        E: Tracked,
        Err: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, Err>>,
    {
        let count = entity.errors().count(class);
        if count >= self.threshold {
            warn!(
                entity_id = %entity.entity_id(),
                class,
                count,
                "Skipped as it failed too many times"
            );
            return Attempt::Skipped;
        }

        match operation().await {
            Ok(value) => Attempt::Succeeded(value),
            Err(e) => {
                let entity_id = entity.entity_id().to_string();
                let recorded = entity.errors_mut().record_failure(class, e.to_string());
                error!(
                    entity_id = %entity_id,
                    class,
                    count = recorded.count,
                    error = %recorded.message,
                    "Failed execution"
                );
                Attempt::Failed
            }
        }
    }
}
