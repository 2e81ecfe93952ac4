//! # Sync Module
//!
//! Mirrors a remote media library into the local catalog and republishes it.
//!
//! ## Overview
//!
//! This module manages:
//! - Bounded, persisted retries per entity and failure class (`ErrorLedger`)
//! - The collaborator seams (`MediaSource`, `PublishTarget`)
//! - The four-phase incremental download run (`SyncEngine`)
//! - The republish run to a secondary backend (`Publisher`)
//!
//! ## Components
//!
//! - **Ledger** (`ledger`): per-entity circuit breaker
//! - **Remote** (`remote`): traits implemented by provider crates
//! - **Engine** (`engine`): list delta, download, list albums, reconcile albums
//! - **Publisher** (`publisher`): upload media, create albums

pub mod engine;
pub mod error;
pub mod ledger;
pub mod publisher;
pub mod remote;

pub use engine::{SyncEngine, SyncReport};
pub use error::{Result, SyncError};
pub use ledger::{failure_class, Attempt, ErrorLedger, DEFAULT_THRESHOLD};
pub use publisher::{PublishReport, Publisher};
pub use remote::{MediaSource, PublishError, PublishTarget};
