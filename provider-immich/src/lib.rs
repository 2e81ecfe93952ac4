//! # Immich Provider
//!
//! Implements `PublishTarget` for the Immich server API.
//!
//! ## Overview
//!
//! This module provides:
//! - API key validation
//! - Multipart asset upload with duplicate detection
//! - Best-effort metadata update after upload
//! - Album creation from uploaded assets

pub mod connector;
pub mod error;
pub mod types;

pub use connector::ImmichConnector;
pub use error::{ImmichError, Result};
