//! # Library Management Module
//!
//! Owns the mirrored catalog and the local media tree.
//!
//! ## Overview
//!
//! This module manages:
//! - Domain models (`Media<T>`, `MediaSet<T>`) generic over the provider payload
//! - Per-entity failure history (`ErrorHistory`)
//! - The `MediaLibrary` catalog trait and its crash-safe JSON implementation
//! - File naming and the `MediaStore` byte transfer step

pub mod catalog;
pub mod error;
pub mod models;
pub mod naming;
pub mod store;

pub use catalog::{FileMediaLibrary, MediaLibrary};
pub use error::{LibraryError, Result};
pub use models::{ErrorHistory, Media, MediaSet, MediaType, ProcessError, Record, Tracked};
pub use store::{FileMediaStore, MediaStore};
