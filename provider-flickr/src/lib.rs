//! # Flickr Provider
//!
//! Implements `MediaSource` for the Flickr REST API.
//!
//! ## Overview
//!
//! This module provides:
//! - A signed REST requester (OAuth 1.0a, HMAC-SHA1) with JSON and
//!   query-string response handling
//! - Lenient response types for photos, photosets and video streams
//! - Paged listing of a user's photos and albums
//! - Original video URL resolution

pub mod connector;
pub mod error;
pub mod requester;
pub mod types;

pub use connector::FlickrConnector;
pub use error::{FlickrError, Result};
pub use requester::{FlickrRequester, REST_ENDPOINT};
pub use types::{FlickrPhoto, FlickrPhotoset};
