//! # Authentication Module
//!
//! OAuth 1.0a request signing for remote API methods that have no first-class
//! client support.
//!
//! ## Overview
//!
//! [`RequestSigner`] turns a verb, a base URL and a set of method parameters
//! into a signed parameter list (HMAC-SHA1 over the canonical base string).
//! Credentials are modelled by [`ConsumerCredentials`] and [`AccessToken`];
//! neither prints its secrets through `Debug`.

pub mod error;
pub mod oauth;
pub mod types;

pub use error::{AuthError, Result};
pub use oauth::{percent_encode, RequestSigner, SignedRequest};
pub use types::{AccessToken, ConsumerCredentials};
