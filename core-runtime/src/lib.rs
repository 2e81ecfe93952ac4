//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the photo mirror:
//! - Logging and tracing infrastructure
//! - Configuration management (builder and environment loading)
//!
//! ## Overview
//!
//! Every other crate in the workspace depends on the conventions established
//! here: `tracing` for structured logs, and a validated [`config::MirrorConfig`]
//! that is built once at startup and handed to the wiring layer.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ConflictBehavior, MirrorConfig, StorageService};
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
