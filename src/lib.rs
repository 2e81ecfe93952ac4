//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Hosts can depend on `photo-mirror-workspace` and enable
//! `desktop-shims` to pull in the fully wired `core-service` façade.

#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreService, MirrorReport};
