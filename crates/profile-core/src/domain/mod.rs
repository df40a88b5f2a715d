//! Domain entities for the profile store.
//!
//! This module contains pure business logic with no infrastructure
//! dependencies: no file system, no async runtime, no UI types.
//!
//! Code in outer layers (application, infrastructure, UI bridge) depends on
//! the domain, but the domain never depends on them.

/// The persisted configuration document and its profiles.
///
/// See [`document::Document`] for the main type.
pub mod document;

/// Two-level (global vs. per-profile) setting resolution.
pub mod overrides;

/// Typed setting values and well-known setting keys.
pub mod setting;
