//! # profile-core
//!
//! Shared library for the profile store containing the persisted document
//! model, the per-profile override resolver, and the table of one-time schema
//! migrations.
//!
//! This crate has zero dependencies on storage backends, async runtimes, or UI
//! frameworks.  Everything in here can be unit-tested without touching disk.
//!
//! # Architecture overview
//!
//! The store keeps one configuration *document* that holds a set of named
//! *profiles*.  Each profile is a bundle of typed setting values (provider,
//! rate limits, thresholds...).  Exactly one profile is "current" at any time,
//! and UI modes can be bound to a profile by its stable id.
//!
//! - **`domain`** – The document, profile, and setting value types, plus the
//!   [`OverrideResolver`] that decides whether a setting follows the global
//!   value or a per-profile override.
//!
//! - **`migration`** – The fixed, ordered list of upgrade steps that bring an
//!   older document up to the current schema.  Steps are pure functions; the
//!   store crate decides when to run them and persists the result.

pub mod domain;
pub mod migration;

pub use domain::document::{Document, DocumentError, Profile, ProfileSummary, DEFAULT_PROFILE_NAME};
pub use domain::overrides::{OverrideResolver, SettingLayer};
pub use domain::setting::{keys, SettingMap, SettingValue};
pub use migration::{LegacySnapshot, Migration, MigrationError, MIGRATIONS};
