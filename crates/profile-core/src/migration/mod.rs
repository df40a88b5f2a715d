//! One-time schema migrations.
//!
//! Installed instances keep their document across upgrades, so every schema
//! change ships as a named [`Migration`] in the fixed [`MIGRATIONS`] table.
//! The document records each applied migration in `migration_flags`; a
//! migration whose flag is set is never run again.
//!
//! # Purity
//!
//! A migration's `apply` function only sees the document and a
//! [`LegacySnapshot`] of the external legacy values it declared in
//! `legacy_keys`.  It performs no I/O.  The store crate fetches the legacy
//! values, runs the step on a copy of the document, and writes the result
//! through before moving on to the next step.
//!
//! # Adding a migration
//!
//! Append to [`MIGRATIONS`]; never reorder or rename existing entries, since
//! the `name` is the persisted flag key.

use std::collections::HashMap;

use thiserror::Error;

use crate::domain::document::{Document, DocumentError};
use crate::domain::setting::SettingValue;

pub mod steps;

/// Errors produced by a migration step.
#[derive(Debug, Error, PartialEq)]
pub enum MigrationError {
    /// The document violated an invariant the step relies on.
    #[error("invalid document: {0}")]
    InvalidDocument(#[from] DocumentError),
}

/// Values read from the external legacy settings store.
///
/// Only the keys a migration declared are present; a missing key means the
/// legacy store had no value for it.  Values are passed through as stored;
/// a step that cannot use one falls back to its default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacySnapshot {
    values: HashMap<String, SettingValue>,
}

impl LegacySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: SettingValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }
}

impl FromIterator<(String, SettingValue)> for LegacySnapshot {
    fn from_iter<I: IntoIterator<Item = (String, SettingValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Signature of a migration step.
///
/// Returns `Ok(true)` if the document was modified.
pub type ApplyFn = fn(&mut Document, &LegacySnapshot) -> Result<bool, MigrationError>;

/// One named, idempotently-tracked upgrade step.
#[derive(Clone, Copy)]
pub struct Migration {
    /// Persisted flag key; stable forever.
    pub name: &'static str,
    /// Human-readable summary for logs.
    pub description: &'static str,
    /// Legacy keys to fetch before `apply` runs.
    pub legacy_keys: &'static [&'static str],
    pub apply: ApplyFn,
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("name", &self.name)
            .field("legacy_keys", &self.legacy_keys)
            .finish_non_exhaustive()
    }
}

impl Migration {
    /// Returns `true` if `doc` has not recorded this migration yet.
    pub fn is_pending(&self, doc: &Document) -> bool {
        !doc.is_migration_applied(self.name)
    }
}

/// Every migration, in application order.
pub static MIGRATIONS: &[Migration] = &[
    steps::RATE_LIMIT_INHERITANCE,
    steps::DIFF_SETTINGS_INHERITANCE,
];

/// Migrations from [`MIGRATIONS`] that `doc` has not applied yet.
pub fn pending(doc: &Document) -> Vec<&'static Migration> {
    MIGRATIONS.iter().filter(|m| m.is_pending(doc)).collect()
}
