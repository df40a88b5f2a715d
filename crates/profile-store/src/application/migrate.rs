//! Migration engine: brings a freshly read document up to the current schema.
//!
//! Two kinds of work happen here, both on the read path of every gated
//! operation:
//!
//! 1. **Normalisation** – profiles without an id, or sharing one with an
//!    earlier profile, get a fresh id, and a current pointer that names a
//!    missing profile is repointed.  If anything changed the document is
//!    written back once.
//! 2. **Migrations** – each pending entry of [`profile_core::MIGRATIONS`] runs
//!    on a clone of the document, is marked applied, and the clone is written
//!    through *before* the next migration starts.  A failing step discards its
//!    clone, so no partially migrated document is ever persisted or adopted.
//!
//! A document with every flag set and every id present and unique passes
//! through without a single write.

use std::sync::Arc;

use profile_core::migration::{self, LegacySnapshot, Migration};
use profile_core::Document;
use tracing::{debug, info, warn};

use super::ports::{BlobStore, LegacySource};
use super::profile_store::{StoreError, DOCUMENT_KEY};

/// Result of [`MigrationEngine::ensure_migrated`].
#[derive(Debug)]
pub struct MigrationOutcome {
    /// The up-to-date document (also the last one persisted, if any write
    /// happened).
    pub document: Document,
    /// Names of the migrations applied during this call, in order.
    pub applied: Vec<&'static str>,
    /// Number of blob writes performed.
    pub writes: usize,
}

impl MigrationOutcome {
    pub fn wrote(&self) -> bool {
        self.writes > 0
    }
}

/// Runs pending migrations against the persisted document.
///
/// Not gated on its own; callers invoke it from inside the access gate.
pub struct MigrationEngine {
    blobs: Arc<dyn BlobStore>,
    legacy: Arc<dyn LegacySource>,
}

impl MigrationEngine {
    pub fn new(blobs: Arc<dyn BlobStore>, legacy: Arc<dyn LegacySource>) -> Self {
        Self { blobs, legacy }
    }

    /// Reads `keys` from the legacy source.  Absent keys are left out.
    pub async fn legacy_snapshot(&self, keys: &[&str]) -> LegacySnapshot {
        let mut snapshot = LegacySnapshot::new();
        for key in keys {
            if let Some(value) = self.legacy.get(key).await {
                snapshot.insert(*key, value);
            }
        }
        snapshot
    }

    /// Normalises `doc` and applies every pending migration.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Migration`] if a step rejects the document.  Earlier
    ///   steps stay persisted.
    /// - [`StoreError::Storage`] / [`StoreError::Serialization`] if a write
    ///   fails.  The step whose write failed is not marked applied.
    pub async fn ensure_migrated(&self, mut doc: Document) -> Result<MigrationOutcome, StoreError> {
        let mut writes = 0;

        if normalise(&mut doc) {
            persist(self.blobs.as_ref(), &doc).await?;
            writes += 1;
        }

        let mut applied = Vec::new();
        for step in migration::pending(&doc) {
            let candidate = self.apply(step, &doc).await?;
            persist(self.blobs.as_ref(), &candidate).await?;
            writes += 1;
            doc = candidate;
            applied.push(step.name);
        }

        if writes == 0 {
            debug!("document already at current schema");
        }
        Ok(MigrationOutcome {
            document: doc,
            applied,
            writes,
        })
    }

    /// Like [`MigrationEngine::ensure_migrated`] but writes nothing; the
    /// caller persists the returned document itself.
    ///
    /// # Errors
    ///
    /// [`StoreError::Migration`] if a step rejects the document.
    pub async fn migrate_detached(&self, mut doc: Document) -> Result<MigrationOutcome, StoreError> {
        normalise(&mut doc);
        let mut applied = Vec::new();
        for step in migration::pending(&doc) {
            doc = self.apply(step, &doc).await?;
            applied.push(step.name);
        }
        Ok(MigrationOutcome {
            document: doc,
            applied,
            writes: 0,
        })
    }

    /// Runs `step` on a clone of `doc` and marks it applied.  `doc` itself is
    /// never touched, so a failing step leaves nothing behind.
    async fn apply(&self, step: &Migration, doc: &Document) -> Result<Document, StoreError> {
        let legacy = self.legacy_snapshot(step.legacy_keys).await;
        let mut candidate = doc.clone();

        let changed = (step.apply)(&mut candidate, &legacy).map_err(|source| {
            warn!(migration = step.name, "migration failed: {source}");
            StoreError::Migration {
                name: step.name,
                source,
            }
        })?;
        candidate.mark_migration_applied(step.name);
        info!(
            migration = step.name,
            changed, "applied migration: {}", step.description
        );
        Ok(candidate)
    }
}

/// Repairs ids and the current pointer.  Returns `true` if `doc` changed.
fn normalise(doc: &mut Document) -> bool {
    let assigned = doc.assign_unique_ids();
    let repointed = doc.repair_current();
    if assigned > 0 {
        info!(assigned, "assigned ids to profiles with missing or duplicate ids");
    }
    if repointed {
        warn!(
            current = %doc.current_profile_name,
            "current profile pointer named a missing profile; repointed"
        );
    }
    assigned > 0 || repointed
}

/// Serialises `doc` and replaces the stored blob with it.
pub(crate) async fn persist(blobs: &dyn BlobStore, doc: &Document) -> Result<(), StoreError> {
    let blob = serde_json::to_string_pretty(doc)?;
    blobs.set(DOCUMENT_KEY, &blob).await?;
    Ok(())
}
