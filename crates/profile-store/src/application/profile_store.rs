//! ProfileStore: the public operation surface over the persisted document.
//!
//! Every operation runs the same cycle inside the [`AccessGate`]:
//!
//! ```text
//!  gate ─► get blob ─► parse / create default ─► MigrationEngine
//!       ─► mutate (or just read) ─► set blob ─► publish StoreEvent ─► release
//! ```
//!
//! The in-memory [`Document`] only lives for the duration of one operation;
//! the blob is the source of truth.  Mutations that fail (unknown profile,
//! last profile, empty name) fail before anything is written.
//!
//! Failures are wrapped in [`StoreError::Operation`] naming the failing
//! operation (`"failed to save config: ..."`).  Match on
//! [`StoreError::root`] to get at the cause.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use profile_core::migration::steps;
use profile_core::{
    keys, Document, DocumentError, MigrationError, Profile, ProfileSummary, SettingMap,
    SettingValue,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::access_gate::{AccessGate, GateError};
use super::migrate::{persist, MigrationEngine};
use super::ports::{BlobStore, LegacySource, StorageError};

/// Blob key the whole document is stored under.
pub const DOCUMENT_KEY: &str = "profile_store_document";

const EVENT_CAPACITY: usize = 32;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Public store operations, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Initialize,
    List,
    Save,
    Load,
    LoadById,
    ReadProfile,
    Delete,
    SetCurrent,
    ReadCurrent,
    Exists,
    SetModeBinding,
    GetModeBinding,
    Snapshot,
    Export,
    Import,
    Reset,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Operation::Initialize => "initialize config store",
            Operation::List => "list configs",
            Operation::Save => "save config",
            Operation::Load => "load config",
            Operation::LoadById => "load config by id",
            Operation::ReadProfile => "read config",
            Operation::Delete => "delete config",
            Operation::SetCurrent => "set current config",
            Operation::ReadCurrent => "read current config",
            Operation::Exists => "check config",
            Operation::SetModeBinding => "set mode binding",
            Operation::GetModeBinding => "get mode binding",
            Operation::Snapshot => "read config snapshot",
            Operation::Export => "export configs",
            Operation::Import => "import configs",
            Operation::Reset => "reset configs",
        };
        f.write_str(phase)
    }
}

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No profile (or profile id) with this name exists.
    #[error("profile not found: {0}")]
    NotFound(String),

    /// The operation would leave the document without profiles.
    #[error("cannot delete the last remaining profile")]
    LastProfile,

    /// Profile names must be non-empty.
    #[error("invalid profile name: {0:?}")]
    InvalidName(String),

    /// The persistence adapter failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The stored blob is not a parseable document, or a document could not
    /// be serialised.
    #[error("stored document is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stored blob parsed but violates a document invariant.
    #[error("stored document is invalid: {0}")]
    InvalidDocument(DocumentError),

    /// A migration step rejected the document.
    #[error("migration {name} failed: {source}")]
    Migration {
        name: &'static str,
        #[source]
        source: MigrationError,
    },

    /// The operation's task panicked after being admitted.
    #[error("operation aborted: {0}")]
    Aborted(String),

    /// Wraps any of the above with the operation that failed.
    #[error("failed to {op}: {source}")]
    Operation {
        op: Operation,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// The underlying cause, with any [`StoreError::Operation`] wrappers
    /// stripped.
    pub fn root(&self) -> &StoreError {
        let mut err = self;
        while let StoreError::Operation { source, .. } = err {
            err = source;
        }
        err
    }

    /// The operation that failed, if this error has been labelled.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            StoreError::Operation { op, .. } => Some(*op),
            _ => None,
        }
    }

    fn during(self, op: Operation) -> Self {
        match self {
            labelled @ StoreError::Operation { .. } => labelled,
            cause => StoreError::Operation {
                op,
                source: Box::new(cause),
            },
        }
    }
}

impl From<DocumentError> for StoreError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::NotFound(name) => StoreError::NotFound(name),
            DocumentError::LastProfile => StoreError::LastProfile,
            DocumentError::EmptyName => StoreError::InvalidName(String::new()),
            other => StoreError::InvalidDocument(other),
        }
    }
}

impl From<GateError> for StoreError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::Aborted(reason) => StoreError::Aborted(reason),
        }
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

/// Read-only view of the document for pickers and change notifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub current_profile_name: String,
    pub profiles: Vec<ProfileSummary>,
    pub mode_bindings: BTreeMap<String, String>,
}

impl StoreSnapshot {
    fn of(doc: &Document) -> Self {
        Self {
            current_profile_name: doc.current_profile_name.clone(),
            profiles: doc.summaries(),
            mode_bindings: doc.mode_bindings.clone(),
        }
    }
}

/// Published after every successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Changed(StoreSnapshot),
    /// The blob was deleted; the next read recreates the default document.
    Reset,
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Gated, persisted collection of named profiles.
///
/// Cheap to clone; clones share the gate, the adapters and the event channel.
#[derive(Clone)]
pub struct ProfileStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    gate: AccessGate,
    blobs: Arc<dyn BlobStore>,
    engine: MigrationEngine,
    events: broadcast::Sender<StoreEvent>,
}

impl ProfileStore {
    pub fn new(blobs: Arc<dyn BlobStore>, legacy: Arc<dyn LegacySource>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                gate: AccessGate::new(),
                engine: MigrationEngine::new(Arc::clone(&blobs), legacy),
                blobs,
                events,
            }),
        }
    }

    /// Receives a [`StoreEvent`] after each successful mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    /// Reads (or creates) the document and brings it up to date.
    ///
    /// Optional: every other operation does the same on its own.
    pub async fn initialize(&self) -> Result<StoreSnapshot, StoreError> {
        self.gated(Operation::Initialize, |inner| async move {
            let doc = inner.read().await?;
            info!(
                profiles = doc.profiles.len(),
                current = %doc.current_profile_name,
                "profile store ready"
            );
            Ok(StoreSnapshot::of(&doc))
        })
        .await
    }

    /// All profiles, sorted by name.
    pub async fn list(&self) -> Result<Vec<ProfileSummary>, StoreError> {
        self.gated(Operation::List, |inner| async move {
            Ok(inner.read().await?.summaries())
        })
        .await
    }

    /// Creates or replaces the profile `name`, returning its id.
    ///
    /// An existing profile keeps its id.  If `settings` lacks a rate limit,
    /// one is back-filled from (in order) this profile's stored value, any
    /// other profile's value, the legacy global value, or the default.
    pub async fn save(&self, name: &str, settings: SettingMap) -> Result<String, StoreError> {
        let name = name.to_string();
        self.gated(Operation::Save, move |inner| async move {
            inner.save(&name, settings).await
        })
        .await
    }

    /// Returns the settings of `name` and makes it the current profile.
    pub async fn load(&self, name: &str) -> Result<SettingMap, StoreError> {
        let name = name.to_string();
        self.gated(Operation::Load, move |inner| async move {
            let mut doc = inner.read().await?;
            let settings = doc.profile(&name)?.settings.clone();
            doc.set_current(&name)?;
            inner.commit(&doc).await?;
            info!(profile = %name, "loaded profile");
            Ok(settings)
        })
        .await
    }

    /// Like [`ProfileStore::load`], addressing the profile by its id.
    ///
    /// Returns the profile's name along with its settings.
    pub async fn load_by_id(&self, id: &str) -> Result<(String, SettingMap), StoreError> {
        let id = id.to_string();
        self.gated(Operation::LoadById, move |inner| async move {
            let mut doc = inner.read().await?;
            let (name, settings) = match doc.profile_by_id(&id) {
                Some((name, profile)) => (name.to_string(), profile.settings.clone()),
                None => return Err(StoreError::NotFound(id)),
            };
            doc.set_current(&name)?;
            inner.commit(&doc).await?;
            info!(profile = %name, %id, "loaded profile by id");
            Ok((name, settings))
        })
        .await
    }

    /// Returns the profile `name` without activating it.
    pub async fn profile(&self, name: &str) -> Result<Profile, StoreError> {
        let name = name.to_string();
        self.gated(Operation::ReadProfile, move |inner| async move {
            Ok(inner.read().await?.profile(&name)?.clone())
        })
        .await
    }

    /// Removes the profile `name` and returns it.
    ///
    /// Deleting the current profile makes the first remaining profile (by
    /// name) current.
    pub async fn delete(&self, name: &str) -> Result<Profile, StoreError> {
        let name = name.to_string();
        self.gated(Operation::Delete, move |inner| async move {
            let mut doc = inner.read().await?;
            let removed = doc.remove_profile(&name)?;
            inner.commit(&doc).await?;
            info!(
                profile = %name,
                id = %removed.id,
                current = %doc.current_profile_name,
                "deleted profile"
            );
            Ok(removed)
        })
        .await
    }

    /// Makes `name` the current profile.
    pub async fn set_current(&self, name: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        self.gated(Operation::SetCurrent, move |inner| async move {
            let mut doc = inner.read().await?;
            doc.set_current(&name)?;
            inner.commit(&doc).await?;
            info!(profile = %name, "switched current profile");
            Ok(())
        })
        .await
    }

    /// Name of the current profile.
    pub async fn current(&self) -> Result<String, StoreError> {
        self.gated(Operation::ReadCurrent, |inner| async move {
            Ok(inner.read().await?.current_profile_name)
        })
        .await
    }

    pub async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let name = name.to_string();
        self.gated(Operation::Exists, move |inner| async move {
            Ok(inner.read().await?.contains(&name))
        })
        .await
    }

    /// Alias of [`ProfileStore::exists`].
    pub async fn has_config(&self, name: &str) -> Result<bool, StoreError> {
        self.exists(name).await
    }

    /// Binds `mode` to `profile_id`.  The id is not checked, so bindings may
    /// point at deleted profiles.
    pub async fn set_mode_binding(&self, mode: &str, profile_id: &str) -> Result<(), StoreError> {
        let mode = mode.to_string();
        let profile_id = profile_id.to_string();
        self.gated(Operation::SetModeBinding, move |inner| async move {
            let mut doc = inner.read().await?;
            if doc.profile_by_id(&profile_id).is_none() {
                debug!(%mode, %profile_id, "binding mode to an unknown profile id");
            }
            doc.mode_bindings.insert(mode.clone(), profile_id.clone());
            inner.commit(&doc).await?;
            info!(%mode, %profile_id, "set mode binding");
            Ok(())
        })
        .await
    }

    pub async fn get_mode_binding(&self, mode: &str) -> Result<Option<String>, StoreError> {
        let mode = mode.to_string();
        self.gated(Operation::GetModeBinding, move |inner| async move {
            Ok(inner.read().await?.mode_bindings.get(&mode).cloned())
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        self.gated(Operation::Snapshot, |inner| async move {
            Ok(StoreSnapshot::of(&inner.read().await?))
        })
        .await
    }

    /// The whole (migrated) document.
    pub async fn export(&self) -> Result<Document, StoreError> {
        self.gated(Operation::Export, |inner| async move { inner.read().await })
            .await
    }

    /// Replaces the stored document with `doc`.
    ///
    /// `doc` must contain at least one profile.  Missing or duplicate ids and
    /// a dangling current pointer are repaired, and pending migrations run,
    /// before the result is written in a single write.  On error the stored
    /// document is left as it was.
    pub async fn import(&self, doc: Document) -> Result<StoreSnapshot, StoreError> {
        self.gated(Operation::Import, move |inner| async move {
            doc.validate()?;
            let doc = inner.engine.migrate_detached(doc).await?.document;
            inner.commit(&doc).await?;
            info!(profiles = doc.profiles.len(), "imported document");
            Ok(StoreSnapshot::of(&doc))
        })
        .await
    }

    /// Deletes the stored blob.  The next operation starts from a fresh
    /// default document.
    pub async fn reset_all(&self) -> Result<(), StoreError> {
        self.gated(Operation::Reset, |inner| async move {
            inner.blobs.delete(DOCUMENT_KEY).await?;
            let _ = inner.events.send(StoreEvent::Reset);
            warn!("profile store reset; all profiles deleted");
            Ok(())
        })
        .await
    }

    async fn gated<T, F, Fut>(&self, op: Operation, body: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<StoreInner>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, StoreError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.inner
            .gate
            .with_lock(move || body(inner))
            .await
            .map_err(|e| e.during(op))
    }
}

impl StoreInner {
    /// Fetches the current document, creating and persisting the default on
    /// first access, then runs the migration engine.
    async fn read(&self) -> Result<Document, StoreError> {
        let doc = match self.blobs.get(DOCUMENT_KEY).await? {
            Some(blob) => {
                let doc: Document = serde_json::from_str(&blob)?;
                doc.validate().map_err(StoreError::InvalidDocument)?;
                debug!(profiles = doc.profiles.len(), "read document");
                doc
            }
            None => {
                let doc = Document::new_default();
                persist(self.blobs.as_ref(), &doc).await?;
                info!("no stored document; created default profile");
                doc
            }
        };
        Ok(self.engine.ensure_migrated(doc).await?.document)
    }

    async fn commit(&self, doc: &Document) -> Result<(), StoreError> {
        persist(self.blobs.as_ref(), doc).await?;
        self.publish(doc);
        Ok(())
    }

    fn publish(&self, doc: &Document) {
        // No subscribers is fine.
        let _ = self.events.send(StoreEvent::Changed(StoreSnapshot::of(doc)));
    }

    async fn save(&self, name: &str, mut settings: SettingMap) -> Result<String, StoreError> {
        if name.is_empty() {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        let mut doc = self.read().await?;

        if !settings.contains_key(keys::RATE_LIMIT_SECONDS) {
            let inherited = match doc.existing_value(keys::RATE_LIMIT_SECONDS, Some(name)) {
                Some(value) => value,
                None => self.legacy_rate_limit().await,
            };
            debug!(profile = %name, value = %inherited, "back-filled rate limit");
            settings.insert(keys::RATE_LIMIT_SECONDS.to_string(), inherited);
        }

        let (id, created) = doc.upsert_profile(name, settings)?;
        self.commit(&doc).await?;
        info!(profile = %name, %id, created, "saved profile");
        Ok(id)
    }

    async fn legacy_rate_limit(&self) -> SettingValue {
        let legacy = self
            .engine
            .legacy_snapshot(&[keys::RATE_LIMIT_SECONDS])
            .await;
        steps::legacy_rate_limit(&legacy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockBlobStore;
    use crate::infrastructure::storage::memory::{MemoryBlobStore, NoLegacyState, StaticLegacyState};

    fn store() -> (ProfileStore, Arc<MemoryBlobStore>) {
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = ProfileStore::new(blobs.clone(), Arc::new(NoLegacyState));
        (store, blobs)
    }

    fn settings(pairs: &[(&str, SettingValue)]) -> SettingMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    // ── First access ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_first_access_creates_and_persists_default_profile() {
        // Arrange
        let (store, blobs) = store();

        // Act
        let profiles = store.list().await.unwrap();

        // Assert
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, "default");
        assert!(!profiles[0].id.is_empty());
        assert!(blobs.get(DOCUMENT_KEY).await.unwrap().is_some());
        assert_eq!(blobs.write_count(), 1, "a fresh document needs no migration writes");
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_a_serialization_error() {
        // Arrange
        let (store, blobs) = store();
        blobs.set(DOCUMENT_KEY, "{not json").await.unwrap();

        // Act
        let err = store.list().await.unwrap_err();

        // Assert
        assert_eq!(err.operation(), Some(Operation::List));
        assert!(matches!(err.root(), StoreError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_blob_without_profiles_is_rejected() {
        // Arrange
        let (store, blobs) = store();
        blobs
            .set(DOCUMENT_KEY, r#"{"currentProfileName":"x","profiles":{}}"#)
            .await
            .unwrap();

        // Act
        let err = store.current().await.unwrap_err();

        // Assert
        assert!(matches!(
            err.root(),
            StoreError::InvalidDocument(DocumentError::NoProfiles)
        ));
    }

    // ── save ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_save_preserves_id_of_existing_profile() {
        // Arrange
        let (store, _) = store();
        let first = store
            .save("work", settings(&[(keys::PROVIDER, "cloud".into())]))
            .await
            .unwrap();

        // Act
        let second = store
            .save("work", settings(&[(keys::PROVIDER, "local".into())]))
            .await
            .unwrap();

        // Assert
        assert_eq!(first, second);
        let profile = store.profile("work").await.unwrap();
        assert_eq!(profile.provider_tag(), Some("local"));
    }

    #[tokio::test]
    async fn test_save_backfills_rate_limit_from_another_profile() {
        // Arrange
        let (store, _) = store();
        store
            .save(
                "alpha",
                settings(&[(keys::RATE_LIMIT_SECONDS, SettingValue::Integer(12))]),
            )
            .await
            .unwrap();

        // Act
        store.save("beta", SettingMap::new()).await.unwrap();

        // Assert
        let beta = store.profile("beta").await.unwrap();
        assert_eq!(
            beta.settings.get(keys::RATE_LIMIT_SECONDS),
            Some(&SettingValue::Integer(12))
        );
    }

    #[tokio::test]
    async fn test_save_prefers_the_updated_profiles_own_rate_limit() {
        // Arrange
        let (store, _) = store();
        store
            .save("a", settings(&[(keys::RATE_LIMIT_SECONDS, SettingValue::Integer(1))]))
            .await
            .unwrap();
        store
            .save("b", settings(&[(keys::RATE_LIMIT_SECONDS, SettingValue::Integer(9))]))
            .await
            .unwrap();

        // Act
        store.save("b", SettingMap::new()).await.unwrap();

        // Assert
        let b = store.profile("b").await.unwrap();
        assert_eq!(
            b.settings.get(keys::RATE_LIMIT_SECONDS),
            Some(&SettingValue::Integer(9))
        );
    }

    #[tokio::test]
    async fn test_save_backfills_from_legacy_then_default() {
        // Arrange
        let blobs = Arc::new(MemoryBlobStore::new());
        let legacy = StaticLegacyState::from_iter([(
            keys::RATE_LIMIT_SECONDS.to_string(),
            SettingValue::Integer(30),
        )]);
        let with_legacy = ProfileStore::new(blobs, Arc::new(legacy));
        let (without_legacy, _) = store();

        // Act
        with_legacy.save("x", SettingMap::new()).await.unwrap();
        without_legacy.save("x", SettingMap::new()).await.unwrap();

        // Assert
        let x = with_legacy.profile("x").await.unwrap();
        assert_eq!(
            x.settings.get(keys::RATE_LIMIT_SECONDS),
            Some(&SettingValue::Integer(30))
        );
        let x = without_legacy.profile("x").await.unwrap();
        assert_eq!(
            x.settings.get(keys::RATE_LIMIT_SECONDS),
            Some(&SettingValue::Integer(steps::DEFAULT_RATE_LIMIT_SECONDS))
        );
    }

    #[tokio::test]
    async fn test_save_with_empty_name_is_rejected() {
        // Arrange
        let (store, _) = store();

        // Act
        let err = store.save("", SettingMap::new()).await.unwrap_err();

        // Assert
        assert_eq!(err.to_string(), "failed to save config: invalid profile name: \"\"");
        assert!(matches!(err.root(), StoreError::InvalidName(_)));
    }

    // ── load / set_current ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_load_activates_profile() {
        // Arrange
        let (store, _) = store();
        store
            .save("work", settings(&[(keys::PROVIDER, "cloud".into())]))
            .await
            .unwrap();

        // Act
        let loaded = store.load("work").await.unwrap();

        // Assert
        assert_eq!(loaded.get(keys::PROVIDER), Some(&SettingValue::Text("cloud".into())));
        assert_eq!(store.current().await.unwrap(), "work");
    }

    #[tokio::test]
    async fn test_load_unknown_profile_is_not_found_and_writes_nothing() {
        // Arrange
        let (store, blobs) = store();
        store.initialize().await.unwrap();
        let writes_before = blobs.write_count();

        // Act
        let err = store.load("nope").await.unwrap_err();

        // Assert
        assert_eq!(err.operation(), Some(Operation::Load));
        assert!(matches!(err.root(), StoreError::NotFound(name) if name == "nope"));
        assert_eq!(blobs.write_count(), writes_before);
    }

    #[tokio::test]
    async fn test_load_by_id_returns_name_and_activates() {
        // Arrange
        let (store, _) = store();
        let id = store.save("work", SettingMap::new()).await.unwrap();

        // Act
        let (name, _) = store.load_by_id(&id).await.unwrap();

        // Assert
        assert_eq!(name, "work");
        assert_eq!(store.current().await.unwrap(), "work");
        assert!(matches!(
            store.load_by_id("missing").await.unwrap_err().root(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_set_current_requires_existing_profile() {
        // Arrange
        let (store, _) = store();
        store.save("work", SettingMap::new()).await.unwrap();

        // Act
        store.set_current("work").await.unwrap();
        let err = store.set_current("ghost").await.unwrap_err();

        // Assert
        assert_eq!(store.current().await.unwrap(), "work");
        assert_eq!(err.operation(), Some(Operation::SetCurrent));
    }

    // ── delete ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_deleting_last_profile_fails_and_keeps_document() {
        // Arrange
        let (store, _) = store();
        let before = store.export().await.unwrap();

        // Act
        let err = store.delete("default").await.unwrap_err();

        // Assert
        assert!(matches!(err.root(), StoreError::LastProfile));
        assert_eq!(store.export().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_deleting_current_profile_repoints_current() {
        // Arrange
        let (store, _) = store();
        store.save("work", SettingMap::new()).await.unwrap();
        store.set_current("work").await.unwrap();

        // Act
        let removed = store.delete("work").await.unwrap();

        // Assert
        assert!(!removed.id.is_empty());
        assert_eq!(store.current().await.unwrap(), "default");
        assert!(!store.exists("work").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_unknown_profile_is_not_found() {
        let (store, _) = store();
        let err = store.delete("ghost").await.unwrap_err();
        assert!(matches!(err.root(), StoreError::NotFound(_)));
    }

    // ── mode bindings ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_mode_bindings_may_dangle() {
        // Arrange
        let (store, _) = store();

        // Act
        store.set_mode_binding("review", "no-such-id").await.unwrap();

        // Assert
        assert_eq!(
            store.get_mode_binding("review").await.unwrap().as_deref(),
            Some("no-such-id")
        );
        assert_eq!(store.get_mode_binding("other").await.unwrap(), None);
    }

    // ── reset / import / export ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_reset_all_recreates_default_document() {
        // Arrange
        let (store, _) = store();
        store.save("work", SettingMap::new()).await.unwrap();
        let old_default_id = store.profile("default").await.unwrap().id;

        // Act
        store.reset_all().await.unwrap();

        // Assert
        let profiles = store.list().await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, "default");
        assert_ne!(profiles[0].id, old_default_id);
    }

    #[tokio::test]
    async fn test_import_repairs_ids_and_current_pointer() {
        // Arrange
        let (store, _) = store();
        let doc: Document = serde_json::from_str(
            r#"{
                "currentProfileName": "gone",
                "profiles": { "b": {}, "a": {} }
            }"#,
        )
        .unwrap();

        // Act
        let snapshot = store.import(doc).await.unwrap();

        // Assert
        assert_eq!(snapshot.current_profile_name, "a");
        assert!(snapshot.profiles.iter().all(|p| !p.id.is_empty()));
        let exported = store.export().await.unwrap();
        assert!(profile_core::MIGRATIONS
            .iter()
            .all(|m| exported.is_migration_applied(m.name)));
    }

    #[tokio::test]
    async fn test_import_of_old_document_costs_one_write() {
        // Arrange
        let (store, blobs) = store();
        store.initialize().await.unwrap();
        let writes_before = blobs.write_count();
        let doc: Document = serde_json::from_str(
            r#"{ "currentProfileName": "a", "profiles": { "a": {}, "b": {} } }"#,
        )
        .unwrap();

        // Act
        store.import(doc).await.unwrap();

        // Assert
        assert_eq!(blobs.write_count(), writes_before + 1);
        let exported = store.export().await.unwrap();
        assert_eq!(blobs.write_count(), writes_before + 1);
        assert!(profile_core::MIGRATIONS
            .iter()
            .all(|m| exported.is_migration_applied(m.name)));
    }

    #[tokio::test]
    async fn test_import_gives_profiles_sharing_an_id_distinct_ids() {
        // Arrange
        let (store, _) = store();
        let doc: Document = serde_json::from_str(
            r#"{
                "currentProfileName": "a",
                "profiles": { "a": { "id": "same" }, "b": { "id": "same" } }
            }"#,
        )
        .unwrap();

        // Act
        let snapshot = store.import(doc).await.unwrap();
        let (name, _) = store.load_by_id("same").await.unwrap();

        // Assert
        assert_eq!(snapshot.profiles[0].id, "same");
        assert_ne!(snapshot.profiles[1].id, "same");
        assert!(!snapshot.profiles[1].id.is_empty());
        assert_eq!(name, "a");
    }

    #[tokio::test]
    async fn test_stored_duplicate_ids_are_repaired_and_persisted() {
        // Arrange
        let (store, blobs) = store();
        blobs
            .set(
                DOCUMENT_KEY,
                r#"{
                    "currentProfileName": "a",
                    "profiles": { "a": { "id": "same" }, "b": { "id": "same" } },
                    "migrationFlags": { "rateLimitSecondsMigrated": true, "diffSettingsMigrated": true }
                }"#,
            )
            .await
            .unwrap();

        // Act
        let first = store.list().await.unwrap();
        let second = store.list().await.unwrap();

        // Assert
        assert_ne!(first[0].id, first[1].id);
        assert_eq!(first, second, "repaired ids must be stable");
    }

    #[tokio::test]
    async fn test_import_rejects_document_without_profiles() {
        // Arrange
        let (store, _) = store();
        let mut doc = Document::new_default();
        doc.profiles.clear();

        // Act
        let err = store.import(doc).await.unwrap_err();

        // Assert
        assert_eq!(err.operation(), Some(Operation::Import));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    // ── events ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_mutations_publish_events() {
        // Arrange
        let (store, _) = store();
        let mut events = store.subscribe();

        // Act
        store.save("work", SettingMap::new()).await.unwrap();
        store.reset_all().await.unwrap();

        // Assert
        match events.recv().await.unwrap() {
            StoreEvent::Changed(snapshot) => {
                assert!(snapshot.profiles.iter().any(|p| p.name == "work"))
            }
            other => panic!("expected Changed, got {other:?}"),
        }
        assert_eq!(events.recv().await.unwrap(), StoreEvent::Reset);
    }

    #[tokio::test]
    async fn test_reads_publish_nothing() {
        // Arrange
        let (store, _) = store();
        let mut events = store.subscribe();

        // Act
        store.list().await.unwrap();
        store.exists("default").await.unwrap();

        // Assert
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    // ── storage failures ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_storage_failure_is_labelled_with_operation() {
        // Arrange
        let mut blobs = MockBlobStore::new();
        blobs
            .expect_get()
            .returning(|_| Err(StorageError::Backend("offline".into())));
        let store = ProfileStore::new(Arc::new(blobs), Arc::new(NoLegacyState));

        // Act
        let err = store.save("work", SettingMap::new()).await.unwrap_err();

        // Assert
        assert_eq!(
            err.to_string(),
            "failed to save config: storage error: storage backend failure: offline"
        );
        assert!(matches!(err.root(), StoreError::Storage(_)));
    }

    #[test]
    fn test_root_strips_nested_labels() {
        let err = StoreError::LastProfile.during(Operation::Delete).during(Operation::Import);
        assert_eq!(err.operation(), Some(Operation::Delete));
        assert!(matches!(err.root(), StoreError::LastProfile));
    }
}
