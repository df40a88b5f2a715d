//! In-process adapters.
//!
//! [`MemoryBlobStore`] keeps blobs in a map and counts writes, which tests use
//! to check that an up-to-date document is never rewritten.  The legacy
//! sources cover the two situations a host can be in: no legacy settings at
//! all, or a fixed set read from configuration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use profile_core::{SettingMap, SettingValue};

use crate::application::ports::{BlobStore, LegacySource, StorageError};

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn blobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.blobs().get(key).cloned())
    }

    async fn set(&self, key: &str, blob: &str) -> Result<(), StorageError> {
        self.blobs().insert(key.to_string(), blob.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.blobs().remove(key);
        Ok(())
    }
}

/// A host with no legacy global settings.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLegacyState;

#[async_trait]
impl LegacySource for NoLegacyState {
    async fn get(&self, _key: &str) -> Option<SettingValue> {
        None
    }
}

/// Legacy global settings fixed at construction time.
#[derive(Debug, Default, Clone)]
pub struct StaticLegacyState {
    values: SettingMap,
}

impl StaticLegacyState {
    pub fn new(values: SettingMap) -> Self {
        Self { values }
    }
}

impl FromIterator<(String, SettingValue)> for StaticLegacyState {
    fn from_iter<I: IntoIterator<Item = (String, SettingValue)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[async_trait]
impl LegacySource for StaticLegacyState {
    async fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key).cloned()
    }
}
