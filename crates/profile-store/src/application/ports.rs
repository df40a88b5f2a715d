//! Ports implemented by the infrastructure layer.
//!
//! The store depends only on these traits.  Production wiring uses
//! [`crate::infrastructure::storage::file::FileBlobStore`]; tests use the
//! in-memory adapters or the `mockall`-generated mocks.

use std::path::PathBuf;

use async_trait::async_trait;
use profile_core::SettingValue;
use thiserror::Error;

/// Error type for persistence adapter calls.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The key cannot be mapped onto the backend (e.g. path separators).
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Any other backend failure.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Opaque key → string blob store.
///
/// Each call is assumed atomic on its own.  Nothing is assumed about a `get`
/// followed by a later `set`; the access gate provides that.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns the blob stored under `key`, or `None` if there is none.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replaces the blob stored under `key`.
    async fn set(&self, key: &str, blob: &str) -> Result<(), StorageError>;

    /// Removes the blob stored under `key`.  Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Read-only access to the host's legacy global settings.
///
/// Only consulted by migrations and by the save back-fill.  A missing key, or
/// a source that cannot be read, is reported as `None`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LegacySource: Send + Sync {
    async fn get(&self, key: &str) -> Option<SettingValue>;
}
