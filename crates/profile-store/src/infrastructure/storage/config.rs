//! TOML configuration for the `profile-store` tool.
//!
//! Read from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\ProfileStore\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/profile-store/config.toml` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/ProfileStore/config.toml`
//!
//! ```toml
//! [store]
//! data_dir = "/var/lib/profile-store"
//! log_level = "debug"
//!
//! [legacy]
//! rateLimitSeconds = 10
//! diffEnabled = false
//! ```
//!
//! `[legacy]` holds the host's pre-profile global settings.  They are only
//! read by migrations and by the rate-limit back-fill on save.
//!
//! Every field has a serde default, so a missing file or a partial one both
//! load cleanly.

use std::path::{Path, PathBuf};

use profile_core::SettingMap;
use serde::Deserialize;
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default)]
    pub store: StoreSection,
    /// Legacy global settings, keyed like profile settings.
    #[serde(default)]
    pub legacy: SettingMap,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoreSection {
    /// Directory holding the document blob.  Defaults to `data/` next to the
    /// config file.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_level: default_log_level(),
        }
    }
}

impl StoreConfig {
    /// The configured data directory, or `<config dir>/data`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoPlatformConfigDir`] when no directory is
    /// configured and the platform default cannot be determined.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.store.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(config_dir()?.join("data")),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate config directory.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config at `path`, returning `StoreConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<StoreConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("ProfileStore"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("profile-store"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("ProfileStore")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
