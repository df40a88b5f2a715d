//! UI command bridge: exposes store and override operations to a frontend.
//!
//! Every command takes the shared [`AppState`] and returns a
//! [`CommandResult<T>`], so each response has the same JSON shape:
//! `{ success: bool, data: T | null, error: string | null }`.  The frontend
//! can check `result.success` without wrapping each call in a try/catch.
//!
//! Errors are rendered with their operation label, e.g.
//! `"failed to delete config: cannot delete the last remaining profile"`.
//!
//! The `profile-store` binary drives the same commands and prints the
//! results, so the CLI output and the frontend payloads are identical.

use std::sync::Arc;

use profile_core::{Document, OverrideResolver, ProfileSummary, SettingMap, SettingValue};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::profile_store::{ProfileStore, StoreSnapshot};
use crate::infrastructure::storage::{
    config::{ConfigError, StoreConfig},
    file::FileBlobStore,
    memory::StaticLegacyState,
};

// ── Shared application state ──────────────────────────────────────────────────

/// State shared by all commands.
///
/// The store serializes its own operations; the override resolver is
/// process-local and not persisted.
pub struct AppState {
    pub store: ProfileStore,
    pub overrides: OverrideResolver,
}

impl AppState {
    pub fn new(store: ProfileStore) -> Arc<Self> {
        Arc::new(Self {
            store,
            overrides: OverrideResolver::new(),
        })
    }

    /// Wires a file-backed store using `config`'s data directory and legacy
    /// values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoPlatformConfigDir`] if no data directory is
    /// configured and the platform default cannot be determined.
    pub fn from_config(config: &StoreConfig) -> Result<Arc<Self>, ConfigError> {
        let data_dir = config.data_dir()?;
        info!(data_dir = %data_dir.display(), legacy_keys = config.legacy.len(), "opening profile store");
        let store = ProfileStore::new(
            Arc::new(FileBlobStore::new(data_dir)),
            Arc::new(StaticLegacyState::new(config.legacy.clone())),
        );
        Ok(Self::new(store))
    }
}

// ── Data Transfer Objects ─────────────────────────────────────────────────────

/// One entry of the profile picker: `{name, id, providerTag}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub name: String,
    pub id: String,
    pub provider_tag: Option<String>,
}

impl From<ProfileSummary> for ProfileDto {
    fn from(s: ProfileSummary) -> Self {
        Self {
            name: s.name,
            id: s.id,
            provider_tag: s.provider_tag,
        }
    }
}

/// A profile with its full settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDetailDto {
    pub name: String,
    pub id: String,
    pub settings: SettingMap,
}

/// Unified response wrapper used by every command.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

impl<T: Serialize, E: std::fmt::Display> From<Result<T, E>> for CommandResult<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

// ── Profile commands ──────────────────────────────────────────────────────────

/// All profiles, sorted by name.
pub async fn list_profiles(state: Arc<AppState>) -> CommandResult<Vec<ProfileDto>> {
    state
        .store
        .list()
        .await
        .map(|profiles| profiles.into_iter().map(ProfileDto::from).collect::<Vec<_>>())
        .into()
}

/// Creates or replaces a profile and returns its id.
pub async fn save_profile(
    state: Arc<AppState>,
    name: String,
    settings: SettingMap,
) -> CommandResult<String> {
    state.store.save(&name, settings).await.into()
}

/// Returns a profile's settings and makes it current.
pub async fn load_profile(state: Arc<AppState>, name: String) -> CommandResult<SettingMap> {
    state.store.load(&name).await.into()
}

/// Returns a profile without activating it.
pub async fn get_profile(state: Arc<AppState>, name: String) -> CommandResult<ProfileDetailDto> {
    state
        .store
        .profile(&name)
        .await
        .map(|p| ProfileDetailDto {
            name,
            id: p.id,
            settings: p.settings,
        })
        .into()
}

/// Deletes a profile and forgets its overrides.
pub async fn delete_profile(state: Arc<AppState>, name: String) -> CommandResult<()> {
    match state.store.delete(&name).await {
        Ok(removed) => {
            state.overrides.forget_profile(&removed.id);
            CommandResult::ok(())
        }
        Err(e) => CommandResult::err(e.to_string()),
    }
}

pub async fn set_current_profile(state: Arc<AppState>, name: String) -> CommandResult<()> {
    state.store.set_current(&name).await.into()
}

pub async fn get_current_profile(state: Arc<AppState>) -> CommandResult<String> {
    state.store.current().await.into()
}

pub async fn has_profile(state: Arc<AppState>, name: String) -> CommandResult<bool> {
    state.store.has_config(&name).await.into()
}

pub async fn set_mode_binding(
    state: Arc<AppState>,
    mode: String,
    profile_id: String,
) -> CommandResult<()> {
    state.store.set_mode_binding(&mode, &profile_id).await.into()
}

/// The profile id bound to `mode`, or `null`.
pub async fn get_mode_binding(state: Arc<AppState>, mode: String) -> CommandResult<Option<String>> {
    state.store.get_mode_binding(&mode).await.into()
}

pub async fn get_snapshot(state: Arc<AppState>) -> CommandResult<StoreSnapshot> {
    state.store.snapshot().await.into()
}

pub async fn export_document(state: Arc<AppState>) -> CommandResult<Document> {
    state.store.export().await.into()
}

pub async fn import_document(state: Arc<AppState>, document: Document) -> CommandResult<StoreSnapshot> {
    state.store.import(document).await.into()
}

/// Deletes every profile.  Overrides are dropped too since no profile id
/// survives a reset.
pub async fn reset_all(state: Arc<AppState>) -> CommandResult<()> {
    match state.store.reset_all().await {
        Ok(()) => {
            state.overrides.clear();
            CommandResult::ok(())
        }
        Err(e) => CommandResult::err(e.to_string()),
    }
}

// ── Override commands ─────────────────────────────────────────────────────────

/// The effective value of `setting` for `profile_id`, given the current
/// global value.
pub async fn resolve_setting(
    state: Arc<AppState>,
    profile_id: String,
    setting: String,
    global: Option<SettingValue>,
) -> CommandResult<Option<SettingValue>> {
    CommandResult::ok(
        state
            .overrides
            .resolve(&profile_id, &setting, global.as_ref()),
    )
}

pub async fn set_override(
    state: Arc<AppState>,
    profile_id: String,
    setting: String,
    value: SettingValue,
) -> CommandResult<()> {
    state.overrides.set_override(&profile_id, &setting, value);
    CommandResult::ok(())
}

/// Flips the override for the pair; returns the new overridden state.
pub async fn toggle_override(
    state: Arc<AppState>,
    profile_id: String,
    setting: String,
    current_global: Option<SettingValue>,
) -> CommandResult<bool> {
    CommandResult::ok(
        state
            .overrides
            .toggle(&profile_id, &setting, current_global.as_ref()),
    )
}

pub async fn is_overridden(
    state: Arc<AppState>,
    profile_id: String,
    setting: String,
) -> CommandResult<bool> {
    CommandResult::ok(state.overrides.is_overridden(&profile_id, &setting))
}

/// Settings currently overridden for `profile_id`, sorted by name.
pub async fn list_overridden_settings(
    state: Arc<AppState>,
    profile_id: String,
) -> CommandResult<Vec<String>> {
    CommandResult::ok(state.overrides.overridden_settings(&profile_id))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
