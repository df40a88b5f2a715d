//! Per-profile setting overrides.
//!
//! Some settings have a *global* value (shared by every profile) that an
//! individual profile may choose to diverge from.  For each
//! `(profile id, setting name)` pair the resolver keeps a [`SettingLayer`]:
//!
//! ```text
//!            toggle (seed with current global)
//! Inherited ─────────────────────────────────────► Overridden(value)
//!     ▲                                                   │
//!     └─────────────────── toggle (discard value) ────────┘
//! ```
//!
//! Toggling on copies the current global value into the override, so the
//! value shown to the user does not jump at the moment of toggling.  Toggling
//! off throws the override away; it is not archived.
//!
//! The resolver is process-local session state.  It is not part of the
//! persisted document and is not guarded by the store's access gate.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::setting::SettingValue;

/// Which layer is authoritative for one `(profile, setting)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingLayer {
    /// The setting follows the global value.
    ///
    /// `staged` holds a value passed to [`OverrideResolver::set_override`]
    /// while the pair was not overridden.  It has no effect on resolution and
    /// is replaced by the global value when the pair is toggled on.
    Inherited { staged: Option<SettingValue> },

    /// The setting diverges from the global value.
    ///
    /// `None` means no override value has been recorded yet (the global value
    /// was unset when toggled on); resolution then falls back to the global.
    Overridden(Option<SettingValue>),
}

type Key = (String, String);

/// Process-wide store of override layers, keyed by `(profile id, setting)`.
///
/// Absent entries behave as `Inherited { staged: None }`.
#[derive(Debug, Default)]
pub struct OverrideResolver {
    layers: RwLock<HashMap<Key, SettingLayer>>,
}

impl OverrideResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Key, SettingLayer>> {
        // A panic while holding the lock cannot leave the map half-updated:
        // every write below is a single insert/remove.
        self.layers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Key, SettingLayer>> {
        self.layers.write().unwrap_or_else(|e| e.into_inner())
    }

    fn key(profile_id: &str, setting: &str) -> Key {
        (profile_id.to_string(), setting.to_string())
    }

    /// Returns the effective value of `setting` for `profile_id`.
    ///
    /// The override value wins when the pair is overridden and a value is
    /// recorded; otherwise `global` is returned.
    pub fn resolve(
        &self,
        profile_id: &str,
        setting: &str,
        global: Option<&SettingValue>,
    ) -> Option<SettingValue> {
        match self.read().get(&Self::key(profile_id, setting)) {
            Some(SettingLayer::Overridden(Some(value))) => Some(value.clone()),
            _ => global.cloned(),
        }
    }

    /// Records an override value for the pair.
    ///
    /// When the pair is overridden the value takes effect immediately.  When
    /// it is inherited the value is only staged and has no resolution effect
    /// until the pair is toggled on (which re-seeds from the global value).
    pub fn set_override(&self, profile_id: &str, setting: &str, value: SettingValue) {
        let mut layers = self.write();
        let layer = layers
            .entry(Self::key(profile_id, setting))
            .or_insert(SettingLayer::Inherited { staged: None });
        match layer {
            SettingLayer::Overridden(current) => *current = Some(value),
            SettingLayer::Inherited { staged } => {
                debug!(profile_id, setting, "override staged while inheriting");
                *staged = Some(value);
            }
        }
    }

    /// Flips the pair between inherited and overridden.
    ///
    /// Turning the override on seeds it with `current_global`; turning it off
    /// discards the stored override.  Returns the new overridden state.
    pub fn toggle(
        &self,
        profile_id: &str,
        setting: &str,
        current_global: Option<&SettingValue>,
    ) -> bool {
        let key = Self::key(profile_id, setting);
        let mut layers = self.write();
        match layers.get(&key) {
            Some(SettingLayer::Overridden(_)) => {
                layers.remove(&key);
                debug!(profile_id, setting, "override cleared");
                false
            }
            _ => {
                layers.insert(key, SettingLayer::Overridden(current_global.cloned()));
                debug!(profile_id, setting, "override enabled");
                true
            }
        }
    }

    /// Returns `true` if the pair currently diverges from the global value.
    pub fn is_overridden(&self, profile_id: &str, setting: &str) -> bool {
        matches!(
            self.read().get(&Self::key(profile_id, setting)),
            Some(SettingLayer::Overridden(_))
        )
    }

    /// Names of the settings overridden for `profile_id`, sorted.
    pub fn overridden_settings(&self, profile_id: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .read()
            .iter()
            .filter(|((pid, _), layer)| {
                pid == profile_id && matches!(layer, SettingLayer::Overridden(_))
            })
            .map(|((_, setting), _)| setting.clone())
            .collect();
        names.sort();
        names
    }

    /// Drops every entry belonging to `profile_id`.
    ///
    /// Called when a profile is deleted so a later profile can never pick up
    /// stale overrides.
    pub fn forget_profile(&self, profile_id: &str) {
        self.write().retain(|(pid, _), _| pid != profile_id);
    }

    /// Drops every entry for every profile.
    pub fn clear(&self) {
        self.write().clear();
    }
}
