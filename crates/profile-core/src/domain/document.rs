//! The persisted configuration document.
//!
//! A [`Document`] is the single root that the store reads and writes as one
//! blob.  It owns every [`Profile`], the pointer to the current profile, the
//! mode → profile-id bindings, and the set of migrations already applied.
//!
//! # Invariants
//!
//! - `profiles` is never empty and no key is the empty string.
//! - `current_profile_name` always names an entry in `profiles`.
//! - After migration every profile has a non-empty, unique `id`.  An id is
//!   generated once when the profile is created and never regenerated.
//!
//! Mode bindings are *not* validated against `profiles`: a binding may point
//! at an id that no longer exists and is left as-is.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::setting::{keys, SettingMap, SettingValue};
use crate::migration::MIGRATIONS;

/// Name of the profile created for a brand-new document.
pub const DEFAULT_PROFILE_NAME: &str = "default";

/// Errors raised by document-level integrity checks.
#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    /// The referenced profile name does not exist.
    #[error("profile not found: {0}")]
    NotFound(String),

    /// Removing the profile would leave the document without profiles.
    #[error("cannot delete the last remaining profile")]
    LastProfile,

    /// Profile names must be non-empty.
    #[error("profile name must not be empty")]
    EmptyName,

    /// The document contains no profiles at all.
    #[error("document contains no profiles")]
    NoProfiles,
}

/// One named bundle of setting values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Profile {
    /// Stable identifier, independent of the (mutable) name key.
    ///
    /// Defaults to empty so that documents written before ids existed still
    /// parse; the migration engine fills it in.
    #[serde(default)]
    pub id: String,

    /// Arbitrary typed settings (provider, thresholds, ...).
    #[serde(rename = "settingValues", default)]
    pub settings: SettingMap,
}

impl Profile {
    /// The provider tag shown in profile pickers, if the profile has one.
    pub fn provider_tag(&self) -> Option<&str> {
        self.settings.get(keys::PROVIDER).and_then(SettingValue::as_text)
    }
}

/// Lightweight projection of a profile for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_tag: Option<String>,
}

/// The single persisted root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub current_profile_name: String,
    pub profiles: BTreeMap<String, Profile>,
    #[serde(default)]
    pub mode_bindings: BTreeMap<String, String>,
    #[serde(default)]
    pub migration_flags: BTreeMap<String, bool>,
}

impl Document {
    /// Creates the document used on first access: one `"default"` profile
    /// with a fresh id.
    ///
    /// A fresh document is already at the current schema, so every known
    /// migration is pre-marked as applied.
    pub fn new_default() -> Self {
        let mut doc = Self {
            current_profile_name: DEFAULT_PROFILE_NAME.to_string(),
            profiles: BTreeMap::new(),
            mode_bindings: BTreeMap::new(),
            migration_flags: MIGRATIONS
                .iter()
                .map(|m| (m.name.to_string(), true))
                .collect(),
        };
        let id = doc.generate_id();
        doc.profiles.insert(
            DEFAULT_PROFILE_NAME.to_string(),
            Profile {
                id,
                settings: SettingMap::new(),
            },
        );
        doc
    }

    /// Checks the structural invariants that cannot be repaired silently.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NoProfiles`] for an empty profile map and
    /// [`DocumentError::EmptyName`] if any profile key is empty.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.profiles.is_empty() {
            return Err(DocumentError::NoProfiles);
        }
        if self.profiles.contains_key("") {
            return Err(DocumentError::EmptyName);
        }
        Ok(())
    }

    /// Repoints `current_profile_name` at the first profile (by name) when it
    /// does not reference an existing profile.
    ///
    /// Returns `true` if the pointer was changed.
    pub fn repair_current(&mut self) -> bool {
        if self.profiles.contains_key(&self.current_profile_name) {
            return false;
        }
        match self.profiles.keys().next() {
            Some(first) => {
                self.current_profile_name = first.clone();
                true
            }
            None => false,
        }
    }

    /// Generates a profile id that is not used by any existing profile.
    pub fn generate_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.profiles.values().any(|p| p.id == id) {
                return id;
            }
        }
    }

    /// Gives every profile a non-empty id no other profile uses.
    ///
    /// Profiles are visited in name order: the first holder of an id keeps
    /// it, later duplicates and empty ids get a fresh one.  Returns the
    /// number of profiles that received a new id.
    pub fn assign_unique_ids(&mut self) -> usize {
        let reassign: Vec<String> = {
            let mut seen = HashSet::new();
            self.profiles
                .iter()
                .filter(|(_, p)| p.id.is_empty() || !seen.insert(p.id.as_str()))
                .map(|(name, _)| name.clone())
                .collect()
        };
        for name in &reassign {
            let id = self.generate_id();
            if let Some(profile) = self.profiles.get_mut(name) {
                profile.id = id;
            }
        }
        reassign.len()
    }

    /// Returns `true` if a profile with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Returns the profile with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`] when no such profile exists.
    pub fn profile(&self, name: &str) -> Result<&Profile, DocumentError> {
        self.profiles
            .get(name)
            .ok_or_else(|| DocumentError::NotFound(name.to_string()))
    }

    /// Finds a profile by its stable id, returning `(name, profile)`.
    pub fn profile_by_id(&self, id: &str) -> Option<(&str, &Profile)> {
        self.profiles
            .iter()
            .find(|(_, p)| p.id == id)
            .map(|(name, p)| (name.as_str(), p))
    }

    /// Projects every profile to `{name, id, providerTag}`, ordered by name.
    pub fn summaries(&self) -> Vec<ProfileSummary> {
        self.profiles
            .iter()
            .map(|(name, p)| ProfileSummary {
                name: name.clone(),
                id: p.id.clone(),
                provider_tag: p.provider_tag().map(str::to_string),
            })
            .collect()
    }

    /// Inserts or replaces the settings of `name`.
    ///
    /// An existing profile keeps its id; a new profile gets a fresh one.
    /// Returns the id and whether the profile was newly created.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::EmptyName`] for an empty name.
    pub fn upsert_profile(
        &mut self,
        name: &str,
        settings: SettingMap,
    ) -> Result<(String, bool), DocumentError> {
        if name.is_empty() {
            return Err(DocumentError::EmptyName);
        }
        let existing_id = self
            .profiles
            .get(name)
            .map(|p| p.id.clone())
            .filter(|id| !id.is_empty());
        let created = !self.profiles.contains_key(name);
        let id = existing_id.unwrap_or_else(|| self.generate_id());
        self.profiles.insert(
            name.to_string(),
            Profile {
                id: id.clone(),
                settings,
            },
        );
        Ok((id, created))
    }

    /// Removes the profile `name`.
    ///
    /// If the removed profile was current, the first remaining profile (by
    /// name) becomes current.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`] if `name` is absent and
    /// [`DocumentError::LastProfile`] if it is the only profile left.  The
    /// document is unchanged on error.
    pub fn remove_profile(&mut self, name: &str) -> Result<Profile, DocumentError> {
        if !self.profiles.contains_key(name) {
            return Err(DocumentError::NotFound(name.to_string()));
        }
        if self.profiles.len() == 1 {
            return Err(DocumentError::LastProfile);
        }
        let removed = self
            .profiles
            .remove(name)
            .ok_or_else(|| DocumentError::NotFound(name.to_string()))?;
        self.repair_current();
        Ok(removed)
    }

    /// Makes `name` the current profile.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`] if `name` is absent.
    pub fn set_current(&mut self, name: &str) -> Result<(), DocumentError> {
        if !self.profiles.contains_key(name) {
            return Err(DocumentError::NotFound(name.to_string()));
        }
        self.current_profile_name = name.to_string();
        Ok(())
    }

    /// Returns `true` once the named migration has been recorded as applied.
    pub fn is_migration_applied(&self, name: &str) -> bool {
        self.migration_flags.get(name).copied().unwrap_or(false)
    }

    /// Records the named migration as applied.
    pub fn mark_migration_applied(&mut self, name: &str) {
        self.migration_flags.insert(name.to_string(), true);
    }

    /// Looks for a value of `key` already set on some profile.
    ///
    /// `preferred` is consulted first; after that profiles are scanned in
    /// name order, so the lexicographically smallest name wins ties.
    pub fn existing_value(&self, key: &str, preferred: Option<&str>) -> Option<SettingValue> {
        if let Some(value) = preferred
            .and_then(|name| self.profiles.get(name))
            .and_then(|p| p.settings.get(key))
        {
            return Some(value.clone());
        }
        self.profiles
            .values()
            .find_map(|p| p.settings.get(key))
            .cloned()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new_default()
    }
}
