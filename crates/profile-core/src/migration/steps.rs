//! Concrete migration steps.
//!
//! Both steps move a setting that used to be global into every profile.  They
//! never overwrite a value a profile already has, so re-running a step (for
//! example after a crash before its flag was written) is harmless.
//!
//! A legacy value a step cannot use is treated as absent: the step logs it
//! and falls back to the default.

use tracing::{info, warn};

use super::{LegacySnapshot, Migration, MigrationError};
use crate::domain::document::Document;
use crate::domain::setting::{keys, SettingValue};

/// Rate limit used when the legacy store has no value.
pub const DEFAULT_RATE_LIMIT_SECONDS: i64 = 5;

/// Diff editing is on unless the legacy store says otherwise.
pub const DEFAULT_DIFF_ENABLED: bool = true;

/// Exact matching unless the legacy store says otherwise.
pub const DEFAULT_FUZZY_MATCH_THRESHOLD: f64 = 1.0;

pub const RATE_LIMIT_INHERITANCE: Migration = Migration {
    name: "rateLimitSecondsMigrated",
    description: "copy the global rate limit into every profile",
    legacy_keys: &[keys::RATE_LIMIT_SECONDS],
    apply: inherit_rate_limit,
};

pub const DIFF_SETTINGS_INHERITANCE: Migration = Migration {
    name: "diffSettingsMigrated",
    description: "copy the global diff settings into every profile",
    legacy_keys: &[keys::DIFF_ENABLED, keys::FUZZY_MATCH_THRESHOLD],
    apply: inherit_diff_settings,
};

/// Returns the normalised legacy value of `key`, or `default` when the
/// legacy store has none or holds something `normalise` rejects.
fn legacy_or_default(
    legacy: &LegacySnapshot,
    key: &str,
    default: SettingValue,
    normalise: fn(&SettingValue) -> Option<SettingValue>,
) -> SettingValue {
    match legacy.get(key) {
        None => default,
        Some(value) => normalise(value).unwrap_or_else(|| {
            warn!(
                key,
                kind = value.kind(),
                %value,
                %default,
                "ignoring unusable legacy value, using default"
            );
            default
        }),
    }
}

/// A non-negative whole number of seconds.  Floats are rounded.
fn rate_limit_seconds(value: &SettingValue) -> Option<SettingValue> {
    match value {
        SettingValue::Integer(i) if *i >= 0 => Some(SettingValue::Integer(*i)),
        SettingValue::Float(f) if f.is_finite() && *f >= 0.0 => {
            Some(SettingValue::Integer(f.round() as i64))
        }
        _ => None,
    }
}

fn diff_enabled(value: &SettingValue) -> Option<SettingValue> {
    match value {
        SettingValue::Bool(b) => Some(SettingValue::Bool(*b)),
        _ => None,
    }
}

/// A threshold in `0.0..=1.0`.
fn fuzzy_threshold(value: &SettingValue) -> Option<SettingValue> {
    match value {
        SettingValue::Float(f) if (0.0..=1.0).contains(f) => Some(SettingValue::Float(*f)),
        SettingValue::Integer(i) if (0..=1).contains(i) => Some(SettingValue::Float(*i as f64)),
        _ => None,
    }
}

/// The legacy rate limit normalised to whole seconds, or
/// [`DEFAULT_RATE_LIMIT_SECONDS`] when it is absent or unusable (negative or
/// non-numeric).
pub fn legacy_rate_limit(legacy: &LegacySnapshot) -> SettingValue {
    legacy_or_default(
        legacy,
        keys::RATE_LIMIT_SECONDS,
        SettingValue::Integer(DEFAULT_RATE_LIMIT_SECONDS),
        rate_limit_seconds,
    )
}

/// Writes `value` under `key` into every profile that lacks it.
///
/// Returns the number of profiles changed.
fn fill_missing(doc: &mut Document, key: &str, value: &SettingValue) -> usize {
    let mut filled = 0;
    for profile in doc.profiles.values_mut() {
        if !profile.settings.contains_key(key) {
            profile.settings.insert(key.to_string(), value.clone());
            filled += 1;
        }
    }
    filled
}

fn inherit_rate_limit(doc: &mut Document, legacy: &LegacySnapshot) -> Result<bool, MigrationError> {
    doc.validate()?;
    if legacy.get(keys::RATE_LIMIT_SECONDS).is_none() {
        warn!(
            default = DEFAULT_RATE_LIMIT_SECONDS,
            "no legacy rate limit found, using default"
        );
    }
    let value = legacy_rate_limit(legacy);
    let filled = fill_missing(doc, keys::RATE_LIMIT_SECONDS, &value);
    info!(profiles = filled, value = %value, "rate limit copied into profiles");
    Ok(filled > 0)
}

fn inherit_diff_settings(
    doc: &mut Document,
    legacy: &LegacySnapshot,
) -> Result<bool, MigrationError> {
    doc.validate()?;

    let enabled = legacy_or_default(
        legacy,
        keys::DIFF_ENABLED,
        SettingValue::Bool(DEFAULT_DIFF_ENABLED),
        diff_enabled,
    );
    let threshold = legacy_or_default(
        legacy,
        keys::FUZZY_MATCH_THRESHOLD,
        SettingValue::Float(DEFAULT_FUZZY_MATCH_THRESHOLD),
        fuzzy_threshold,
    );

    let filled = fill_missing(doc, keys::DIFF_ENABLED, &enabled)
        + fill_missing(doc, keys::FUZZY_MATCH_THRESHOLD, &threshold);
    info!(entries = filled, "diff settings copied into profiles");
    Ok(filled > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::Profile;
    use crate::domain::setting::SettingMap;

    /// Two profiles without any inherited keys and no migration flags.
    fn legacy_document() -> Document {
        let mut doc = Document::new_default();
        doc.migration_flags.clear();
        doc.profiles.clear();
        doc.profiles.insert("a".to_string(), Profile::default());
        doc.profiles.insert("b".to_string(), Profile::default());
        doc.current_profile_name = "a".to_string();
        doc
    }

    fn snapshot(pairs: &[(&str, SettingValue)]) -> LegacySnapshot {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    // ── Rate-limit inheritance ────────────────────────────────────────────────

    #[test]
    fn test_rate_limit_uses_legacy_value_for_every_profile() {
        // Arrange
        let mut doc = legacy_document();
        let legacy = snapshot(&[(keys::RATE_LIMIT_SECONDS, SettingValue::Integer(10))]);

        // Act
        let changed = (RATE_LIMIT_INHERITANCE.apply)(&mut doc, &legacy).unwrap();

        // Assert
        assert!(changed);
        for name in ["a", "b"] {
            assert_eq!(
                doc.profiles[name].settings[keys::RATE_LIMIT_SECONDS],
                SettingValue::Integer(10)
            );
        }
    }

    #[test]
    fn test_rate_limit_defaults_to_five_without_legacy_value() {
        let mut doc = legacy_document();
        (RATE_LIMIT_INHERITANCE.apply)(&mut doc, &LegacySnapshot::new()).unwrap();
        for name in ["a", "b"] {
            assert_eq!(
                doc.profiles[name].settings[keys::RATE_LIMIT_SECONDS],
                SettingValue::Integer(DEFAULT_RATE_LIMIT_SECONDS)
            );
        }
    }

    #[test]
    fn test_rate_limit_never_overwrites_existing_value() {
        // Arrange
        let mut doc = legacy_document();
        let mut settings = SettingMap::new();
        settings.insert(keys::RATE_LIMIT_SECONDS.to_string(), SettingValue::Integer(2));
        doc.profiles.get_mut("a").unwrap().settings = settings;
        let legacy = snapshot(&[(keys::RATE_LIMIT_SECONDS, SettingValue::Integer(10))]);

        // Act
        (RATE_LIMIT_INHERITANCE.apply)(&mut doc, &legacy).unwrap();

        // Assert
        assert_eq!(
            doc.profiles["a"].settings[keys::RATE_LIMIT_SECONDS],
            SettingValue::Integer(2)
        );
        assert_eq!(
            doc.profiles["b"].settings[keys::RATE_LIMIT_SECONDS],
            SettingValue::Integer(10)
        );
    }

    #[test]
    fn test_rate_limit_second_run_reports_no_change() {
        let mut doc = legacy_document();
        (RATE_LIMIT_INHERITANCE.apply)(&mut doc, &LegacySnapshot::new()).unwrap();
        let after_first = doc.clone();

        let changed = (RATE_LIMIT_INHERITANCE.apply)(&mut doc, &LegacySnapshot::new()).unwrap();

        assert!(!changed);
        assert_eq!(doc, after_first);
    }

    #[test]
    fn test_legacy_rate_limit_rounds_floats() {
        let legacy = snapshot(&[(keys::RATE_LIMIT_SECONDS, SettingValue::Float(2.6))]);
        assert_eq!(legacy_rate_limit(&legacy), SettingValue::Integer(3));
    }

    #[test]
    fn test_legacy_rate_limit_ignores_negative_and_text() {
        let default = SettingValue::Integer(DEFAULT_RATE_LIMIT_SECONDS);

        let negative = snapshot(&[(keys::RATE_LIMIT_SECONDS, SettingValue::Integer(-1))]);
        assert_eq!(legacy_rate_limit(&negative), default);

        let text = snapshot(&[(keys::RATE_LIMIT_SECONDS, SettingValue::from("soon"))]);
        assert_eq!(legacy_rate_limit(&text), default);
    }

    #[test]
    fn test_rate_limit_step_uses_default_for_unusable_legacy_value() {
        // Arrange
        let mut doc = legacy_document();
        let legacy = snapshot(&[(keys::RATE_LIMIT_SECONDS, SettingValue::from("fast"))]);

        // Act
        let changed = (RATE_LIMIT_INHERITANCE.apply)(&mut doc, &legacy).unwrap();

        // Assert
        assert!(changed);
        for name in ["a", "b"] {
            assert_eq!(
                doc.profiles[name].settings[keys::RATE_LIMIT_SECONDS],
                SettingValue::Integer(DEFAULT_RATE_LIMIT_SECONDS)
            );
        }
    }

    #[test]
    fn test_rate_limit_rejects_document_without_profiles() {
        let mut doc = legacy_document();
        doc.profiles.clear();
        let result = (RATE_LIMIT_INHERITANCE.apply)(&mut doc, &LegacySnapshot::new());
        assert!(matches!(result, Err(MigrationError::InvalidDocument(_))));
    }

    // ── Diff-settings inheritance ─────────────────────────────────────────────

    #[test]
    fn test_diff_settings_use_defaults_without_legacy_values() {
        let mut doc = legacy_document();
        (DIFF_SETTINGS_INHERITANCE.apply)(&mut doc, &LegacySnapshot::new()).unwrap();
        let settings = &doc.profiles["b"].settings;
        assert_eq!(settings[keys::DIFF_ENABLED], SettingValue::Bool(true));
        assert_eq!(settings[keys::FUZZY_MATCH_THRESHOLD], SettingValue::Float(1.0));
    }

    #[test]
    fn test_diff_settings_copy_legacy_values() {
        // Arrange
        let mut doc = legacy_document();
        let legacy = snapshot(&[
            (keys::DIFF_ENABLED, SettingValue::Bool(false)),
            (keys::FUZZY_MATCH_THRESHOLD, SettingValue::Float(0.8)),
        ]);

        // Act
        let changed = (DIFF_SETTINGS_INHERITANCE.apply)(&mut doc, &legacy).unwrap();

        // Assert
        assert!(changed);
        let settings = &doc.profiles["a"].settings;
        assert_eq!(settings[keys::DIFF_ENABLED], SettingValue::Bool(false));
        assert_eq!(settings[keys::FUZZY_MATCH_THRESHOLD], SettingValue::Float(0.8));
    }

    #[test]
    fn test_diff_settings_replace_unusable_legacy_values_with_defaults() {
        // Arrange: threshold out of range, flag of the wrong kind
        let mut doc = legacy_document();
        let legacy = snapshot(&[
            (keys::DIFF_ENABLED, SettingValue::from("yes")),
            (keys::FUZZY_MATCH_THRESHOLD, SettingValue::Float(1.5)),
        ]);

        // Act
        (DIFF_SETTINGS_INHERITANCE.apply)(&mut doc, &legacy).unwrap();

        // Assert
        let settings = &doc.profiles["a"].settings;
        assert_eq!(settings[keys::DIFF_ENABLED], SettingValue::Bool(DEFAULT_DIFF_ENABLED));
        assert_eq!(
            settings[keys::FUZZY_MATCH_THRESHOLD],
            SettingValue::Float(DEFAULT_FUZZY_MATCH_THRESHOLD)
        );
    }
}
