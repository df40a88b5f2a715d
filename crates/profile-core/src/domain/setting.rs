//! Typed setting values.
//!
//! Profiles store an open set of setting *names* but a closed set of value
//! *kinds*.  Keeping the kinds closed gives callers exhaustive `match`es and
//! keeps the persisted JSON in its natural shape:
//!
//! ```json
//! {
//!   "provider": "anthropic",
//!   "rateLimitSeconds": 10,
//!   "fuzzyMatchThreshold": 0.9,
//!   "diffEnabled": true,
//!   "allowedCommands": ["git", "ls"]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Setting values of one profile, keyed by setting name.
pub type SettingMap = BTreeMap<String, SettingValue>;

/// Well-known setting keys the store itself reads or writes.
pub mod keys {
    /// Identifies the backend a profile talks to; surfaced as `providerTag`.
    pub const PROVIDER: &str = "provider";

    /// Minimum seconds between requests.  Moved from a global setting into
    /// every profile by the rate-limit inheritance migration.
    pub const RATE_LIMIT_SECONDS: &str = "rateLimitSeconds";

    /// Whether diff-based editing is enabled.
    pub const DIFF_ENABLED: &str = "diffEnabled";

    /// Similarity threshold (0.0–1.0) for fuzzy diff matching.
    pub const FUZZY_MATCH_THRESHOLD: &str = "fuzzyMatchThreshold";
}

/// A single typed setting value.
///
/// Serialized untagged, so a value round-trips through JSON or TOML as a
/// plain boolean, number, string, or array of strings.  Variant order matters
/// for deserialization: integers are tried before floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    TextSet(BTreeSet<String>),
}

impl SettingValue {
    /// Parses a value typed by a user on the command line.
    ///
    /// Tries, in order: `true`/`false`, an integer, a float, a bracketed
    /// comma-separated list (`[a,b]`), and finally falls back to plain text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed {
            "true" => return SettingValue::Bool(true),
            "false" => return SettingValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return SettingValue::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return SettingValue::Float(f);
            }
        }
        if let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            let set = inner
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            return SettingValue::TextSet(set);
        }
        SettingValue::Text(raw.to_string())
    }

    /// Returns the string payload of a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short lowercase name of the value kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "bool",
            SettingValue::Integer(_) => "integer",
            SettingValue::Float(_) => "float",
            SettingValue::Text(_) => "text",
            SettingValue::TextSet(_) => "text-set",
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{b}"),
            SettingValue::Integer(i) => write!(f, "{i}"),
            SettingValue::Float(x) => write!(f, "{x}"),
            SettingValue::Text(s) => f.write_str(s),
            SettingValue::TextSet(set) => {
                let joined: Vec<&str> = set.iter().map(String::as_str).collect();
                write!(f, "[{}]", joined.join(","))
            }
        }
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        SettingValue::Bool(b)
    }
}

impl From<i64> for SettingValue {
    fn from(i: i64) -> Self {
        SettingValue::Integer(i)
    }
}

impl From<f64> for SettingValue {
    fn from(x: f64) -> Self {
        SettingValue::Float(x)
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::Text(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::Text(s)
    }
}
