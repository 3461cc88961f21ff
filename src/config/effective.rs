//! Effective settings with full provenance
//!
//! The effective snapshot captures the resolved settings plus information
//! about where each value came from. Secrets are redacted before the
//! snapshot is serialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use settings_core::ResolvedSettings;

/// Schema version for the effective snapshot
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "layered-settings/effective@1";

/// Replacement text for redacted values
pub const REDACTED: &str = "[REDACTED]";

/// Origin of a settings layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SettingsOrigin {
    Builtin,
    Project,
    Installation,
    Environment,
    Local,
    Custom,
}

/// A contributing layer with provenance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettingsSource {
    /// Origin of this source
    pub origin: SettingsOrigin,

    /// Layer name
    pub name: String,

    pub priority: i32,

    /// File path (None for builtin/environment)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// SHA-256 digest of raw file bytes (None for builtin/environment)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl SettingsSource {
    pub fn new(origin: SettingsOrigin, name: &str, priority: i32) -> Self {
        Self {
            origin,
            name: name.to_string(),
            priority,
            path: None,
            digest: None,
        }
    }

    pub fn with_file(mut self, path: &Path, digest: String) -> Self {
        self.path = Some(path.to_path_buf());
        self.digest = Some(digest);
        self
    }
}

/// Effective settings with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveSettings {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When this snapshot was computed
    pub created_at: DateTime<Utc>,

    /// The resolved settings object
    pub settings: Value,

    /// Contributing sources in precedence order (lowest first)
    pub sources: Vec<SettingsSource>,

    /// Setting name -> name of the layer that won the merge
    pub provenance: BTreeMap<String, String>,

    /// Redacted key paths
    pub redactions: Vec<String>,
}

/// Keys that contain secrets and should be redacted
const SECRET_KEYS: &[&str] = &[
    "password",
    "token",
    "secret",
    "private_key",
    "api_key",
    "credential",
];

/// True if a key name looks like it holds a secret
pub fn is_secret_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    SECRET_KEYS.iter().any(|s| key_lower.contains(s))
}

impl EffectiveSettings {
    /// Build a snapshot; `redact` replaces secret values with `[REDACTED]`
    pub fn build(
        resolved: &ResolvedSettings,
        sources: Vec<SettingsSource>,
        provenance: BTreeMap<String, String>,
        redact: bool,
    ) -> Self {
        let mut settings = resolved.to_value();
        let redactions = if redact {
            redact_secrets(&mut settings)
        } else {
            Vec::new()
        };

        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            settings,
            sources,
            provenance,
            redactions,
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            )
        })?;
        fs::write(path, json)
    }

    /// Get a value by path (dot-separated, e.g. `DATABASES.default.NAME`)
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.settings;
        for part in path.split('.') {
            current = match current {
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    /// Source that provided `key`
    pub fn source_of(&self, key: &str) -> Option<&SettingsSource> {
        let layer = self.provenance.get(key)?;
        self.sources.iter().find(|s| &s.name == layer)
    }
}

/// Redact secrets in place, returning the list of redacted paths
pub fn redact_secrets(value: &mut Value) -> Vec<String> {
    let mut redactions = Vec::new();
    redact_recursive(value, String::new(), &mut redactions);
    redactions
}

fn redact_recursive(value: &mut Value, path: String, redactions: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let current_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };

                // null secrets reveal nothing
                if is_secret_key(key) && !val.is_object() && !val.is_array() {
                    if !val.is_null() {
                        *val = Value::String(REDACTED.to_string());
                        redactions.push(current_path);
                    }
                } else {
                    redact_recursive(val, current_path, redactions);
                }
            }
        }
        Value::Array(arr) => {
            for (i, val) in arr.iter_mut().enumerate() {
                let current_path = format!("{}[{}]", path, i);
                redact_recursive(val, current_path, redactions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use settings_core::{resolve_all, Layer, LayerStore, RawValue};
    use tempfile::TempDir;

    fn resolved() -> ResolvedSettings {
        let mut store = LayerStore::new();
        store
            .push(
                Layer::new("builtin", 0)
                    .with("SECRET_KEY", "s3cr3t")
                    .with("API_TOKEN", RawValue::null())
                    .with("DEBUG", false)
                    .with(
                        "DATABASES",
                        RawValue::from_json(json!({
                            "default": {"NAME": "app", "PASSWORD": "hunter2"}
                        })),
                    ),
            )
            .unwrap();
        resolve_all(&store.merge()).unwrap()
    }

    fn provenance() -> BTreeMap<String, String> {
        ["SECRET_KEY", "API_TOKEN", "DEBUG", "DATABASES"]
            .iter()
            .map(|k| (k.to_string(), "builtin".to_string()))
            .collect()
    }

    fn sources() -> Vec<SettingsSource> {
        vec![SettingsSource::new(SettingsOrigin::Builtin, "builtin", 0)]
    }

    #[test]
    fn test_secret_redaction() {
        let snapshot = EffectiveSettings::build(&resolved(), sources(), provenance(), true);

        assert_eq!(snapshot.get_str("SECRET_KEY"), Some(REDACTED));
        assert_eq!(snapshot.get_str("DATABASES.default.PASSWORD"), Some(REDACTED));
        assert_eq!(snapshot.get_str("DATABASES.default.NAME"), Some("app"));
        assert_eq!(snapshot.get("API_TOKEN"), Some(&Value::Null));
        assert_eq!(
            snapshot.redactions,
            vec!["DATABASES.default.PASSWORD".to_string(), "SECRET_KEY".to_string()]
        );
    }

    #[test]
    fn test_reveal_keeps_secrets() {
        let snapshot = EffectiveSettings::build(&resolved(), sources(), provenance(), false);
        assert_eq!(snapshot.get_str("SECRET_KEY"), Some("s3cr3t"));
        assert!(snapshot.redactions.is_empty());
    }

    #[test]
    fn test_is_secret_key() {
        assert!(is_secret_key("DATABASE_PASSWORD"));
        assert!(is_secret_key("Stripe_Api_Key"));
        assert!(!is_secret_key("DEBUG"));
    }

    #[test]
    fn test_source_of() {
        let snapshot = EffectiveSettings::build(&resolved(), sources(), provenance(), true);
        let source = snapshot.source_of("DEBUG").unwrap();
        assert_eq!(source.origin, SettingsOrigin::Builtin);
        assert!(snapshot.source_of("MISSING").is_none());
    }

    #[test]
    fn test_json_shape() {
        let snapshot = EffectiveSettings::build(&resolved(), sources(), provenance(), true);
        let json: Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(json["schema_version"], 1);
        assert_eq!(json["schema_id"], SCHEMA_ID);
        assert_eq!(json["sources"][0]["origin"], "builtin");
        assert!(json["sources"][0].get("path").is_none());
        assert_eq!(json["provenance"]["DEBUG"], "builtin");
    }

    #[test]
    fn test_write_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("effective.json");
        let snapshot = EffectiveSettings::build(&resolved(), sources(), provenance(), true);
        snapshot.write_to_file(&path).unwrap();

        let reloaded: EffectiveSettings =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reloaded.settings, snapshot.settings);
        assert_eq!(reloaded.sources, snapshot.sources);
    }
}
