//! File layers
//!
//! Two TOML shapes are supported:
//! - Installation file: `[section] option = value`, mapped through fields
//! - Settings file: top-level UPPERCASE keys are settings (project defaults,
//!   local overrides)
//!
//! Every file is fingerprinted with the SHA-256 digest of its raw bytes.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use settings_core::{Layer, RawValue};
use tracing::{debug, warn};

use super::fields::{ConfigField, FieldError};

/// File loading errors
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value in {path}: {source}")]
    Field {
        path: PathBuf,
        #[source]
        source: FieldError,
    },
}

/// A layer read from disk, with its provenance
#[derive(Debug, Clone)]
pub struct FileLayer {
    pub layer: Layer,
    pub path: PathBuf,
    /// SHA-256 of the raw file bytes (hex)
    pub digest: String,
}

/// Load an installation file, mapping `[section] option` through `fields`
pub fn load_installation_file(
    path: &Path,
    name: &str,
    priority: i32,
    fields: &[ConfigField],
) -> Result<FileLayer, FileError> {
    let (table, digest) = read_toml(path)?;
    let mut layer = Layer::new(name, priority);
    let mut known = 0usize;

    for field in fields {
        let Some((section, option)) = field.section_option() else {
            continue;
        };
        let Some(value) = table
            .get(section)
            .and_then(|s| s.as_object())
            .and_then(|s| s.get(option))
        else {
            continue;
        };
        let raw = field.from_value(value.clone()).map_err(|source| FileError::Field {
            path: path.to_path_buf(),
            source,
        })?;
        layer.insert(field.setting_name.as_str(), raw);
        known += 1;
    }

    for (section, options) in &table {
        match options.as_object() {
            Some(options) => {
                for option in options.keys() {
                    let full = format!("{}.{}", section, option);
                    if !fields.iter().any(|f| f.name.as_deref() == Some(full.as_str())) {
                        warn!(file = %path.display(), option = %full, "unknown option ignored");
                    }
                }
            }
            None => {
                warn!(file = %path.display(), key = %section, "value outside of a section ignored");
            }
        }
    }

    debug!(file = %path.display(), options = known, "loaded installation file");
    Ok(FileLayer {
        layer,
        path: path.to_path_buf(),
        digest,
    })
}

/// Load a settings file where top-level UPPERCASE keys are settings
pub fn load_settings_file(path: &Path, name: &str, priority: i32) -> Result<FileLayer, FileError> {
    let (table, digest) = read_toml(path)?;
    let mut layer = Layer::new(name, priority);

    for (key, value) in table {
        if is_setting_name(&key) {
            layer.insert(key, RawValue::from_json(value));
        } else {
            warn!(file = %path.display(), key = %key, "non-uppercase key ignored");
        }
    }

    debug!(file = %path.display(), settings = layer.len(), "loaded settings file");
    Ok(FileLayer {
        layer,
        path: path.to_path_buf(),
        digest,
    })
}

/// Setting names are UPPERCASE identifiers
pub fn is_setting_name(key: &str) -> bool {
    settings_core::template::is_valid_name(key) && key == key.to_ascii_uppercase()
}

/// Read and parse a TOML file, returning its top-level table and digest
fn read_toml(path: &Path) -> Result<(serde_json::Map<String, Value>, String), FileError> {
    let bytes = fs::read(path).map_err(|source| FileError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hex::encode(hasher.finalize());

    let contents = String::from_utf8(bytes).map_err(|e| FileError::Parse {
        path: path.to_path_buf(),
        message: format!("Invalid UTF-8: {}", e),
    })?;

    let toml_value: toml::Value = toml::from_str(&contents).map_err(|e| FileError::Parse {
        path: path.to_path_buf(),
        message: format!("TOML parse error: {}", e),
    })?;

    match toml_to_json(toml_value) {
        Value::Object(map) => Ok((map, digest)),
        _ => Err(FileError::Parse {
            path: path.to_path_buf(),
            message: "top level is not a table".to_string(),
        }),
    }
}

/// Convert TOML Value to JSON Value
pub fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            Value::Object(map)
        }
    }
}

/// Convert JSON back to TOML; nulls have no TOML form and are dropped
pub fn json_to_toml(value: &Value) -> Option<toml::Value> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(toml::Value::Boolean(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(toml::Value::Integer)
            .or_else(|| n.as_f64().map(toml::Value::Float)),
        Value::String(s) => Some(toml::Value::String(s.clone())),
        Value::Array(items) => Some(toml::Value::Array(
            items.iter().filter_map(json_to_toml).collect(),
        )),
        Value::Object(map) => Some(toml::Value::Table(
            map.iter()
                .filter_map(|(k, v)| json_to_toml(v).map(|v| (k.clone(), v)))
                .collect(),
        )),
    }
}
