//! Export of resolved settings
//!
//! - `json`: pretty-printed object
//! - `toml`: settings file that loads back to the same values
//! - `env`: `VAR='value'` lines for every field with an environment name
//! - `installation`: `[section] option = value` through the field mapping

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use settings_core::RAW_MARKER;

use super::fields::{ConfigField, FieldKind};
use super::file::json_to_toml;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Toml,
    Env,
    Installation,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            "env" => Ok(Self::Env),
            "installation" | "ini" => Ok(Self::Installation),
            other => Err(format!(
                "unknown format {:?} (expected json, toml, env or installation)",
                other
            )),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Json => "json",
            Self::Toml => "toml",
            Self::Env => "env",
            Self::Installation => "installation",
        };
        f.write_str(name)
    }
}

/// Export errors
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization failed: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("settings must be a JSON object")]
    NotAnObject,
}

/// Render `settings` (a resolved settings object) in `format`
pub fn export(
    settings: &Value,
    fields: &[ConfigField],
    prefix: &str,
    format: ExportFormat,
) -> Result<String, ExportError> {
    let map = settings.as_object().ok_or(ExportError::NotAnObject)?;
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(settings)?),
        ExportFormat::Toml => to_settings_toml(map),
        ExportFormat::Env => Ok(to_env(map, fields, prefix)),
        ExportFormat::Installation => to_installation_toml(map, fields),
    }
}

fn to_settings_toml(map: &Map<String, Value>) -> Result<String, ExportError> {
    let table: toml::Table = map
        .iter()
        .filter_map(|(key, value)| {
            json_to_toml(&protect_braces(value)).map(|v| (key.clone(), v))
        })
        .collect();
    Ok(toml::to_string(&table)?)
}

/// Wrap values that would not read back as themselves in a `$raw` marker
///
/// Strings with braces would parse as templates. Maps are wrapped whole when
/// a key has braces or when their single key starts with `$`, since either
/// would be read as a template key or a marker.
fn protect_braces(value: &Value) -> Value {
    match value {
        Value::String(s) if has_braces(s) => raw_marker(value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(protect_braces).collect()),
        Value::Object(map) if needs_raw_map(map) => raw_marker(value.clone()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), protect_braces(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn has_braces(text: &str) -> bool {
    text.contains('{') || text.contains('}')
}

fn needs_raw_map(map: &Map<String, Value>) -> bool {
    map.keys().any(|k| has_braces(k)) || (map.len() == 1 && map.keys().all(|k| k.starts_with('$')))
}

fn raw_marker(value: Value) -> Value {
    let mut marker = Map::new();
    marker.insert(RAW_MARKER.to_string(), value);
    Value::Object(marker)
}

fn to_env(map: &Map<String, Value>, fields: &[ConfigField], prefix: &str) -> String {
    let mut out = String::new();
    for field in fields {
        let (Some(var), Some(value)) = (field.env_key(prefix), map.get(&field.setting_name)) else {
            continue;
        };
        out.push_str(&var);
        out.push('=');
        out.push_str(&shell_quote(&field.to_str(value)));
        out.push('\n');
    }
    out
}

/// Single-quote for POSIX shells: `it's` -> `'it'\''s'`
pub fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

fn to_installation_toml(
    map: &Map<String, Value>,
    fields: &[ConfigField],
) -> Result<String, ExportError> {
    let mut sections: BTreeMap<String, toml::Table> = BTreeMap::new();
    for field in fields {
        let Some((section, option)) = field.section_option() else {
            continue;
        };
        let Some(value) = map.get(&field.setting_name) else {
            continue;
        };
        let value = match &field.kind {
            // choices are read back by their text
            FieldKind::Choice(_) if !value.is_null() => {
                Some(toml::Value::String(field.to_str(value)))
            }
            _ => json_to_toml(value),
        };
        if let Some(value) = value {
            sections
                .entry(section.to_string())
                .or_default()
                .insert(option.to_string(), value);
        }
    }
    let table: toml::Table = sections
        .into_iter()
        .map(|(name, options)| (name, toml::Value::Table(options)))
        .collect();
    Ok(toml::to_string(&table)?)
}
