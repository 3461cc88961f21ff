//! Environment layer
//!
//! Reads one variable per mapped field: `{prefix}{SETTING_NAME}` by default,
//! or the field's explicit name. Values are converted with the field's
//! `from_str`, so `APP_DEBUG=yes` becomes `true`.

use std::collections::BTreeMap;

use settings_core::Layer;
use tracing::{debug, warn};

use super::fields::{ConfigField, FieldError};

/// Source of environment variables, so tests never touch the process env
pub trait EnvSource {
    fn get(&self, name: &str) -> Option<String>;

    fn vars(&self) -> Box<dyn Iterator<Item = (String, String)> + '_>;
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnv;

impl EnvSource for StdEnv {
    fn get(&self, name: &str) -> Option<String> {
        let value = std::env::var_os(name)?;
        match value.into_string() {
            Ok(text) => Some(text),
            Err(raw) => {
                warn!(
                    var = %name,
                    value = ?raw,
                    "ignoring environment variable that is not valid UTF-8"
                );
                None
            }
        }
    }

    /// Variables whose name and value are both valid UTF-8
    fn vars(&self) -> Box<dyn Iterator<Item = (String, String)> + '_> {
        Box::new(std::env::vars_os().filter_map(|(name, value)| {
            match (name.into_string(), value.into_string()) {
                (Ok(name), Ok(value)) => Some((name, value)),
                (name, _) => {
                    debug!(var = ?name, "skipping environment variable that is not valid UTF-8");
                    None
                }
            }
        }))
    }
}

/// Environment backed by a map
#[derive(Debug, Clone, Default)]
pub struct MockEnv {
    vars: BTreeMap<String, String>,
}

impl MockEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }
}

impl EnvSource for MockEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn vars(&self) -> Box<dyn Iterator<Item = (String, String)> + '_> {
        Box::new(self.vars.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

/// Environment layer plus the variable names it consumed
#[derive(Debug, Clone)]
pub struct EnvLayer {
    pub layer: Layer,
    pub used_vars: Vec<String>,
}

/// Build a layer from every field whose variable is set
pub fn environment_layer(
    name: &str,
    priority: i32,
    fields: &[ConfigField],
    prefix: &str,
    env: &dyn EnvSource,
) -> Result<EnvLayer, FieldError> {
    let mut layer = Layer::new(name, priority);
    let mut used_vars = Vec::new();

    for field in fields {
        let Some(key) = field.env_key(prefix) else {
            continue;
        };
        if let Some(text) = env.get(&key) {
            layer.insert(field.setting_name.as_str(), field.from_str(&text)?);
            debug!(var = %key, setting = %field.setting_name, "read setting from environment");
            used_vars.push(key);
        }
    }

    Ok(EnvLayer { layer, used_vars })
}

/// Variables starting with `prefix` that no field consumes
pub fn unused_prefixed_vars(
    fields: &[ConfigField],
    prefix: &str,
    env: &dyn EnvSource,
) -> Vec<String> {
    if prefix.is_empty() {
        return Vec::new();
    }
    let known: Vec<String> = fields.iter().filter_map(|f| f.env_key(prefix)).collect();
    let mut unused: Vec<String> = env
        .vars()
        .map(|(k, _)| k)
        .filter(|k| k.starts_with(prefix) && !known.contains(k))
        .collect();
    unused.sort();
    unused
}
