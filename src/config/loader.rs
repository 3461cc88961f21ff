//! Settings loader
//!
//! Builds the layer stack in fixed precedence order and resolves it:
//! 1. Built-in defaults (priority 0)
//! 2. Project settings file (10)
//! 3. Installation files (20)
//! 4. Environment variables (30)
//! 5. Local overrides file (40)
//!
//! Extra layers can be inserted at any priority. A load either fully
//! succeeds or fails; nothing is kept in global state.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use settings_core::{
    resolve_all, Layer, LayerError, LayerStore, MergedMapping, RawValue, ResolveError,
    ResolvedSettings,
};
use tracing::{debug, warn};

use super::defaults::BuiltinDefaults;
use super::effective::{EffectiveSettings, SettingsOrigin, SettingsSource};
use super::env::{environment_layer, unused_prefixed_vars, EnvSource, StdEnv};
use super::fields::{base_fields, ConfigField, FieldError};
use super::file::{load_installation_file, load_settings_file, FileError, FileLayer};

pub const BUILTIN_PRIORITY: i32 = 0;
pub const PROJECT_PRIORITY: i32 = 10;
pub const INSTALLATION_PRIORITY: i32 = 20;
pub const ENVIRONMENT_PRIORITY: i32 = 30;
pub const LOCAL_PRIORITY: i32 = 40;

/// Default environment variable prefix
pub const DEFAULT_ENV_PREFIX: &str = "APP_";

/// Loading errors
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error("Invalid environment value: {0}")]
    Field(#[from] FieldError),

    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Builder for one settings load
pub struct SettingsLoader {
    defaults: Option<BuiltinDefaults>,
    project: Option<PathBuf>,
    installation: Vec<PathBuf>,
    local: Option<PathBuf>,
    env_prefix: String,
    env: Arc<dyn EnvSource>,
    fields: Vec<ConfigField>,
    extra: Vec<(SettingsOrigin, Layer)>,
    dedup: Vec<String>,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self {
            defaults: Some(BuiltinDefaults::default()),
            project: None,
            installation: Vec::new(),
            local: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            env: Arc::new(StdEnv),
            fields: base_fields(),
            extra: Vec::new(),
            dedup: vec!["INSTALLED_APPS".to_string()],
        }
    }

    /// Replace the built-in defaults
    pub fn defaults(mut self, defaults: BuiltinDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn without_builtin_defaults(mut self) -> Self {
        self.defaults = None;
        self
    }

    /// Settings file with project-wide defaults
    pub fn project_defaults(mut self, path: impl Into<PathBuf>) -> Self {
        self.project = Some(path.into());
        self
    }

    /// Installation file; later files take precedence over earlier ones
    pub fn installation_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.installation.push(path.into());
        self
    }

    /// Settings file with local overrides
    pub fn local_overrides(mut self, path: impl Into<PathBuf>) -> Self {
        self.local = Some(path.into());
        self
    }

    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    pub fn env_source(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Replace the field mapping used by installation files and environment
    pub fn fields(mut self, fields: Vec<ConfigField>) -> Self {
        self.fields = fields;
        self
    }

    /// Add a layer built in code, at its own priority
    pub fn extra_layer(mut self, layer: Layer) -> Self {
        self.extra.push((SettingsOrigin::Custom, layer));
        self
    }

    /// Remove duplicates from this list setting after resolution
    pub fn dedup_list(mut self, key: &str) -> Self {
        if !self.dedup.iter().any(|k| k == key) {
            self.dedup.push(key.to_string());
        }
        self
    }

    pub fn no_dedup(mut self) -> Self {
        self.dedup.clear();
        self
    }

    /// Read every source into a layer store
    pub fn build_store(&self) -> Result<(LayerStore, Vec<SettingsSource>), LoadError> {
        let mut store = LayerStore::new();
        let mut sources = Vec::new();

        // Layer 1: Built-in defaults
        if let Some(defaults) = &self.defaults {
            store.push(defaults.to_layer("builtin", BUILTIN_PRIORITY))?;
            sources.push(SettingsSource::new(
                SettingsOrigin::Builtin,
                "builtin",
                BUILTIN_PRIORITY,
            ));
        }

        // Layer 2: Project settings
        if let Some(path) = &self.project {
            if let Some(file) = skip_missing(path, |p| {
                load_settings_file(p, "project", PROJECT_PRIORITY)
            })? {
                push_file(&mut store, &mut sources, SettingsOrigin::Project, file)?;
            }
        }

        // Layer 3: Installation files
        for (index, path) in self.installation.iter().enumerate() {
            let name = if index == 0 {
                "installation".to_string()
            } else {
                format!("installation.{}", index)
            };
            if let Some(file) = skip_missing(path, |p| {
                load_installation_file(p, &name, INSTALLATION_PRIORITY, &self.fields)
            })? {
                push_file(&mut store, &mut sources, SettingsOrigin::Installation, file)?;
            }
        }

        // Layer 4: Environment
        let env = environment_layer(
            "environment",
            ENVIRONMENT_PRIORITY,
            &self.fields,
            &self.env_prefix,
            self.env.as_ref(),
        )?;
        for var in unused_prefixed_vars(&self.fields, &self.env_prefix, self.env.as_ref()) {
            warn!(var = %var, "environment variable does not match any setting");
        }
        if !env.layer.is_empty() {
            store.push(env.layer)?;
            sources.push(SettingsSource::new(
                SettingsOrigin::Environment,
                "environment",
                ENVIRONMENT_PRIORITY,
            ));
        }

        // Layer 5: Local overrides
        if let Some(path) = &self.local {
            let file = skip_missing(path, |p| load_settings_file(p, "local", LOCAL_PRIORITY))?;
            if let Some(file) = file {
                push_file(&mut store, &mut sources, SettingsOrigin::Local, file)?;
            }
        }

        for (origin, layer) in &self.extra {
            sources.push(SettingsSource::new(*origin, layer.name(), layer.priority()));
            store.push(layer.clone())?;
        }

        // precedence order, stable so ties keep insertion order
        sources.sort_by_key(|s| s.priority);
        Ok((store, sources))
    }

    /// Load, merge and resolve every setting
    pub fn load(&self) -> Result<LoadedSettings, LoadError> {
        let (store, sources) = self.build_store()?;
        let merged = store.merge();
        let mut resolved = resolve_all(&merged)?;

        for key in &self.dedup {
            let removed = resolved.dedup_list(key);
            if removed > 0 {
                debug!(setting = %key, removed, "removed duplicate list items");
            }
        }

        debug!(
            layers = store.len(),
            settings = resolved.len(),
            "settings loaded"
        );
        Ok(LoadedSettings {
            store,
            merged,
            resolved,
            sources,
            fields: self.fields.clone(),
            env_prefix: self.env_prefix.clone(),
        })
    }
}

fn skip_missing<F>(path: &Path, load: F) -> Result<Option<FileLayer>, FileError>
where
    F: FnOnce(&Path) -> Result<FileLayer, FileError>,
{
    if !path.exists() {
        debug!(file = %path.display(), "settings file not found, skipped");
        return Ok(None);
    }
    load(path).map(Some)
}

fn push_file(
    store: &mut LayerStore,
    sources: &mut Vec<SettingsSource>,
    origin: SettingsOrigin,
    file: FileLayer,
) -> Result<(), LayerError> {
    sources.push(
        SettingsSource::new(origin, file.layer.name(), file.layer.priority())
            .with_file(&file.path, file.digest),
    );
    store.push(file.layer)
}

/// Result of a successful load
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    store: LayerStore,
    merged: MergedMapping,
    resolved: ResolvedSettings,
    sources: Vec<SettingsSource>,
    fields: Vec<ConfigField>,
    env_prefix: String,
}

impl LoadedSettings {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.resolved.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.resolved.get_str(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.resolved.get_bool(key)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.resolved.get_u64(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.resolved.get_i64(key)
    }

    pub fn resolved(&self) -> &ResolvedSettings {
        &self.resolved
    }

    pub fn merged(&self) -> &MergedMapping {
        &self.merged
    }

    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    /// Contributing sources, lowest precedence first
    pub fn sources(&self) -> &[SettingsSource] {
        &self.sources
    }

    pub fn fields(&self) -> &[ConfigField] {
        &self.fields
    }

    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    /// Name of the layer whose value won the merge for `key`
    pub fn provenance(&self, key: &str) -> Option<&str> {
        self.merged.source_of(key)
    }

    /// Every layer defining `key` with its raw value, lowest priority first
    pub fn history(&self, key: &str) -> Vec<(&Layer, &RawValue)> {
        self.store.history(key)
    }

    /// Snapshot with provenance; secrets redacted unless `reveal`
    pub fn effective(&self, reveal: bool) -> EffectiveSettings {
        let provenance: BTreeMap<String, String> = self
            .merged
            .iter()
            .map(|(key, entry)| (key.to_string(), entry.layer.clone()))
            .collect();
        EffectiveSettings::build(&self.resolved, self.sources.clone(), provenance, !reveal)
    }
}
