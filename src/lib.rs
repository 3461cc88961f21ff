//! Layered settings for web applications
//!
//! Settings come from prioritized layers (built-in defaults, project file,
//! installation files, environment, local overrides) and may refer to each
//! other through templates, references and deferred expressions. The
//! resolution engine lives in `settings-core`; this crate reads the sources
//! and exposes the result as one explicit [`LoadedSettings`] object.

pub mod config;

pub use config::{
    BuiltinDefaults, ConfigField, EffectiveSettings, EnvSource, ExportFormat, LoadError,
    LoadedSettings, MockEnv, SettingsLoader, SettingsOrigin, SettingsSource, StdEnv,
};
pub use settings_core::{
    merge, normalize_path, resolve, resolve_all, Deferred, Dependencies, Layer, LayerError,
    LayerStore, MergedEntry, MergedMapping, PathKind, RawValue, ResolutionCache, ResolveError,
    ResolvedSettings, Resolver, Template, TemplateError,
};
