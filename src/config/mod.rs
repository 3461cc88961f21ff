//! Settings sources and loading
//!
//! Builds the layer stack consumed by the resolution engine:
//! 1. Built-in defaults
//! 2. Project settings file
//! 3. Installation files (`[section] option`, mapped through fields)
//! 4. Environment variables
//! 5. Local overrides file

mod defaults;
pub mod derived;
mod effective;
mod env;
mod export;
mod fields;
mod file;
mod loader;

pub use defaults::BuiltinDefaults;
pub use effective::{
    is_secret_key, redact_secrets, EffectiveSettings, SettingsOrigin, SettingsSource, REDACTED,
    SCHEMA_ID, SCHEMA_VERSION,
};
pub use env::{environment_layer, unused_prefixed_vars, EnvLayer, EnvSource, MockEnv, StdEnv};
pub use export::{export, shell_quote, ExportError, ExportFormat};
pub use fields::{
    base_fields, bool_setting, strip_split, ConfigField, EnvName, FieldError, FieldKind,
};
pub use file::{
    is_setting_name, json_to_toml, load_installation_file, load_settings_file, toml_to_json,
    FileError, FileLayer,
};
pub use loader::{
    LoadError, LoadedSettings, SettingsLoader, BUILTIN_PRIORITY, DEFAULT_ENV_PREFIX,
    ENVIRONMENT_PRIORITY, INSTALLATION_PRIORITY, LOCAL_PRIORITY, PROJECT_PRIORITY,
};
