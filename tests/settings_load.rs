//! End-to-end settings loading
//!
//! Loads the fixture files under `tests/fixtures/settings` together with a
//! mock environment and checks precedence, derived values, provenance,
//! redaction and export.

use std::fs;
use std::path::PathBuf;

use serde_json::json;
use tempfile::TempDir;

use layered_settings::config::{export, ConfigField, FileError, REDACTED};
use layered_settings::{
    ExportFormat, Layer, LoadError, LoadedSettings, MockEnv, RawValue, SettingsLoader,
    SettingsOrigin,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/settings")
        .join(name)
}

fn env() -> MockEnv {
    MockEnv::from_pairs([
        ("TIME_ZONE", "UTC"),
        ("APP_LISTEN_ADDRESS", "10.1.2.3:9001"),
        ("SECRET_KEY", "s3cr3t"),
    ])
}

fn full_loader() -> SettingsLoader {
    SettingsLoader::new()
        .project_defaults(fixture("project.toml"))
        .installation_file(fixture("installation.toml"))
        .local_overrides(fixture("local.toml"))
        .env_source(env())
}

fn load() -> LoadedSettings {
    full_loader().load().unwrap()
}

// =============================================================================
// Precedence
// =============================================================================

#[test]
fn test_every_layer_contributes() {
    let settings = load();
    let origins: Vec<SettingsOrigin> = settings.sources().iter().map(|s| s.origin).collect();
    assert_eq!(
        origins,
        vec![
            SettingsOrigin::Builtin,
            SettingsOrigin::Project,
            SettingsOrigin::Installation,
            SettingsOrigin::Environment,
            SettingsOrigin::Local,
        ]
    );
}

#[test]
fn test_layer_precedence() {
    let settings = load();
    // environment over project
    assert_eq!(settings.get_str("TIME_ZONE"), Some("UTC"));
    assert_eq!(settings.provenance("TIME_ZONE"), Some("environment"));
    // installation over project
    assert_eq!(settings.get("EXTRA_APPS"), Some(&json!(["comments", "search"])));
    assert_eq!(settings.provenance("EXTRA_APPS"), Some("installation"));
    // local over builtin
    assert_eq!(settings.get_bool("DEBUG"), Some(true));
    assert_eq!(settings.get_bool("TEMPLATE_DEBUG"), Some(true));
    // project over builtin
    assert_eq!(settings.provenance("PROJECT_MODULE"), Some("project"));
}

#[test]
fn test_history_lists_every_definition() {
    let settings = load();
    let layers: Vec<&str> = settings
        .history("TIME_ZONE")
        .into_iter()
        .map(|(layer, _)| layer.name())
        .collect();
    assert_eq!(layers, vec!["builtin", "project", "environment"]);
}

// =============================================================================
// Derived values
// =============================================================================

#[test]
fn test_values_derived_from_installation() {
    let settings = load();
    assert_eq!(settings.get_str("LOCAL_PATH"), Some("/srv/news/"));
    assert_eq!(settings.get_str("LOG_DIRECTORY"), Some("/srv/news/logs/"));
    assert_eq!(settings.get_str("LOG_FILE"), Some("/srv/news/logs/app.log"));
    assert_eq!(settings.get_bool("USE_SSL"), Some(true));
    assert_eq!(settings.get_str("SERVER_NAME"), Some("news.example.org"));
    assert_eq!(settings.get_u64("SERVER_PORT"), Some(443));
    assert_eq!(settings.get_str("URL_PREFIX"), Some("/portal/"));
    assert_eq!(settings.get_str("STATIC_URL"), Some("/portal/static/"));
    assert_eq!(settings.get_str("LOG_LEVEL"), Some("WARNING"));
    assert_eq!(settings.get_str("PROJECT_NAME"), Some("News Portal"));
    assert_eq!(settings.get_str("WELCOME"), Some("Welcome to News Portal"));
}

#[test]
fn test_database_url_components() {
    let settings = load();
    assert_eq!(settings.get_str("DATABASE_ENGINE"), Some("postgres"));
    assert_eq!(settings.get_str("DATABASE_NAME"), Some("news"));
    assert_eq!(settings.get_str("DATABASE_USER"), Some("news"));
    assert_eq!(settings.get_str("DATABASE_HOST"), Some("db.example.org"));
    assert_eq!(settings.get_u64("DATABASE_PORT"), Some(5432));
    // [database] password overrides the URL
    assert_eq!(settings.get_str("DATABASE_PASSWORD"), Some("hunter2"));
    assert_eq!(settings.provenance("DATABASE_PASSWORD"), Some("installation"));
    assert_eq!(settings.provenance("DATABASE_HOST"), Some("builtin"));
}

#[test]
fn test_environment_overrides_deferred_default() {
    let settings = load();
    assert_eq!(settings.get_str("LISTEN_ADDRESS"), Some("10.1.2.3:9001"));
    assert_eq!(
        settings.get("ALLOWED_HOSTS"),
        Some(&json!(["10.1.2.3", "127.0.0.1", "::1", "localhost", "news.example.org"]))
    );
}

#[test]
fn test_nested_maps_and_raw_values() {
    let settings = load();
    assert_eq!(
        settings.get("CACHES"),
        Some(&json!({"default": {"BACKEND": "filesystem", "LOCATION": "/srv/news/cache/"}}))
    );
    assert_eq!(settings.get_str("BRACES"), Some("{kept as is}"));
}

#[test]
fn test_installed_apps_deduplicated() {
    let settings = load();
    assert_eq!(
        settings.get("INSTALLED_APPS"),
        Some(&json!(["news_portal", "auth", "sessions", "static_files", "comments", "search"]))
    );

    let dir = TempDir::new().unwrap();
    let local = dir.path().join("local.toml");
    fs::write(&local, "EXTRA_APPS = [\"auth\", \"{PROJECT_MODULE}\", \"blog\"]\n").unwrap();
    let settings = SettingsLoader::new()
        .local_overrides(&local)
        .env_source(MockEnv::new())
        .load()
        .unwrap();
    assert_eq!(
        settings.get("INSTALLED_APPS"),
        Some(&json!(["app", "auth", "sessions", "static_files", "blog"]))
    );

    let kept = SettingsLoader::new()
        .local_overrides(&local)
        .env_source(MockEnv::new())
        .no_dedup()
        .load()
        .unwrap();
    assert_eq!(kept.get("INSTALLED_APPS").and_then(|v| v.as_array()).map(Vec::len), Some(7));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_invalid_choice_in_installation_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");
    fs::write(&path, "[global]\nlog_level = \"verbose\"\n").unwrap();

    let err = SettingsLoader::new()
        .installation_file(&path)
        .env_source(MockEnv::new())
        .load()
        .unwrap_err();
    assert!(matches!(err, LoadError::File(FileError::Field { .. })));
    assert!(err.to_string().contains("verbose"));
}

#[test]
fn test_typed_installation_values_are_checked() {
    let dir = TempDir::new().unwrap();
    for (body, setting) in [
        ("[global]\nlog_level = 3\n", "LOG_LEVEL"),
        ("[global]\nlisten_port = true\n", "LISTEN_PORT"),
        ("[global]\ndata = 5\n", "LOCAL_PATH"),
    ] {
        let path = dir.path().join("settings.toml");
        fs::write(&path, body).unwrap();
        let err = SettingsLoader::new()
            .installation_file(&path)
            .env_source(MockEnv::new())
            .load()
            .unwrap_err();
        assert!(matches!(err, LoadError::File(FileError::Field { .. })), "{}", body);
        assert!(err.to_string().contains(setting), "{}", err);
    }
}

#[test]
fn test_missing_reference_in_local_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("local.toml");
    fs::write(&path, "GREETING = \"hello {UNDEFINED}\"\n").unwrap();

    let err = SettingsLoader::new()
        .local_overrides(&path)
        .env_source(MockEnv::new())
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("UNDEFINED"));
    assert!(err.to_string().contains("GREETING"));
}

#[cfg(unix)]
#[test]
fn test_process_env_with_non_utf8_variable_still_loads() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    std::env::set_var("LSLOAD_UNRELATED", OsStr::from_bytes(b"caf\xe9"));
    std::env::set_var("LSLOAD_GREETING", OsStr::from_bytes(b"caf\xe9"));
    std::env::set_var("LSLOAD_NAME", "news");

    let result = SettingsLoader::new()
        .without_builtin_defaults()
        .env_prefix("LSLOAD_")
        .fields(vec![
            ConfigField::char(None, "GREETING"),
            ConfigField::char(None, "NAME"),
        ])
        .load();

    std::env::remove_var("LSLOAD_UNRELATED");
    std::env::remove_var("LSLOAD_GREETING");
    std::env::remove_var("LSLOAD_NAME");

    let settings = result.unwrap();
    assert_eq!(settings.get_str("NAME"), Some("news"));
    assert_eq!(settings.get("GREETING"), None);
}

// =============================================================================
// Snapshot and export
// =============================================================================

#[test]
fn test_effective_snapshot() {
    let settings = load();
    let effective = settings.effective(false);
    assert_eq!(effective.get_str("SECRET_KEY"), Some(REDACTED));
    assert_eq!(effective.get_str("DATABASE_PASSWORD"), Some(REDACTED));
    assert_eq!(effective.redactions, vec!["DATABASE_PASSWORD", "SECRET_KEY"]);
    assert_eq!(effective.provenance.get("LOCAL_PATH").map(String::as_str), Some("installation"));

    let source = effective.source_of("LOCAL_PATH").unwrap();
    assert_eq!(source.path.as_deref(), Some(fixture("installation.toml").as_path()));
    assert_eq!(source.digest.as_ref().map(String::len), Some(64));

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("effective.json");
    effective.write_to_file(&out).unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written["settings"]["SECRET_KEY"], REDACTED);
    assert_eq!(written["sources"][3]["origin"], "environment");
}

#[test]
fn test_env_export_uses_field_names() {
    let settings = load();
    let out = export(
        &settings.resolved().to_value(),
        settings.fields(),
        settings.env_prefix(),
        ExportFormat::Env,
    )
    .unwrap();
    assert!(out.lines().any(|l| l == "PORT='9000'"));
    assert!(out.lines().any(|l| l == "APP_EXTRA_APPS='comments,search'"));
    assert!(out.lines().any(|l| l == "APP_LOG_LEVEL='warn'"));
    assert!(out.lines().any(|l| l == "TIME_ZONE='UTC'"));
}

#[test]
fn test_toml_export_reloads_to_same_values() {
    let settings = full_loader()
        .extra_layer(
            Layer::new("extras", 50)
                .with("FORMATS", RawValue::literal(json!({"{date}": "iso"})))
                .with("OPTS", RawValue::literal(json!({"$ref": "DEBUG"}))),
        )
        .load()
        .unwrap();
    let original = settings.resolved().to_value();
    assert_eq!(original["OPTS"], json!({"$ref": "DEBUG"}));
    let text = export(
        &original,
        settings.fields(),
        settings.env_prefix(),
        ExportFormat::Toml,
    )
    .unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("exported.toml");
    fs::write(&path, text).unwrap();

    let reloaded = SettingsLoader::new()
        .without_builtin_defaults()
        .local_overrides(&path)
        .env_source(MockEnv::new())
        .load()
        .unwrap();
    assert_eq!(reloaded.resolved().to_value(), original);
}

#[test]
fn test_installation_export_reloads_fields() {
    let settings = load();
    let text = export(
        &settings.resolved().to_value(),
        settings.fields(),
        settings.env_prefix(),
        ExportFormat::Installation,
    )
    .unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");
    fs::write(&path, text).unwrap();

    let reloaded = SettingsLoader::new()
        .installation_file(&path)
        .env_source(MockEnv::new())
        .load()
        .unwrap();
    assert_eq!(reloaded.get_str("LOCAL_PATH"), Some("/srv/news/"));
    assert_eq!(reloaded.get_u64("LISTEN_PORT"), Some(9000));
    assert_eq!(reloaded.get_str("LOG_LEVEL"), Some("WARNING"));
    assert_eq!(reloaded.get_str("TIME_ZONE"), Some("UTC"));
}
