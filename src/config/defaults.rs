//! Built-in defaults (lowest-priority layer)
//!
//! Hardcoded values for a web application. Most of them are derived from a
//! handful of inputs (`LOCAL_PATH`, `LISTEN_PORT`, `SERVER_BASE_URL`,
//! `PROJECT_MODULE`), so overriding one input in a higher layer updates
//! everything that depends on it.

use settings_core::{Layer, RawValue};

use super::derived::{self, deferred};

/// Built-in default configuration values
#[derive(Debug, Clone)]
pub struct BuiltinDefaults {
    /// Debug mode (default: false)
    pub debug: bool,

    /// Root of all local data (default: "./data")
    pub local_path: String,

    /// Port listened by the web server (default: 8000)
    pub listen_port: u16,

    /// Default language (default: "en")
    pub language_code: String,

    /// Default time zone (default: "UTC")
    pub time_zone: String,

    /// Address receiving error reports (default: "admin@localhost")
    pub admin_email: String,

    /// Name of the project module (default: "app")
    pub project_module: String,

    /// Applications always installed, before `EXTRA_APPS`
    pub installed_apps: Vec<String>,

    /// Minimum log level (default: "INFO")
    pub log_level: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            debug: false,
            local_path: "./data".to_string(),
            listen_port: 8000,
            language_code: "en".to_string(),
            time_zone: "UTC".to_string(),
            admin_email: "admin@localhost".to_string(),
            project_module: "app".to_string(),
            installed_apps: vec![
                "{PROJECT_MODULE}".to_string(),
                "auth".to_string(),
                "sessions".to_string(),
                "static_files".to_string(),
            ],
            log_level: "INFO".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to a layer
    pub fn to_layer(&self, name: &str, priority: i32) -> Layer {
        let mut apps: Vec<RawValue> = self
            .installed_apps
            .iter()
            .map(|app| RawValue::template(app.as_str()))
            .collect();
        apps.push(RawValue::expand("EXTRA_APPS"));

        Layer::new(name, priority)
            .with("DEBUG", self.debug)
            .with("TEMPLATE_DEBUG", RawValue::reference("DEBUG"))
            .with("LOG_LEVEL", RawValue::literal(self.log_level.as_str()))
            // paths
            .with("LOCAL_PATH", RawValue::directory(self.local_path.as_str()))
            .with("LOG_DIRECTORY", RawValue::directory("{LOCAL_PATH}/logs"))
            .with("MEDIA_ROOT", RawValue::directory("{LOCAL_PATH}/media"))
            .with("STATIC_ROOT", RawValue::directory("{LOCAL_PATH}/static"))
            .with("MEDIA_URL", "{URL_PREFIX}media/")
            .with("STATIC_URL", "{URL_PREFIX}static/")
            // locale
            .with("LANGUAGE_CODE", RawValue::literal(self.language_code.as_str()))
            .with("TIME_ZONE", RawValue::literal(self.time_zone.as_str()))
            // mail
            .with("ADMIN_EMAIL", RawValue::literal(self.admin_email.as_str()))
            .with("SERVER_EMAIL", "{ADMIN_EMAIL}")
            // server
            .with("LISTEN_PORT", RawValue::literal(self.listen_port))
            .with(
                "LISTEN_ADDRESS",
                deferred("listen_address", &["LISTEN_PORT"], derived::listen_address),
            )
            .with("SERVER_BASE_URL", "http://{LISTEN_ADDRESS}/")
            .with(
                "SERVER_NAME",
                deferred("server_name", &["SERVER_BASE_URL"], derived::server_name),
            )
            .with(
                "SERVER_PORT",
                deferred("server_port", &["SERVER_BASE_URL", "USE_SSL"], derived::server_port),
            )
            .with(
                "SERVER_PROTOCOL",
                deferred("server_protocol", &["USE_SSL"], derived::server_protocol),
            )
            .with(
                "URL_PREFIX",
                deferred("url_prefix", &["SERVER_BASE_URL"], derived::url_prefix),
            )
            .with(
                "USE_SSL",
                deferred("use_ssl", &["SERVER_BASE_URL"], derived::use_ssl),
            )
            .with(
                "ALLOWED_HOSTS",
                deferred(
                    "allowed_hosts",
                    &["LISTEN_ADDRESS", "SERVER_NAME"],
                    derived::allowed_hosts,
                ),
            )
            // project
            .with("PROJECT_MODULE", RawValue::literal(self.project_module.as_str()))
            .with(
                "PROJECT_NAME",
                deferred("project_name", &["PROJECT_MODULE"], derived::project_name),
            )
            .with("EXTRA_APPS", RawValue::List(Vec::new()))
            .with("INSTALLED_APPS", RawValue::List(apps))
            // secrets and database
            .with("SECRET_KEY", RawValue::null())
            .with("DATABASE_URL", "sqlite:///{LOCAL_PATH}database.sqlite3")
            .with(
                "DATABASE_ENGINE",
                deferred("database_engine", &["DATABASE_URL"], derived::database_engine),
            )
            .with(
                "DATABASE_NAME",
                deferred("database_name", &["DATABASE_URL"], derived::database_name),
            )
            .with(
                "DATABASE_USER",
                deferred("database_user", &["DATABASE_URL"], derived::database_user),
            )
            .with(
                "DATABASE_PASSWORD",
                deferred("database_password", &["DATABASE_URL"], derived::database_password),
            )
            .with(
                "DATABASE_HOST",
                deferred("database_host", &["DATABASE_URL"], derived::database_host),
            )
            .with(
                "DATABASE_PORT",
                deferred("database_port", &["DATABASE_URL"], derived::database_port),
            )
    }
}
