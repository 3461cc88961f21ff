//! Field mapping between installation files, environment variables and settings
//!
//! A field maps an option of the installation file (`[global] data = ...`)
//! and an environment variable (`APP_LOCAL_PATH`) onto one setting
//! (`LOCAL_PATH`), converting text into a typed raw value.

use serde_json::Value;
use settings_core::RawValue;

/// Errors raised when text cannot be converted for a field
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    #[error("{setting}: invalid integer {value:?}")]
    InvalidInteger { setting: String, value: String },

    #[error("{setting}: invalid number {value:?}")]
    InvalidFloat { setting: String, value: String },

    #[error("{setting}: invalid choice {value:?} (expected one of: {})", .allowed.join(", "))]
    InvalidChoice {
        setting: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("{setting}: expected {expected}, got {value}")]
    InvalidType {
        setting: String,
        expected: &'static str,
        value: String,
    },
}

/// How a field's text is converted
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Template string; empty text is null when `allow_none`
    Char { allow_none: bool },
    Integer { allow_none: bool },
    Float { allow_none: bool },
    Boolean { allow_none: bool },
    /// Comma-separated list
    List,
    /// Directory path, always with a trailing `/`
    Directory,
    /// Text value -> setting value
    Choice(Vec<(String, Value)>),
}

impl FieldKind {
    fn expected(&self) -> &'static str {
        match self {
            Self::Char { .. } => "a string",
            Self::Integer { .. } => "an integer",
            Self::Float { .. } => "a number",
            Self::Boolean { .. } => "a boolean",
            Self::List => "a list or a comma-separated string",
            Self::Directory => "a directory path",
            Self::Choice(_) => "one of the choices",
        }
    }
}

/// Environment variable used for a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvName {
    /// `{prefix}{SETTING_NAME}`
    Auto,
    Named(String),
    Disabled,
}

/// One mapped setting
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigField {
    /// `section.option` in the installation file, if any
    pub name: Option<String>,
    pub setting_name: String,
    pub kind: FieldKind,
    pub env_name: EnvName,
    pub help: Option<String>,
}

impl ConfigField {
    pub fn new(name: Option<&str>, setting_name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.map(str::to_string),
            setting_name: setting_name.to_string(),
            kind,
            env_name: EnvName::Auto,
            help: None,
        }
    }

    pub fn char(name: Option<&str>, setting_name: &str) -> Self {
        Self::new(name, setting_name, FieldKind::Char { allow_none: true })
    }

    pub fn integer(name: Option<&str>, setting_name: &str) -> Self {
        Self::new(name, setting_name, FieldKind::Integer { allow_none: true })
    }

    pub fn float(name: Option<&str>, setting_name: &str) -> Self {
        Self::new(name, setting_name, FieldKind::Float { allow_none: true })
    }

    pub fn boolean(name: Option<&str>, setting_name: &str) -> Self {
        Self::new(name, setting_name, FieldKind::Boolean { allow_none: false })
    }

    pub fn list(name: Option<&str>, setting_name: &str) -> Self {
        Self::new(name, setting_name, FieldKind::List)
    }

    pub fn directory(name: Option<&str>, setting_name: &str) -> Self {
        Self::new(name, setting_name, FieldKind::Directory)
    }

    pub fn choice(name: Option<&str>, setting_name: &str, choices: &[(&str, Value)]) -> Self {
        Self::new(
            name,
            setting_name,
            FieldKind::Choice(
                choices
                    .iter()
                    .map(|(text, value)| (text.to_string(), value.clone()))
                    .collect(),
            ),
        )
    }

    /// Use an explicit environment variable name (no prefix)
    pub fn env(mut self, env_name: &str) -> Self {
        self.env_name = EnvName::Named(env_name.to_string());
        self
    }

    pub fn no_env(mut self) -> Self {
        self.env_name = EnvName::Disabled;
        self
    }

    pub fn help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    pub fn allow_none(mut self, allow: bool) -> Self {
        match &mut self.kind {
            FieldKind::Char { allow_none }
            | FieldKind::Integer { allow_none }
            | FieldKind::Float { allow_none }
            | FieldKind::Boolean { allow_none } => *allow_none = allow,
            _ => {}
        }
        self
    }

    /// Section and option of the installation file
    pub fn section_option(&self) -> Option<(&str, &str)> {
        let name = self.name.as_deref()?;
        name.split_once('.')
    }

    /// Environment variable name for this field, given the loader prefix
    pub fn env_key(&self, prefix: &str) -> Option<String> {
        match &self.env_name {
            EnvName::Auto => Some(format!("{}{}", prefix, self.setting_name)),
            EnvName::Named(name) => Some(name.clone()),
            EnvName::Disabled => None,
        }
    }

    /// Convert text from a file or the environment
    pub fn from_str(&self, text: &str) -> Result<RawValue, FieldError> {
        match &self.kind {
            FieldKind::Char { allow_none } => {
                if text.is_empty() && *allow_none {
                    Ok(RawValue::null())
                } else {
                    Ok(RawValue::template(text))
                }
            }
            FieldKind::Integer { allow_none } => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(if *allow_none {
                        RawValue::null()
                    } else {
                        RawValue::literal(0)
                    });
                }
                trimmed
                    .parse::<i64>()
                    .map(RawValue::literal)
                    .map_err(|_| FieldError::InvalidInteger {
                        setting: self.setting_name.clone(),
                        value: text.to_string(),
                    })
            }
            FieldKind::Float { allow_none } => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(if *allow_none {
                        RawValue::null()
                    } else {
                        RawValue::literal(0.0)
                    });
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(|n| RawValue::Literal(Value::Number(n)))
                    .ok_or_else(|| FieldError::InvalidFloat {
                        setting: self.setting_name.clone(),
                        value: text.to_string(),
                    })
            }
            FieldKind::Boolean { allow_none } => {
                if text.is_empty() && *allow_none {
                    Ok(RawValue::null())
                } else {
                    Ok(RawValue::literal(bool_setting(text)))
                }
            }
            FieldKind::List => Ok(RawValue::List(
                strip_split(text).into_iter().map(RawValue::Template).collect(),
            )),
            FieldKind::Directory => {
                if text.is_empty() {
                    Ok(RawValue::null())
                } else {
                    Ok(RawValue::directory(text))
                }
            }
            FieldKind::Choice(choices) => choices
                .iter()
                .find(|(choice, _)| choice == text)
                .map(|(_, value)| RawValue::Literal(value.clone()))
                .ok_or_else(|| FieldError::InvalidChoice {
                    setting: self.setting_name.clone(),
                    value: text.to_string(),
                    allowed: choices.iter().map(|(c, _)| c.clone()).collect(),
                }),
        }
    }

    /// Convert a typed value from a structured file (TOML)
    ///
    /// Strings go through [`ConfigField::from_str`]. Other values must
    /// already have the field's type: an integer for `Integer`, a number
    /// for `Float`, a boolean for `Boolean`, an array for `List` and one
    /// of the choice values for `Choice`. `Char` also takes a number or a
    /// boolean as its text. Directories only come from strings.
    pub fn from_value(&self, value: Value) -> Result<RawValue, FieldError> {
        let value = match value {
            Value::String(text) => return self.from_str(&text),
            Value::Null => return Ok(RawValue::null()),
            other => other,
        };
        match (&self.kind, value) {
            (FieldKind::Char { .. }, v @ (Value::Number(_) | Value::Bool(_))) => {
                Ok(RawValue::template(v.to_string()))
            }
            (FieldKind::Integer { .. }, Value::Number(n)) if n.is_i64() || n.is_u64() => {
                Ok(RawValue::Literal(Value::Number(n)))
            }
            (FieldKind::Integer { .. }, v @ Value::Number(_)) => Err(FieldError::InvalidInteger {
                setting: self.setting_name.clone(),
                value: v.to_string(),
            }),
            (FieldKind::Float { .. }, v @ Value::Number(_)) => Ok(RawValue::Literal(v)),
            (FieldKind::Boolean { .. }, v @ Value::Bool(_)) => Ok(RawValue::Literal(v)),
            (FieldKind::List, v @ Value::Array(_)) => Ok(RawValue::from_json(v)),
            (FieldKind::Choice(choices), v) => {
                if choices.iter().any(|(_, choice)| *choice == v) {
                    Ok(RawValue::Literal(v))
                } else {
                    Err(FieldError::InvalidChoice {
                        setting: self.setting_name.clone(),
                        value: v.to_string(),
                        allowed: choices.iter().map(|(c, _)| c.clone()).collect(),
                    })
                }
            }
            (kind, v) => Err(FieldError::InvalidType {
                setting: self.setting_name.clone(),
                expected: kind.expected(),
                value: v.to_string(),
            }),
        }
    }

    /// Render a resolved value back to text, for exports
    pub fn to_str(&self, value: &Value) -> String {
        match (&self.kind, value) {
            (_, Value::Null) => String::new(),
            (FieldKind::List, Value::Array(items)) => items
                .iter()
                .map(settings_core::template::render_value)
                .collect::<Vec<_>>()
                .join(","),
            (FieldKind::Choice(choices), v) => choices
                .iter()
                .find(|(_, choice_value)| choice_value == v)
                .map(|(text, _)| text.clone())
                .unwrap_or_else(|| settings_core::template::render_value(v)),
            (_, v) => settings_core::template::render_value(v),
        }
    }
}

/// True if the lower-cased text is one of `1 ok yes true on`
pub fn bool_setting(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "1" | "ok" | "yes" | "true" | "on"
    )
}

/// Split on `,`, trim each item and drop empty ones
pub fn strip_split(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Default field mapping for a web application
pub fn base_fields() -> Vec<ConfigField> {
    vec![
        ConfigField::char(Some("global.admin_email"), "ADMIN_EMAIL")
            .env("ADMIN_EMAIL")
            .help("e-mail address receiving logged errors"),
        ConfigField::char(None, "SECRET_KEY")
            .env("SECRET_KEY")
            .help("secret key used for cryptographic signing"),
        ConfigField::directory(Some("global.data"), "LOCAL_PATH")
            .help("where all data is stored (static, uploaded and temporary files)"),
        ConfigField::directory(Some("global.upload_directory"), "MEDIA_ROOT")
            .env("UPLOAD_DIRECTORY")
            .help("where uploaded media files are stored"),
        ConfigField::directory(Some("global.log_directory"), "LOG_DIRECTORY")
            .help("where log files are written"),
        ConfigField::char(Some("global.language_code"), "LANGUAGE_CODE")
            .env("LANGUAGE_CODE")
            .help("default language"),
        ConfigField::char(Some("global.time_zone"), "TIME_ZONE")
            .env("TIME_ZONE")
            .help("default time zone"),
        ConfigField::integer(Some("global.listen_port"), "LISTEN_PORT")
            .env("PORT")
            .help("port listened by the web server"),
        ConfigField::char(Some("global.listen_address"), "LISTEN_ADDRESS")
            .help("address listened by the web server (like 127.0.0.1:8000)"),
        ConfigField::char(Some("global.server_url"), "SERVER_BASE_URL")
            .help("public URL of the site, with a trailing slash"),
        ConfigField::boolean(Some("global.debug"), "DEBUG")
            .help("debug mode, never enable it in production"),
        ConfigField::list(Some("global.extra_apps"), "EXTRA_APPS")
            .help("additional applications, comma-separated"),
        ConfigField::char(Some("database.url"), "DATABASE_URL")
            .env("DATABASE_URL")
            .help("database connection URL"),
        ConfigField::char(Some("database.password"), "DATABASE_PASSWORD")
            .help("database password, overrides the one in DATABASE_URL"),
        ConfigField::choice(
            Some("global.log_level"),
            "LOG_LEVEL",
            &[
                ("debug", Value::from("DEBUG")),
                ("info", Value::from("INFO")),
                ("warn", Value::from("WARNING")),
                ("error", Value::from("ERROR")),
            ],
        )
        .help("minimum level of log records"),
    ]
}
