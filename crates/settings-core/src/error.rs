//! Error types for layer registration and setting resolution.

/// Errors raised while registering layers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayerError {
    #[error("layer `{0}` is already registered")]
    DuplicateLayer(String),
}

/// Errors raised while resolving settings.
///
/// Every variant is fatal for the configuration load: there is no degraded
/// mode where some settings stay unresolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A setting (transitively) depends on itself.
    ///
    /// `cycle` starts and ends with the same key, e.g. `["A", "B", "A"]`.
    #[error("cyclic dependency between settings: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A referenced setting is not defined by any layer.
    #[error("missing setting `{key}`{}", referrer_suffix(.referrer))]
    MissingSetting {
        key: String,
        referrer: Option<String>,
    },

    /// A template string has malformed placeholder syntax.
    #[error("invalid template in `{key}` at offset {position}: {reason} (in {template:?})")]
    TemplateSyntax {
        key: String,
        template: String,
        position: usize,
        reason: String,
    },

    /// A deferred expression failed, or a value had the wrong shape.
    #[error("cannot evaluate `{key}`: {message}")]
    Evaluation { key: String, message: String },
}

impl ResolveError {
    /// The setting this error is about.
    pub fn key(&self) -> &str {
        match self {
            Self::CyclicDependency { cycle } => cycle.last().map(String::as_str).unwrap_or(""),
            Self::MissingSetting { key, .. }
            | Self::TemplateSyntax { key, .. }
            | Self::Evaluation { key, .. } => key,
        }
    }
}

fn referrer_suffix(referrer: &Option<String>) -> String {
    match referrer {
        Some(name) => format!(" (referenced by `{}`)", name),
        None => String::new(),
    }
}
