//! Raw setting values, as contributed by a layer before resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Resolved values handed to a deferred expression, keyed by setting name.
pub type Dependencies = BTreeMap<String, Value>;

/// Signature of a deferred expression.
pub type ExpressionFn = dyn Fn(&Dependencies) -> Result<Value, String> + Send + Sync;

/// Marker keys recognised by [`RawValue::from_json`].
pub const RAW_MARKER: &str = "$raw";
pub const REF_MARKER: &str = "$ref";
pub const PATH_MARKER: &str = "$path";
pub const DIR_MARKER: &str = "$dir";
pub const EXPAND_MARKER: &str = "$expand";

/// A value computed from other settings.
///
/// The function only sees the settings listed in `dependencies`.
#[derive(Clone)]
pub struct Deferred {
    dependencies: Vec<String>,
    func: Arc<ExpressionFn>,
    label: Option<String>,
}

impl Deferred {
    pub fn new<I, S, F>(dependencies: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Dependencies) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            func: Arc::new(func),
            label: None,
        }
    }

    /// Attach a human-readable name, shown in `Debug` output and exports.
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn evaluate(&self, dependencies: &Dependencies) -> Result<Value, String> {
        (self.func)(dependencies)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("label", &self.label)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl PartialEq for Deferred {
    fn eq(&self, other: &Self) -> bool {
        self.dependencies == other.dependencies && Arc::ptr_eq(&self.func, &other.func)
    }
}

/// What a [`RawValue::Path`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    /// Always rendered with a trailing `/`.
    Directory,
}

/// A setting value before resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Returned unchanged; strings inside are never interpreted.
    Literal(Value),
    /// String with `{NAME}` placeholders.
    Template(String),
    /// String kept verbatim, braces included.
    Raw(String),
    /// The resolved value of another setting.
    Reference(String),
    Deferred(Deferred),
    /// Lexically normalized filesystem path.
    Path { kind: PathKind, value: Box<RawValue> },
    List(Vec<RawValue>),
    /// Keys are templates too.
    Map(BTreeMap<String, RawValue>),
    /// Splices another list (or map) setting into the enclosing list (or map).
    Expand(String),
}

impl RawValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn template(text: impl Into<String>) -> Self {
        Self::Template(text.into())
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw(text.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference(name.into())
    }

    pub fn expand(name: impl Into<String>) -> Self {
        Self::Expand(name.into())
    }

    pub fn deferred<I, S, F>(dependencies: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Dependencies) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self::Deferred(Deferred::new(dependencies, func))
    }

    pub fn path(value: impl Into<RawValue>) -> Self {
        Self::Path {
            kind: PathKind::File,
            value: Box::new(value.into()),
        }
    }

    pub fn directory(value: impl Into<RawValue>) -> Self {
        Self::Path {
            kind: PathKind::Directory,
            value: Box::new(value.into()),
        }
    }

    pub fn null() -> Self {
        Self::Literal(Value::Null)
    }

    /// Interpret JSON data loaded from a file or built in code.
    ///
    /// Strings become templates, arrays lists and objects maps. A single-key
    /// object whose key is `$raw`, `$ref`, `$path`, `$dir` or `$expand`
    /// builds the matching variant.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Template(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            Value::Object(map) => {
                if map.len() == 1 {
                    if let Some((key, inner)) = map.iter().next() {
                        if let Some(marked) = Self::from_marker(key, inner) {
                            return marked;
                        }
                    }
                }
                Self::Map(
                    map.into_iter()
                        .map(|(k, v)| (k, Self::from_json(v)))
                        .collect(),
                )
            }
            other => Self::Literal(other),
        }
    }

    fn from_marker(key: &str, inner: &Value) -> Option<Self> {
        match (key, inner) {
            (RAW_MARKER, Value::String(s)) => Some(Self::Raw(s.clone())),
            (RAW_MARKER, other) => Some(Self::Literal(other.clone())),
            (REF_MARKER, Value::String(name)) => Some(Self::Reference(name.clone())),
            (EXPAND_MARKER, Value::String(name)) => Some(Self::Expand(name.clone())),
            (PATH_MARKER, v) => Some(Self::path(Self::from_json(v.clone()))),
            (DIR_MARKER, v) => Some(Self::directory(Self::from_json(v.clone()))),
            _ => None,
        }
    }

    /// Short description used by `explain`-style output.
    pub fn describe(&self) -> String {
        match self {
            Self::Literal(v) => v.to_string(),
            Self::Template(t) => format!("{:?}", t),
            Self::Raw(s) => format!("raw {:?}", s),
            Self::Reference(name) => format!("ref {}", name),
            Self::Expand(name) => format!("expand {}", name),
            Self::Deferred(d) => format!(
                "deferred {}({})",
                d.label().unwrap_or("<fn>"),
                d.dependencies().join(", ")
            ),
            Self::Path { kind, value } => match kind {
                PathKind::File => format!("path {}", value.describe()),
                PathKind::Directory => format!("dir {}", value.describe()),
            },
            Self::List(items) => format!(
                "[{}]",
                items.iter().map(Self::describe).collect::<Vec<_>>().join(", ")
            ),
            Self::Map(map) => format!(
                "{{{}}}",
                map.iter()
                    .map(|(k, v)| format!("{:?}: {}", k, v.describe()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        Self::from_json(value)
    }
}

impl From<&str> for RawValue {
    fn from(text: &str) -> Self {
        Self::Template(text.to_string())
    }
}

impl From<String> for RawValue {
    fn from(text: String) -> Self {
        Self::Template(text)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        Self::Literal(Value::Bool(b))
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        Self::Literal(Value::from(n))
    }
}

impl From<u64> for RawValue {
    fn from(n: u64) -> Self {
        Self::Literal(Value::from(n))
    }
}

impl From<i32> for RawValue {
    fn from(n: i32) -> Self {
        Self::Literal(Value::from(n))
    }
}

impl From<Deferred> for RawValue {
    fn from(d: Deferred) -> Self {
        Self::Deferred(d)
    }
}

impl From<Vec<RawValue>> for RawValue {
    fn from(items: Vec<RawValue>) -> Self {
        Self::List(items)
    }
}

/// Lexically normalize a path: collapse `.`, `..` and repeated separators.
///
/// Leading `..` components of relative paths are kept. An empty result
/// becomes `.`.
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_strings_are_templates() {
        assert_eq!(RawValue::from_json(json!("{X}")), RawValue::template("{X}"));
        assert_eq!(RawValue::from_json(json!(3)), RawValue::literal(3));
    }

    #[test]
    fn test_from_json_markers() {
        assert_eq!(RawValue::from_json(json!({"$raw": "{X}"})), RawValue::raw("{X}"));
        assert_eq!(RawValue::from_json(json!({"$ref": "DEBUG"})), RawValue::reference("DEBUG"));
        assert_eq!(
            RawValue::from_json(json!({"$dir": "{LOCAL_PATH}/media"})),
            RawValue::directory("{LOCAL_PATH}/media")
        );
        assert_eq!(
            RawValue::from_json(json!(["a", {"$expand": "APPS"}])),
            RawValue::List(vec![RawValue::template("a"), RawValue::expand("APPS")])
        );
    }

    #[test]
    fn test_from_json_plain_object_is_map() {
        let value = RawValue::from_json(json!({"raw": "x", "other": 1}));
        match value {
            RawValue::Map(map) => {
                assert_eq!(map.get("raw"), Some(&RawValue::template("x")));
                assert_eq!(map.get("other"), Some(&RawValue::literal(1)));
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_deferred_equality_is_identity() {
        let d = Deferred::new(["A"], |_| Ok(Value::Null));
        let same = d.clone();
        let other = Deferred::new(["A"], |_| Ok(Value::Null));
        assert_eq!(d, same);
        assert_ne!(d, other);
    }

    #[test]
    fn test_describe_deferred() {
        let d = Deferred::new(["USE_SSL"], |_| Ok(Value::Null)).named("server_protocol");
        assert_eq!(RawValue::from(d).describe(), "deferred server_protocol(USE_SSL)");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./test/../parent"), "parent");
        assert_eq!(normalize_path("/data//logs/./"), "/data/logs");
        assert_eq!(normalize_path("/../etc"), "/etc");
        assert_eq!(normalize_path("../up/../x"), "../x");
        assert_eq!(normalize_path("a/.."), ".");
        assert_eq!(normalize_path("/"), "/");
    }
}
