//! Template strings with `{NAME}` placeholders.
//!
//! ## Syntax
//!
//! - `{NAME}` - replaced by the resolved value of the setting `NAME`.
//! - `{{` and `}}` - literal braces.
//!
//! Placeholder names follow `[A-Za-z_][A-Za-z0-9_]*`. Format specs
//! (`{X:>4}`) and attribute access (`{X.y}`) are rejected.
//!
//! ```text
//! "{LOCAL_PATH}/logs"   -> "/data/logs"   (if LOCAL_PATH=/data)
//! "{{not a name}}"      -> "{not a name}"
//! ```

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde_json::Value;

/// Malformed template syntax.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason} at offset {position}")]
pub struct TemplateError {
    /// Byte offset of the offending character.
    pub position: usize,
    pub reason: String,
}

impl TemplateError {
    fn new(position: usize, reason: impl Into<String>) -> Self {
        Self {
            position,
            reason: reason.into(),
        }
    }
}

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("placeholder name pattern is valid")
    })
}

/// Returns true if `name` can be used as a placeholder.
pub fn is_valid_name(name: &str) -> bool {
    name_pattern().is_match(name)
}

impl Template {
    /// Parse a template string.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    // {{ -> literal {
                    if let Some(&(_, '{')) = chars.peek() {
                        chars.next();
                        literal.push('{');
                        continue;
                    }

                    let mut name = String::new();
                    let mut closed = false;
                    for (inner_pos, ch) in chars.by_ref() {
                        match ch {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => {
                                return Err(TemplateError::new(
                                    inner_pos,
                                    "unexpected '{' inside placeholder",
                                ));
                            }
                            _ => name.push(ch),
                        }
                    }

                    if !closed {
                        return Err(TemplateError::new(pos, "expected '}' before end of string"));
                    }
                    if name.is_empty() {
                        return Err(TemplateError::new(pos, "empty placeholder"));
                    }
                    if !is_valid_name(&name) {
                        return Err(TemplateError::new(
                            pos,
                            format!("invalid placeholder name {:?}", name),
                        ));
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => {
                    // }} -> literal }
                    if let Some(&(_, '}')) = chars.peek() {
                        chars.next();
                        literal.push('}');
                    } else {
                        return Err(TemplateError::new(pos, "single '}' encountered"));
                    }
                }
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The original template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names, in order of appearance (duplicates included).
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// True if the template has no placeholders.
    pub fn is_literal(&self) -> bool {
        self.placeholders().next().is_none()
    }

    /// Substitute placeholders with rendered values.
    ///
    /// Names missing from `values` render as the empty string; the resolver
    /// always supplies every placeholder.
    pub fn render(&self, values: &BTreeMap<String, Value>) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    if let Some(value) = values.get(name) {
                        out.push_str(&render_value(value));
                    }
                }
            }
        }
        out
    }
}

/// Text form of a resolved value when substituted into a template.
///
/// Strings are inserted verbatim, null becomes the empty string, everything
/// else uses its compact JSON text.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_parse_placeholders() {
        let t = Template::parse("{LOCAL_PATH}/logs/{NAME}.log").unwrap();
        let names: Vec<&str> = t.placeholders().collect();
        assert_eq!(names, vec!["LOCAL_PATH", "NAME"]);
        assert!(!t.is_literal());
    }

    #[test]
    fn test_render_substitutes() {
        let t = Template::parse("{LOCAL_PATH}/logs").unwrap();
        let out = t.render(&values(&[("LOCAL_PATH", json!("/data"))]));
        assert_eq!(out, "/data/logs");
    }

    #[test]
    fn test_escaped_braces() {
        let t = Template::parse("{{X}} and }}").unwrap();
        assert!(t.is_literal());
        assert_eq!(t.render(&BTreeMap::new()), "{X} and }");
    }

    #[test]
    fn test_render_non_string_values() {
        let t = Template::parse("{A}:{B}:{C}:{D}").unwrap();
        let out = t.render(&values(&[
            ("A", json!(8000)),
            ("B", json!(true)),
            ("C", Value::Null),
            ("D", json!(["x", 1])),
        ]));
        assert_eq!(out, "8000:true::[\"x\",1]");
    }

    #[test]
    fn test_single_closing_brace_is_error() {
        let err = Template::parse("abc}def").unwrap_err();
        assert_eq!(err.position, 3);
        assert!(err.reason.contains("single '}'"));
    }

    #[test]
    fn test_unclosed_placeholder_is_error() {
        let err = Template::parse("prefix {NAME").unwrap_err();
        assert_eq!(err.position, 7);
        assert!(err.reason.contains("expected '}'"));
    }

    #[test]
    fn test_empty_placeholder_is_error() {
        let err = Template::parse("a{}b").unwrap_err();
        assert_eq!(err.reason, "empty placeholder");
    }

    #[test]
    fn test_format_spec_rejected() {
        assert!(Template::parse("{PORT:>5}").is_err());
        assert!(Template::parse("{X.attr}").is_err());
        assert!(Template::parse("{1ABC}").is_err());
    }

    #[test]
    fn test_nested_brace_rejected() {
        let err = Template::parse("{A{B}}").unwrap_err();
        assert_eq!(err.position, 2);
    }

    #[test]
    fn test_plain_string_is_literal() {
        let t = Template::parse("no placeholders here").unwrap();
        assert!(t.is_literal());
        assert_eq!(t.segments().len(), 1);
    }
}
