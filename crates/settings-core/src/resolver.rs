//! Dynamic resolver
//!
//! Walks the merged mapping depth-first, evaluating templates, references,
//! deferred expressions, paths and composite values. Results are memoized in
//! a [`ResolutionCache`] for the lifetime of one configuration load, so every
//! dependent sees the same value. A stack of keys being resolved detects
//! cycles.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::ResolveError;
use crate::merge::MergedMapping;
use crate::template::Template;
use crate::value::{normalize_path, Dependencies, PathKind, RawValue};

/// Fully resolved values, populated on demand.
///
/// Once a key is cached its value is final for the load.
#[derive(Debug, Clone, Default)]
pub struct ResolutionCache {
    values: BTreeMap<String, Arc<Value>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Arc<Value>> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Value>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn insert(&mut self, key: &str, value: Arc<Value>) {
        self.values.insert(key.to_string(), value);
    }

    fn into_settings(self) -> ResolvedSettings {
        let values = self
            .values
            .into_iter()
            .map(|(k, v)| (k, Arc::try_unwrap(v).unwrap_or_else(|shared| (*shared).clone())))
            .collect();
        ResolvedSettings { values }
    }
}

/// Resolve one setting against `merged`, memoizing into `cache`.
pub fn resolve(
    key: &str,
    merged: &MergedMapping,
    cache: &mut ResolutionCache,
) -> Result<Arc<Value>, ResolveError> {
    Walk::new(merged, cache).setting(key, None)
}

/// Resolve every key of `merged`, in sorted key order.
pub fn resolve_all(merged: &MergedMapping) -> Result<ResolvedSettings, ResolveError> {
    let mut resolver = Resolver::new(merged);
    resolver.resolve_remaining()?;
    Ok(resolver.cache.into_settings())
}

/// Lazy resolution handle for one configuration load.
///
/// Keys are resolved on first access; [`Resolver::finish`] resolves the rest.
#[derive(Debug)]
pub struct Resolver<'m> {
    merged: &'m MergedMapping,
    cache: ResolutionCache,
}

impl<'m> Resolver<'m> {
    pub fn new(merged: &'m MergedMapping) -> Self {
        Self {
            merged,
            cache: ResolutionCache::new(),
        }
    }

    pub fn resolve(&mut self, key: &str) -> Result<Arc<Value>, ResolveError> {
        resolve(key, self.merged, &mut self.cache)
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn merged(&self) -> &'m MergedMapping {
        self.merged
    }

    /// Resolve whatever is left and return the final mapping.
    pub fn finish(mut self) -> Result<ResolvedSettings, ResolveError> {
        self.resolve_remaining()?;
        Ok(self.cache.into_settings())
    }

    fn resolve_remaining(&mut self) -> Result<(), ResolveError> {
        let merged = self.merged;
        for key in merged.keys() {
            if !self.cache.contains(key) {
                resolve(key, merged, &mut self.cache)?;
            }
        }
        Ok(())
    }
}

/// One depth-first resolution walk.
struct Walk<'a> {
    merged: &'a MergedMapping,
    cache: &'a mut ResolutionCache,
    /// Keys currently being resolved, outermost first.
    stack: Vec<String>,
}

impl<'a> Walk<'a> {
    fn new(merged: &'a MergedMapping, cache: &'a mut ResolutionCache) -> Self {
        Self {
            merged,
            cache,
            stack: Vec::new(),
        }
    }

    fn setting(&mut self, key: &str, referrer: Option<&str>) -> Result<Arc<Value>, ResolveError> {
        if let Some(value) = self.cache.get(key) {
            return Ok(Arc::clone(value));
        }

        if let Some(start) = self.stack.iter().position(|k| k == key) {
            let mut cycle = self.stack[start..].to_vec();
            cycle.push(key.to_string());
            return Err(ResolveError::CyclicDependency { cycle });
        }

        let merged = self.merged;
        let raw = merged.get(key).ok_or_else(|| ResolveError::MissingSetting {
            key: key.to_string(),
            referrer: referrer.map(str::to_string),
        })?;

        self.stack.push(key.to_string());
        let result = self.evaluate(key, raw);
        self.stack.pop();

        let value = Arc::new(result?);
        trace!(setting = key, value = %value, "resolved setting");
        self.cache.insert(key, Arc::clone(&value));
        Ok(value)
    }

    /// Evaluate `raw`, which belongs to the setting `key`.
    fn evaluate(&mut self, key: &str, raw: &RawValue) -> Result<Value, ResolveError> {
        match raw {
            RawValue::Literal(value) => Ok(value.clone()),
            RawValue::Raw(text) => Ok(Value::String(text.clone())),
            RawValue::Template(text) => self.template(key, text).map(Value::String),
            RawValue::Reference(name) | RawValue::Expand(name) => {
                Ok((*self.setting(name, Some(key))?).clone())
            }
            RawValue::Deferred(deferred) => {
                let mut dependencies = Dependencies::new();
                for name in deferred.dependencies() {
                    let value = self.setting(name, Some(key))?;
                    dependencies.insert(name.clone(), (*value).clone());
                }
                deferred
                    .evaluate(&dependencies)
                    .map_err(|message| ResolveError::Evaluation {
                        key: key.to_string(),
                        message,
                    })
            }
            RawValue::Path { kind, value } => match self.evaluate(key, value)? {
                Value::Null => Ok(Value::Null),
                Value::String(path) => {
                    let mut normalized = normalize_path(&path);
                    if *kind == PathKind::Directory && !normalized.ends_with('/') {
                        normalized.push('/');
                    }
                    Ok(Value::String(normalized))
                }
                other => Err(ResolveError::Evaluation {
                    key: key.to_string(),
                    message: format!("expected a path string, got {}", other),
                }),
            },
            RawValue::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    if let RawValue::Expand(name) = item {
                        match &*self.setting(name, Some(key))? {
                            Value::Array(spliced) => out.extend(spliced.iter().cloned()),
                            other => {
                                return Err(ResolveError::Evaluation {
                                    key: key.to_string(),
                                    message: format!(
                                        "cannot expand `{}` into a list: not a list ({})",
                                        name, other
                                    ),
                                })
                            }
                        }
                    } else {
                        out.push(self.evaluate(key, item)?);
                    }
                }
                Ok(Value::Array(out))
            }
            RawValue::Map(entries) => {
                let mut out = Map::new();
                // expansions first so explicit entries win
                for (_, item) in entries.iter().filter(|(_, v)| matches!(v, RawValue::Expand(_))) {
                    if let RawValue::Expand(name) = item {
                        match &*self.setting(name, Some(key))? {
                            Value::Object(spliced) => {
                                out.extend(spliced.iter().map(|(k, v)| (k.clone(), v.clone())))
                            }
                            other => {
                                return Err(ResolveError::Evaluation {
                                    key: key.to_string(),
                                    message: format!(
                                        "cannot expand `{}` into a map: not a map ({})",
                                        name, other
                                    ),
                                })
                            }
                        }
                    }
                }
                for (entry_key, item) in entries {
                    if matches!(item, RawValue::Expand(_)) {
                        continue;
                    }
                    let resolved_key = self.template(key, entry_key)?;
                    let resolved = self.evaluate(key, item)?;
                    out.insert(resolved_key, resolved);
                }
                Ok(Value::Object(out))
            }
        }
    }

    fn template(&mut self, key: &str, text: &str) -> Result<String, ResolveError> {
        let template = Template::parse(text).map_err(|e| ResolveError::TemplateSyntax {
            key: key.to_string(),
            template: text.to_string(),
            position: e.position,
            reason: e.reason,
        })?;

        let mut values = BTreeMap::new();
        for name in template.placeholders() {
            if values.contains_key(name) {
                continue;
            }
            let value = self.setting(name, Some(key))?;
            values.insert(name.to_string(), (*value).clone());
        }
        Ok(template.render(&values))
    }
}

/// The final, fully resolved mapping of one configuration load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedSettings {
    values: BTreeMap<String, Value>,
}

impl ResolvedSettings {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.as_u64())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All settings as one JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.values
    }

    /// Remove repeated entries of a list setting, keeping the first
    /// occurrence. Returns the number of removed entries.
    pub fn dedup_list(&mut self, key: &str) -> usize {
        let Some(Value::Array(items)) = self.values.get_mut(key) else {
            return 0;
        };
        let before = items.len();
        let mut seen: Vec<Value> = Vec::with_capacity(before);
        items.retain(|item| {
            if seen.contains(item) {
                false
            } else {
                seen.push(item.clone());
                true
            }
        });
        before - items.len()
    }
}
