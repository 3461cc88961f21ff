//! Layers and the layer store.
//!
//! A layer is one configuration source (built-in defaults, project defaults,
//! an installation file, the environment, local overrides). Layers carry an
//! explicit priority; the store keeps them in insertion order so equal
//! priorities can be broken by "added later wins".

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::LayerError;
use crate::merge::{merge, MergedMapping};
use crate::value::RawValue;

/// A named, prioritized mapping from setting name to raw value.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    name: String,
    priority: i32,
    values: BTreeMap<String, RawValue>,
}

impl Layer {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            values: BTreeMap::new(),
        }
    }

    pub fn from_map(
        name: impl Into<String>,
        priority: i32,
        values: BTreeMap<String, RawValue>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            values,
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RawValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered collection of layers for one configuration load.
///
/// Layers are immutable once added.
#[derive(Debug, Clone, Default)]
pub struct LayerStore {
    layers: Vec<Layer>,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer built from `mapping`.
    pub fn add_layer(
        &mut self,
        name: impl Into<String>,
        priority: i32,
        mapping: BTreeMap<String, RawValue>,
    ) -> Result<(), LayerError> {
        self.push(Layer::from_map(name, priority, mapping))
    }

    /// Append an already-built layer.
    pub fn push(&mut self, layer: Layer) -> Result<(), LayerError> {
        if self.layers.iter().any(|l| l.name == layer.name) {
            return Err(LayerError::DuplicateLayer(layer.name));
        }
        debug!(
            layer = %layer.name,
            priority = layer.priority,
            keys = layer.len(),
            "added settings layer"
        );
        self.layers.push(layer);
        Ok(())
    }

    /// Union of the keys of every layer.
    pub fn all_keys(&self) -> BTreeSet<&str> {
        self.layers.iter().flat_map(Layer::keys).collect()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Every layer's raw value for `key`, lowest precedence first.
    ///
    /// The last entry is the one the merge selects.
    pub fn history(&self, key: &str) -> Vec<(&Layer, &RawValue)> {
        let mut ordered: Vec<&Layer> = self.layers.iter().collect();
        ordered.sort_by_key(|l| l.priority);
        ordered
            .into_iter()
            .filter_map(|layer| layer.get(key).map(|value| (layer, value)))
            .collect()
    }

    pub fn merge(&self) -> MergedMapping {
        merge(&self.layers)
    }
}
