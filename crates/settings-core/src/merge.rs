//! Merge engine
//!
//! Flattens layers into one mapping:
//! - Highest priority wins per key
//! - Equal priorities: the layer added later wins
//! - No deep merge: a map value replaces the lower layer's map entirely

use std::collections::BTreeMap;

use crate::layer::Layer;
use crate::value::RawValue;

/// The winning raw value for a key, with the layer it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedEntry {
    pub value: RawValue,
    pub layer: String,
    pub priority: i32,
}

/// Single view across all layers, before resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedMapping {
    entries: BTreeMap<String, MergedEntry>,
}

impl MergedMapping {
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn entry(&self, key: &str) -> Option<&MergedEntry> {
        self.entries.get(key)
    }

    /// Name of the layer whose value won for `key`.
    pub fn source_of(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.layer.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MergedEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merge layers in precedence order (lowest priority first, ties by position).
pub fn merge(layers: &[Layer]) -> MergedMapping {
    let mut ordered: Vec<&Layer> = layers.iter().collect();
    // sort_by_key is stable: equal priorities keep insertion order
    ordered.sort_by_key(|l| l.priority());

    let mut entries = BTreeMap::new();
    for layer in ordered {
        for (key, value) in layer.iter() {
            // later layers overwrite earlier ones
            entries.insert(
                key.to_string(),
                MergedEntry {
                    value: value.clone(),
                    layer: layer.name().to_string(),
                    priority: layer.priority(),
                },
            );
        }
    }

    MergedMapping { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_higher_priority_wins() {
        let layers = vec![
            Layer::new("low", 0).with("X", "1"),
            Layer::new("high", 10).with("X", "2"),
        ];
        let merged = merge(&layers);
        assert_eq!(merged.get("X"), Some(&RawValue::template("2")));
        assert_eq!(merged.source_of("X"), Some("high"));
    }

    #[test]
    fn test_priority_beats_insertion_order() {
        let layers = vec![
            Layer::new("high", 10).with("X", "2"),
            Layer::new("low", 0).with("X", "1"),
        ];
        let merged = merge(&layers);
        assert_eq!(merged.get("X"), Some(&RawValue::template("2")));
    }

    #[test]
    fn test_tie_broken_by_later_layer() {
        let layers = vec![
            Layer::new("first", 5).with("X", "a"),
            Layer::new("second", 5).with("X", "b"),
        ];
        let merged = merge(&layers);
        assert_eq!(merged.get("X"), Some(&RawValue::template("b")));
        assert_eq!(merged.entry("X").unwrap().layer, "second");
    }

    #[test]
    fn test_keys_from_all_layers() {
        let layers = vec![
            Layer::new("a", 0).with("X", 1).with("Y", 2),
            Layer::new("b", 1).with("Z", 3),
        ];
        let merged = merge(&layers);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.source_of("Y"), Some("a"));
        assert_eq!(merged.source_of("Z"), Some("b"));
    }

    #[test]
    fn test_map_values_replace_not_deep_merge() {
        let layers = vec![
            Layer::new("a", 0).with("DB", RawValue::from(json!({"host": "h", "port": 1}))),
            Layer::new("b", 1).with("DB", RawValue::from(json!({"host": "other"}))),
        ];
        let merged = merge(&layers);
        match merged.get("DB") {
            Some(RawValue::Map(map)) => {
                assert_eq!(map.len(), 1);
                assert_eq!(map.get("host"), Some(&RawValue::template("other")));
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_tie_across_many_layers_keeps_last() {
        let layers: Vec<Layer> = (0..5)
            .map(|i| Layer::new(format!("l{}", i), 7).with("X", i))
            .collect();
        let merged = merge(&layers);
        assert_eq!(merged.get("X"), Some(&RawValue::literal(4)));
        assert_eq!(merged.source_of("X"), Some("l4"));
    }

    #[test]
    fn test_empty_layers() {
        let merged = merge(&[]);
        assert!(merged.is_empty());
    }
}
