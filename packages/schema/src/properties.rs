//! Nested property trees (`border.topColor`, `padding.horizontal`, ...)

use crate::error::SchemaError;
use crate::property::Property;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Mapping from property name to a value or a nested group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, PropertyEntry>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyEntry {
    Leaf(Property),
    Group(Properties),
}

/// Dotted path into a [`Properties`] tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyPath(Vec<String>);

impl PropertyPath {
    pub fn parse(path: &str) -> Result<Self, SchemaError> {
        if path.is_empty() {
            return Err(SchemaError::InvalidPath(path.to_string()));
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(SchemaError::InvalidPath(path.to_string()));
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyEntry)> {
        self.0.iter()
    }

    pub fn entry(&self, name: &str) -> Option<&PropertyEntry> {
        self.0.get(name)
    }

    /// Builder-style leaf insert at a dotted path
    pub fn with(mut self, path: &str, property: Property) -> Self {
        if let Ok(path) = PropertyPath::parse(path) {
            self.set(&path, property);
        }
        self
    }

    /// Leaf value at `path`; groups and missing entries yield `None`
    pub fn get(&self, path: &PropertyPath) -> Option<&Property> {
        let (last, parents) = path.segments().split_last()?;
        let mut current = self;
        for segment in parents {
            match current.0.get(segment)? {
                PropertyEntry::Group(group) => current = group,
                PropertyEntry::Leaf(_) => return None,
            }
        }
        match current.0.get(last)? {
            PropertyEntry::Leaf(prop) => Some(prop),
            PropertyEntry::Group(_) => None,
        }
    }

    /// Write a leaf, creating (or replacing leaves with) groups along the way
    pub fn set(&mut self, path: &PropertyPath, property: Property) {
        let Some((last, parents)) = path.segments().split_last() else {
            return;
        };
        let mut current = self;
        for segment in parents {
            let entry = current
                .0
                .entry(segment.clone())
                .or_insert_with(|| PropertyEntry::Group(Properties::new()));
            if let PropertyEntry::Leaf(_) = entry {
                *entry = PropertyEntry::Group(Properties::new());
            }
            let PropertyEntry::Group(group) = entry else {
                return;
            };
            current = group;
        }
        current.0.insert(last.clone(), PropertyEntry::Leaf(property));
    }

    /// Remove the leaf or group at `path`, pruning groups left empty.
    /// Returns whether anything was removed.
    pub fn remove(&mut self, path: &PropertyPath) -> bool {
        Self::remove_segments(&mut self.0, path.segments())
    }

    fn remove_segments(map: &mut BTreeMap<String, PropertyEntry>, segments: &[String]) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            return false;
        };
        if rest.is_empty() {
            return map.remove(first).is_some();
        }
        let removed = match map.get_mut(first) {
            Some(PropertyEntry::Group(group)) => Self::remove_segments(&mut group.0, rest),
            _ => false,
        };
        if removed {
            if let Some(PropertyEntry::Group(group)) = map.get(first) {
                if group.is_empty() {
                    map.remove(first);
                }
            }
        }
        removed
    }

    /// Deep merge: leaves in `other` overwrite, groups merge recursively
    pub fn merge(&mut self, other: &Properties) {
        for (name, incoming) in &other.0 {
            match (self.0.get_mut(name), incoming) {
                (Some(PropertyEntry::Group(existing)), PropertyEntry::Group(group)) => {
                    existing.merge(group);
                }
                _ => {
                    self.0.insert(name.clone(), incoming.clone());
                }
            }
        }
    }

    /// Every leaf with its full dotted path, depth-first in key order
    pub fn leaves(&self) -> Vec<(PropertyPath, &Property)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &mut Vec<String>, out: &mut Vec<(PropertyPath, &'a Property)>) {
        for (name, entry) in &self.0 {
            prefix.push(name.clone());
            match entry {
                PropertyEntry::Leaf(prop) => out.push((PropertyPath(prefix.clone()), prop)),
                PropertyEntry::Group(group) => group.collect_leaves(prefix, out),
            }
            prefix.pop();
        }
    }

    /// Rename a top-level or nested key everywhere in the tree
    pub fn rename_key(&mut self, from: &str, to: &str) -> bool {
        let mut changed = false;
        if let Some(entry) = self.0.remove(from) {
            self.0.entry(to.to_string()).or_insert(entry);
            changed = true;
        }
        for entry in self.0.values_mut() {
            if let PropertyEntry::Group(group) = entry {
                changed |= group.rename_key(from, to);
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Dimension;
    use serde_json::json;

    fn path(p: &str) -> PropertyPath {
        PropertyPath::parse(p).unwrap()
    }

    #[test]
    fn test_nested_get_and_set() {
        let mut props = Properties::new();
        props.set(&path("border.topColor"), Property::preset("primary"));
        props.set(&path("content"), Property::exact("Hello"));

        assert_eq!(props.get(&path("border.topColor")), Some(&Property::preset("primary")));
        assert_eq!(props.get(&path("content")), Some(&Property::exact("Hello")));
        assert_eq!(props.get(&path("border")), None);
        assert_eq!(props.get(&path("border.bottomColor")), None);
    }

    #[test]
    fn test_remove_prunes_empty_groups() {
        let mut props = Properties::new().with("border.topColor", Property::preset("primary"));

        assert!(props.remove(&path("border.topColor")));
        assert!(props.is_empty());
        assert!(!props.remove(&path("border.topColor")));
    }

    #[test]
    fn test_deep_merge() {
        let mut base = Properties::new()
            .with("padding.top", Property::exact(Dimension::px(4.0)))
            .with("padding.bottom", Property::exact(Dimension::px(4.0)));
        let patch = Properties::new().with("padding.top", Property::exact(Dimension::px(8.0)));

        base.merge(&patch);

        assert_eq!(base.get(&path("padding.top")), Some(&Property::exact(Dimension::px(8.0))));
        assert_eq!(base.get(&path("padding.bottom")), Some(&Property::exact(Dimension::px(4.0))));
    }

    #[test]
    fn test_tree_json_shape() {
        let props: Properties = serde_json::from_value(json!({
            "content": { "type": "exact", "value": "Button" },
            "border": {
                "topColor": { "type": "theme.categorical", "value": "@swatch.primary" }
            }
        }))
        .unwrap();

        assert_eq!(props.leaves().len(), 2);
        assert!(matches!(props.entry("border"), Some(PropertyEntry::Group(_))));
    }

    #[test]
    fn test_invalid_paths() {
        assert!(PropertyPath::parse("").is_err());
        assert!(PropertyPath::parse("border..top").is_err());
        assert!(PropertyPath::parse(".top").is_err());
    }

    #[test]
    fn test_rename_key_nested() {
        let mut props = Properties::new()
            .with("cellAlignment", Property::preset("start"))
            .with("header.cellAlignment", Property::preset("center"));

        assert!(props.rename_key("cellAlignment", "cellAlign"));
        assert_eq!(props.get(&path("cellAlign")), Some(&Property::preset("start")));
        assert_eq!(props.get(&path("header.cellAlign")), Some(&Property::preset("center")));
    }
}
