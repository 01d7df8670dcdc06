//! Pending Overlay Store.
//!
//! Holds overlay values that arrived before the entry they target was
//! declared. Values are kept at their deepest dotted path: a mapping given for
//! `app.db` is stored as fields of `app.db`, nested mappings as deeper paths.
//! When an entry later declares a field whose value was split this way, the
//! subtree is folded back into a single mapping value.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::path::{self, FieldPath};
use crate::source::SourceNode;
use crate::value::Value;

/// Overlays staged per entry path.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PendingStore {
    overlays: BTreeMap<String, IndexMap<String, SourceNode>>,
}

impl PendingStore {
    /// Stages one field value or reference marker for `path`.
    pub(crate) fn stage(&mut self, path: &str, field: &str, node: SourceNode) {
        self.overlays
            .entry(path.to_string())
            .or_default()
            .insert(field.to_string(), node);
    }

    /// Removes and returns every field staged directly at `path`.
    pub(crate) fn take(&mut self, path: &str) -> IndexMap<String, SourceNode> {
        self.overlays.remove(path).unwrap_or_default()
    }

    /// Removes the subtree at `root` and folds it into a mapping value.
    ///
    /// Leaves the store untouched and returns `None` if nothing is staged at
    /// or below `root`, or if the subtree holds a reference marker.
    pub(crate) fn take_subtree(&mut self, root: &str) -> Option<Value> {
        let value = self.subtree(root)?;
        let paths: Vec<String> = self.paths_at_or_below(root).map(str::to_string).collect();
        for path in paths {
            self.overlays.remove(&path);
        }
        Some(value)
    }

    /// Folds the subtree at `root` into a mapping value without removing it.
    #[must_use]
    pub fn subtree(&self, root: &str) -> Option<Value> {
        let mut folded = IndexMap::new();
        let mut found = false;

        for (path, fields) in self.overlays.range(root.to_string()..) {
            if !path::is_at_or_below(path, root) {
                if path.starts_with(root) {
                    // Sibling such as `a.bc` sorting between `a.b` and `a.b.c`.
                    continue;
                }
                break;
            }
            found = true;

            let mut target = &mut folded;
            let relative = path[root.len()..].trim_start_matches('.');
            for segment in relative.split('.').filter(|s| !s.is_empty()) {
                target = descend(target, segment);
            }
            for (field, node) in fields {
                let SourceNode::Value(value) = node else {
                    return None;
                };
                if !matches!(target.get(field), Some(Value::Mapping(_))) {
                    target.insert(field.clone(), value.clone());
                }
            }
        }

        found.then_some(Value::Mapping(folded))
    }

    /// Looks up a staged attribute, folding split mapping values back.
    #[must_use]
    pub fn lookup(&self, target: &FieldPath) -> Option<SourceNode> {
        if let Some(node) = self
            .overlays
            .get(&target.path)
            .and_then(|fields| fields.get(&target.attribute))
        {
            return Some(node.clone());
        }

        self.subtree(&target.to_string()).map(SourceNode::Value)
    }

    /// Returns the node staged for one field, if any.
    #[must_use]
    pub fn get(&self, path: &str, field: &str) -> Option<&SourceNode> {
        self.overlays.get(path).and_then(|fields| fields.get(field))
    }

    /// Returns `true` if any value is staged at `path` or below it.
    #[must_use]
    pub fn contains_at_or_below(&self, root: &str) -> bool {
        self.paths_at_or_below(root).next().is_some()
    }

    /// Returns `true` if a reference marker is staged at `root` or below it.
    #[must_use]
    pub fn contains_reference_at_or_below(&self, root: &str) -> bool {
        self.paths_at_or_below(root)
            .filter_map(|path| self.overlays.get(path))
            .any(|fields| fields.values().any(SourceNode::contains_reference))
    }

    /// Iterates over every staged reference marker and its target.
    pub fn references(&self) -> impl Iterator<Item = (FieldPath, &FieldPath)> {
        self.overlays.iter().flat_map(|(path, fields)| {
            fields.iter().filter_map(move |(field, node)| match node {
                SourceNode::Reference(target) => Some((FieldPath::new(path.as_str(), field.as_str()), target)),
                SourceNode::Value(_) | SourceNode::Mapping(_) => None,
            })
        })
    }

    /// Iterates over staged entry paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.overlays.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    /// Number of entry paths with staged values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub(crate) fn clear(&mut self) {
        self.overlays.clear();
    }

    fn paths_at_or_below<'a>(&'a self, root: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.overlays
            .range(root.to_string()..)
            .map(|(path, _)| path.as_str())
            .take_while(move |path| path.starts_with(root))
            .filter(move |path| path::is_at_or_below(path, root))
    }
}

fn descend<'a>(map: &'a mut IndexMap<String, Value>, segment: &str) -> &'a mut IndexMap<String, Value> {
    let slot = map
        .entry(segment.to_string())
        .or_insert_with(|| Value::Mapping(IndexMap::new()));
    if !matches!(slot, Value::Mapping(_)) {
        *slot = Value::Mapping(IndexMap::new());
    }
    let Value::Mapping(children) = slot else {
        unreachable!("slot was just replaced by a mapping");
    };
    children
}
