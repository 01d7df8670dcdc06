//! Configuration sources.
//!
//! A source is parsed in full into a [`SourceTree`] before anything is applied
//! to a registry. This module provides:
//! - The parsed node type ([`SourceNode`]) with reference markers
//! - Dotted-key folding ([`SourceTree`])
//! - Format selection ([`Format`]) for the YAML and TOML parsers
//!
//! # Key Folding
//!
//! Keys may be fully nested, partially collapsed, or fully collapsed:
//!
//! ```yaml
//! app:
//!   db:
//!     host: a
//! app.db:
//!   port: 5432
//! app.db.user: admin
//! ```
//!
//! All three forms fold into the same tree. Mappings given for the same key
//! are merged recursively; for any other value the last definition wins.
//!
//! # References
//!
//! YAML marks a reference with the `!REF` tag, TOML with a string starting
//! with `!REF `. In both formats a reference is only accepted as a field
//! value, never inside a sequence.

mod toml;
mod yaml;

#[cfg(test)]
mod yaml_tests;

use std::path::Path;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::path::{self, FieldPath};
use crate::value::Value;

/// Prefix that marks a reference in formats without tags.
pub const REFERENCE_PREFIX: &str = "!REF ";

/// One node of a parsed configuration source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceNode {
    /// A concrete value.
    Value(Value),
    /// An unresolved `!REF target.path.attribute` marker.
    Reference(FieldPath),
    /// A nested mapping whose keys extend the dotted path.
    Mapping(IndexMap<String, Self>),
}

impl SourceNode {
    /// Creates a reference marker from `target.path.attribute`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSource`] if the target is not a dotted path
    /// naming an attribute.
    pub fn reference(target: &str) -> Result<Self> {
        FieldPath::parse(target).map(Self::Reference)
    }

    /// Returns `true` if this node or any node beneath it is a reference.
    #[must_use]
    pub fn contains_reference(&self) -> bool {
        match self {
            Self::Value(_) => false,
            Self::Reference(_) => true,
            Self::Mapping(children) => children.values().any(Self::contains_reference),
        }
    }

    /// Converts the node into a plain value.
    ///
    /// Returns `None` if a reference occurs anywhere in the node.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Reference(_) => None,
            Self::Mapping(children) => children
                .into_iter()
                .map(|(key, child)| child.into_value().map(|value| (key, value)))
                .collect::<Option<IndexMap<_, _>>>()
                .map(Value::Mapping),
        }
    }
}

impl From<Value> for SourceNode {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl Serialize for SourceNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(value) => value.serialize(serializer),
            Self::Reference(target) => {
                serializer.collect_str(&format_args!("{REFERENCE_PREFIX}{target}"))
            }
            Self::Mapping(children) => children.serialize(serializer),
        }
    }
}

/// A whole configuration source with every dotted key folded into nesting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTree {
    root: IndexMap<String, SourceNode>,
}

impl SourceTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from a parsed document root.
    ///
    /// A root that is not a mapping configures nothing and yields an empty tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSource`] if a key is not a valid dotted path.
    pub fn from_root(root: SourceNode) -> Result<Self> {
        let mut tree = Self::new();

        match root {
            SourceNode::Mapping(children) => {
                for (key, node) in children {
                    tree.insert(&key, node)?;
                }
            }
            SourceNode::Value(Value::Null) => {}
            other => {
                tracing::warn!(
                    "Configuration root is not a mapping ({}); nothing to apply",
                    describe(&other)
                );
            }
        }

        Ok(tree)
    }

    /// Inserts `node` at the dotted `key`, merging mappings recursively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSource`] if `key`, or a key nested in `node`,
    /// is not a valid dotted path.
    pub fn insert(&mut self, key: &str, node: SourceNode) -> Result<()> {
        path::validate(key).map_err(|_| Error::malformed(format!("invalid key '{key}'")))?;

        let node = normalize(node)?;
        let mut segments = key.split('.');
        let mut map = &mut self.root;
        let mut leaf = segments.next().unwrap_or(key);

        for next in segments {
            let slot = map
                .entry(leaf.to_string())
                .or_insert_with(|| SourceNode::Mapping(IndexMap::new()));
            if !matches!(slot, SourceNode::Mapping(_)) {
                *slot = SourceNode::Mapping(IndexMap::new());
            }
            let SourceNode::Mapping(children) = slot else {
                unreachable!("slot was just replaced by a mapping");
            };
            map = children;
            leaf = next;
        }

        merge_into(map, leaf, node);
        Ok(())
    }

    /// Sets `field` of the entry at `path`; a convenience over [`Self::insert`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSource`] if the resulting key is invalid.
    pub fn set(&mut self, path: &str, field: &str, node: impl Into<SourceNode>) -> Result<()> {
        self.insert(&path::join(path, field), node.into())
    }

    /// Returns `true` if the tree holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Iterates over the top-level keys and their nodes.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SourceNode)> {
        self.root.iter()
    }

    pub(crate) fn into_root(self) -> IndexMap<String, SourceNode> {
        self.root
    }
}

/// Re-inserts nested keys so that dotted keys at any depth are folded.
fn normalize(node: SourceNode) -> Result<SourceNode> {
    match node {
        SourceNode::Mapping(children) => {
            let mut nested = SourceTree::new();
            for (key, child) in children {
                nested.insert(&key, child)?;
            }
            Ok(SourceNode::Mapping(nested.root))
        }
        other => Ok(other),
    }
}

fn merge_into(map: &mut IndexMap<String, SourceNode>, key: &str, node: SourceNode) {
    match (map.get_mut(key), node) {
        (Some(SourceNode::Mapping(existing)), SourceNode::Mapping(incoming)) => {
            for (child_key, child) in incoming {
                merge_into(existing, &child_key, child);
            }
        }
        (_, node) => {
            map.insert(key.to_string(), node);
        }
    }
}

fn describe(node: &SourceNode) -> &'static str {
    match node {
        SourceNode::Value(value) => value.type_name(),
        SourceNode::Reference(_) => "reference",
        SourceNode::Mapping(_) => "mapping",
    }
}

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// YAML; references use the `!REF` tag.
    #[default]
    Yaml,
    /// TOML; references are strings starting with `!REF `.
    Toml,
}

impl Format {
    /// Picks the format from a file extension: `.toml` is TOML, anything else YAML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }

    /// Parses `text` into a folded tree.
    ///
    /// # Errors
    ///
    /// Returns a parse error or [`Error::MalformedSource`] if the document
    /// cannot be represented.
    pub fn parse(self, text: &str) -> Result<SourceTree> {
        let root = match self {
            Self::Yaml => yaml::parse(text)?,
            Self::Toml => toml::parse(text)?,
        };

        SourceTree::from_root(root)
    }
}
