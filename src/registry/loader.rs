//! Loading configuration sources into a registry.
//!
//! A load runs in two phases. The planning phase walks the parsed tree
//! against the registry without modifying anything and fails on the first
//! malformed node; only a fully planned source reaches the apply phase.
//! Reference resolution and required-field validation follow application
//! and are not rolled back on failure.

use std::fmt;
use std::io::Read;
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::path::{self, FieldPath};
use crate::source::{Format, SourceNode, SourceTree};
use crate::value::Value;

use super::Registry;

/// Options for a single load call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Source format; `None` picks it from the file extension (YAML for streams).
    pub format: Option<Format>,
    /// Resolve queued `!REF` markers once the source has been applied.
    pub resolve_references: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            format: None,
            resolve_references: true,
        }
    }
}

impl LoadOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the source format.
    #[must_use]
    pub const fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Leaves markers queued until [`Registry::resolve_references`] is called.
    ///
    /// Entries still holding a marker after the load are not validated; they
    /// join the unchecked set instead.
    #[must_use]
    pub const fn defer_references(mut self) -> Self {
        self.resolve_references = false;
        self
    }
}

/// Summary of one load call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Fields of registered entries that were overwritten or marked.
    pub applied: usize,
    /// Fields staged for entries that are not declared yet.
    pub staged: usize,
    /// Reference markers resolved after application.
    pub resolved: usize,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} applied, {} staged, {} references resolved",
            self.applied, self.staged, self.resolved
        )
    }
}

/// One planned change to the registry.
#[derive(Debug)]
enum Op {
    /// Overwrite a field of a registered entry.
    Assign {
        path: String,
        field: String,
        value: Value,
    },
    /// Put a reference placeholder in a field of a registered entry.
    Mark {
        path: String,
        field: String,
        target: FieldPath,
    },
    /// Keep a field for an entry that is not declared yet.
    Stage {
        path: String,
        field: String,
        node: SourceNode,
    },
}

impl Registry {
    /// Reads a configuration file and applies it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileRead`] if the file cannot be read, otherwise see
    /// [`Self::load_tree_with`].
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<LoadReport> {
        self.load_with(path, LoadOptions::default())
    }

    /// Reads a configuration file and applies it with explicit options.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn load_with(&mut self, path: impl AsRef<Path>, options: LoadOptions) -> Result<LoadReport> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let format = options.format.unwrap_or_else(|| Format::from_path(path));
        info!("Loading configuration from {} as {format:?}", path.display());

        let tree = format.parse(&content)?;
        self.load_tree_with(tree, options)
    }

    /// Reads a YAML source from a stream and applies it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamRead`] if the stream cannot be read, otherwise
    /// see [`Self::load_tree_with`].
    pub fn load_stream(&mut self, reader: impl Read) -> Result<LoadReport> {
        self.load_stream_with(reader, LoadOptions::default())
    }

    /// Reads a source from a stream and applies it with explicit options.
    ///
    /// # Errors
    ///
    /// See [`Self::load_stream`].
    pub fn load_stream_with(&mut self, mut reader: impl Read, options: LoadOptions) -> Result<LoadReport> {
        let mut content = String::new();
        reader.read_to_string(&mut content).map_err(Error::StreamRead)?;

        let tree = options.format.unwrap_or_default().parse(&content)?;
        self.load_tree_with(tree, options)
    }

    /// Applies an already parsed source.
    ///
    /// # Errors
    ///
    /// See [`Self::load_tree_with`].
    pub fn load_tree(&mut self, tree: SourceTree) -> Result<LoadReport> {
        self.load_tree_with(tree, LoadOptions::default())
    }

    /// Applies an already parsed source with explicit options.
    ///
    /// Fields of registered entries are overwritten, fields of undeclared
    /// entries are staged. Queued markers are then resolved, and every
    /// entry that received a value and has `check_attributes` enabled is
    /// validated again.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedSource`] if the tree does not fit the registry;
    ///   nothing has been applied in that case
    /// - [`Error::UnresolvedReference`] or [`Error::ReferenceCycle`] from resolution
    /// - [`Error::MissingAttributes`] if a touched entry is still incomplete
    pub fn load_tree_with(&mut self, tree: SourceTree, options: LoadOptions) -> Result<LoadReport> {
        let mut ops = Vec::new();
        self.plan("", tree.into_root(), &mut ops)?;

        let mut report = LoadReport::default();
        let touched = self.apply(ops, &mut report);

        if options.resolve_references {
            report.resolved = self.resolve_references()?;
        }

        for path in &touched {
            let entry = self.lookup(path)?;
            if !entry.check_attributes() {
                continue;
            }
            let waiting = entry
                .fields()
                .any(|(_, field)| field.pending_reference().is_some());
            if waiting && !options.resolve_references {
                self.unchecked.insert(path.clone());
                continue;
            }
            self.check_attributes(path)?;
        }

        info!("Configuration loaded: {report}");
        Ok(report)
    }

    /// Walks `children` of the node at `prefix`, collecting the changes they imply.
    fn plan(&self, prefix: &str, children: IndexMap<String, SourceNode>, ops: &mut Vec<Op>) -> Result<()> {
        let owner = (!prefix.is_empty())
            .then(|| self.entries.get(prefix))
            .flatten();

        for (key, node) in children {
            let full = path::join(prefix, &key);

            if let SourceNode::Mapping(grandchildren) = node {
                let is_field_value = owner.is_some_and(|entry| entry.declares(&key))
                    && !self.has_entry_at_or_below(&full);
                if !is_field_value {
                    self.plan(&full, grandchildren, ops)?;
                    continue;
                }

                let Some(value) = SourceNode::Mapping(grandchildren).into_value() else {
                    return Err(super::nested_reference(&full));
                };
                ops.push(Op::Assign {
                    path: prefix.to_string(),
                    field: key,
                    value,
                });
                continue;
            }

            if prefix.is_empty() {
                warn!("Ignoring top-level key '{key}': entry paths need a mapping of fields");
                continue;
            }
            if self.entries.contains_key(&full) {
                return Err(Error::malformed(format!(
                    "'{full}' is a registered entry and must be given a mapping of fields"
                )));
            }

            let op = match (owner, node) {
                (Some(_), SourceNode::Value(value)) => Op::Assign {
                    path: prefix.to_string(),
                    field: key,
                    value,
                },
                (Some(_), SourceNode::Reference(target)) => Op::Mark {
                    path: prefix.to_string(),
                    field: key,
                    target,
                },
                (_, node) => Op::Stage {
                    path: prefix.to_string(),
                    field: key,
                    node,
                },
            };
            ops.push(op);
        }

        Ok(())
    }

    /// Executes planned changes; returns the entries that received a value.
    fn apply(&mut self, ops: Vec<Op>, report: &mut LoadReport) -> IndexSet<String> {
        let mut touched = IndexSet::new();

        for op in ops {
            match op {
                Op::Assign { path, field, value } => {
                    let Some(entry) = self.entries.get_mut(&path) else {
                        continue;
                    };
                    debug!(path = %path, field = %field, "Applying overlay");
                    entry.set_value(&field, value);
                    self.markers.shift_remove(&FieldPath::new(path.as_str(), field));
                    report.applied += 1;
                    touched.insert(path);
                }
                Op::Mark { path, field, target } => {
                    let Some(entry) = self.entries.get_mut(&path) else {
                        continue;
                    };
                    debug!(path = %path, field = %field, target = %target, "Queueing reference");
                    entry.set_reference(&field, target);
                    self.markers.insert(FieldPath::new(path.as_str(), field));
                    report.applied += 1;
                    touched.insert(path);
                }
                Op::Stage { path, field, node } => {
                    debug!(path = %path, field = %field, "Staging overlay for undeclared entry");
                    self.pending.stage(&path, &field, node);
                    report.staged += 1;
                }
            }
        }

        touched
    }
}
