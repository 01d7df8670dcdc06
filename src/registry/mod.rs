//! Entry registry.
//!
//! This module provides:
//! - Entry declaration ([`EntryBuilder`], [`Registry::register`])
//! - Required-field validation ([`Registry::check_attributes`])
//! - Loading of configuration sources ([`Registry::load`], [`LoadOptions`])
//! - `!REF` resolution ([`Registry::resolve_references`])
//!
//! # Declaration Order
//!
//! Sources may be loaded before or after the entries they configure are
//! declared. Values for paths without an entry are staged in the
//! [`PendingStore`] and applied when the entry is registered; values for
//! registered entries are applied immediately.
//!
//! # Lifecycle
//!
//! A registry is created once at start-up and lives for the rest of the
//! program; [`Registry::clear`] resets it between tests. It has no internal
//! locking: callers that declare or load from several threads must wrap it
//! in their own lock.

mod entry;
mod loader;
mod pending;
mod resolver;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

pub use entry::{Entry, EntryBuilder, EntryHandle, Field, FieldDecl, TypeHint};
pub use loader::{LoadOptions, LoadReport};
pub use pending::PendingStore;

use std::collections::BTreeMap;

use indexmap::IndexSet;
use tracing::debug;

use crate::error::{Error, Result};
use crate::path::{self, FieldPath};
use crate::source::SourceNode;

use resolver::Mode;

/// Process-wide store of declared configuration entries.
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<String, Entry>,
    pending: PendingStore,
    /// Fields holding a reference placeholder, in the order they were queued.
    markers: IndexSet<FieldPath>,
    /// Entries whose required-field validation is still outstanding.
    unchecked: IndexSet<String>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a declared entry.
    ///
    /// Any overlay staged for the entry's path is applied first. Reference
    /// markers among those values are resolved right away when their target
    /// is already known; otherwise they stay queued for the next load or
    /// [`Self::resolve_references`] call. When the builder has
    /// `check_attributes` enabled, required fields are then validated.
    ///
    /// A failed validation leaves the entry registered and unchecked, so a
    /// later load or [`Self::check_attributes`] call can complete it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPath`] if the path or a field name is malformed
    /// - [`Error::PathConflict`] if an entry already exists at the path
    /// - [`Error::MalformedSource`] if a mapping staged for a declared field
    ///   holds a `!REF` marker; nothing is registered in that case
    /// - [`Error::ReferenceCycle`] if an applied marker closes a cycle
    /// - [`Error::MissingAttributes`] if validation finds fields without a value
    pub fn register(&mut self, builder: EntryBuilder) -> Result<EntryHandle> {
        let mut entry = builder.into_entry()?;
        let entry_path = entry.path().to_string();

        if self.entries.contains_key(&entry_path) {
            return Err(Error::PathConflict { path: entry_path });
        }

        self.reject_nested_references(&entry)?;
        let applied = self.apply_pending(&mut entry);
        let check = entry.check_attributes();
        self.entries.insert(entry_path.clone(), entry);
        self.unchecked.insert(entry_path.clone());

        debug!(path = %entry_path, applied, "Registered entry");

        self.resolve_queued(Mode::Lenient)?;

        if check {
            self.check_attributes(&entry_path)?;
        }

        Ok(EntryHandle::new(entry_path))
    }

    /// Moves staged overlays for `entry` out of the pending store into its fields.
    fn apply_pending(&mut self, entry: &mut Entry) -> usize {
        let entry_path = entry.path().to_string();
        let mut applied = 0;

        for (field, node) in self.pending.take(&entry_path) {
            if let SourceNode::Reference(target) = node {
                entry.set_reference(&field, target);
                self.markers.insert(FieldPath::new(entry_path.as_str(), field));
                applied += 1;
            } else if let Some(value) = node.into_value() {
                entry.set_value(&field, value);
                applied += 1;
            }
        }

        // Mapping values for declared fields were split into deeper paths.
        let declared: Vec<String> = entry
            .fields()
            .filter(|(_, field)| field.is_declared())
            .map(|(name, _)| name.to_string())
            .collect();
        for field in declared {
            let subtree = path::join(&entry_path, &field);
            if self.has_entry_at_or_below(&subtree) {
                continue;
            }
            if let Some(value) = self.pending.take_subtree(&subtree) {
                entry.set_value(&field, value);
                applied += 1;
            }
        }

        applied
    }

    /// Fails if a declared field would be folded from a staged subtree holding a `!REF`.
    ///
    /// A load applied after the declaration rejects the same source, so both
    /// orders report it.
    fn reject_nested_references(&self, entry: &Entry) -> Result<()> {
        for (name, field) in entry.fields() {
            if !field.is_declared() {
                continue;
            }
            let subtree = path::join(entry.path(), name);
            if !self.has_entry_at_or_below(&subtree)
                && self.pending.contains_reference_at_or_below(&subtree)
            {
                return Err(nested_reference(&subtree));
            }
        }
        Ok(())
    }

    /// Validates that every field of the entry at `path` holds a concrete value.
    ///
    /// Idempotent; a successful check removes the entry from the unchecked set.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownEntry`] if nothing is registered at `path`
    /// - [`Error::MissingAttributes`] naming every field without a value
    pub fn check_attributes(&mut self, path: impl AsRef<str>) -> Result<()> {
        let path = path.as_ref();
        let missing = self.lookup(path)?.missing_fields();

        if !missing.is_empty() {
            return Err(Error::MissingAttributes {
                path: path.to_string(),
                fields: missing,
            });
        }

        self.unchecked.shift_remove(path);
        Ok(())
    }

    /// Validates every entry whose check is still outstanding.
    ///
    /// Covers entries registered with `check_attributes(false)` and entries
    /// whose earlier validation failed. Stops at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingAttributes`] for the first incomplete entry.
    pub fn check_all_attributes(&mut self) -> Result<()> {
        let outstanding: Vec<String> = self.unchecked.iter().cloned().collect();
        for path in outstanding {
            self.check_attributes(&path)?;
        }
        Ok(())
    }

    /// Returns the entry registered at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEntry`] if nothing is registered there.
    pub fn lookup(&self, path: impl AsRef<str>) -> Result<&Entry> {
        let path = path.as_ref();
        self.entries.get(path).ok_or_else(|| Error::UnknownEntry {
            path: path.to_string(),
        })
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Iterates over registered entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlays staged for entries that are not declared yet.
    #[must_use]
    pub const fn pending(&self) -> &PendingStore {
        &self.pending
    }

    /// Fields still waiting on a `!REF` marker.
    pub fn unresolved_references(&self) -> impl Iterator<Item = &FieldPath> {
        self.markers.iter()
    }

    /// Paths of entries whose required-field validation is outstanding.
    pub fn unchecked(&self) -> impl Iterator<Item = &str> {
        self.unchecked.iter().map(String::as_str)
    }

    /// Drops every entry, staged overlay, and queued marker.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending.clear();
        self.markers.clear();
        self.unchecked.clear();
    }

    /// Returns `true` if an entry is registered at `root` or beneath it.
    fn has_entry_at_or_below(&self, root: &str) -> bool {
        self.entries
            .range(root.to_string()..)
            .take_while(|(path, _)| path.starts_with(root))
            .any(|(path, _)| path::is_at_or_below(path, root))
    }
}

/// Error for a `!REF` inside a mapping that is assigned to a field as a whole.
fn nested_reference(path: &str) -> Error {
    Error::malformed(format!(
        "'{path}' holds a mapping with a !REF marker; references must be field values"
    ))
}
