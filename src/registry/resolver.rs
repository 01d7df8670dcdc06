//! Reference Resolver.
//!
//! Rewrites every field holding a `!REF` placeholder to a copy of its target's
//! current value. A target that is itself a placeholder is followed first, so
//! chains resolve in dependency order and every field on the chain receives
//! the value at its end. Targets are looked up among registered entries, then
//! among staged overlays of entries that are not declared yet.

use tracing::debug;

use crate::error::{Error, Result};
use crate::path::FieldPath;
use crate::source::SourceNode;
use crate::value::Value;

use super::Registry;
use super::entry::Slot;

/// How to treat a marker whose target does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Mode {
    /// Fail with [`Error::UnresolvedReference`].
    Strict,
    /// Keep the marker queued; used while entries are still being declared.
    Lenient,
}

/// What a target address currently holds.
enum Target {
    Value(Value),
    Reference(FieldPath),
    Missing(&'static str),
}

/// End of a followed chain.
enum Followed {
    /// Every link on `chain` resolves to `value`.
    Resolved { chain: Vec<FieldPath>, value: Value },
    /// The last link of the chain points at nothing usable.
    Dangling {
        field: FieldPath,
        target: FieldPath,
        reason: &'static str,
    },
}

impl Registry {
    /// Resolves every queued reference marker.
    ///
    /// Only needed after loading with
    /// [`LoadOptions::defer_references`](super::LoadOptions::defer_references);
    /// otherwise every load resolves its markers. Calling it again once all
    /// markers are resolved does nothing.
    ///
    /// Returns the number of fields rewritten.
    ///
    /// # Errors
    ///
    /// - [`Error::UnresolvedReference`] if a target path or attribute does not exist
    /// - [`Error::ReferenceCycle`] if markers form a cycle
    ///
    /// Fields resolved before the failing marker keep their new values.
    pub fn resolve_references(&mut self) -> Result<usize> {
        self.resolve_queued(Mode::Strict)
    }

    /// Checks that every reference staged for undeclared entries can be followed.
    ///
    /// Nothing is modified; this lets a host validate a source before the
    /// entries it configures are declared.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve_references`].
    pub fn check_pending_references(&self) -> Result<usize> {
        let mut checked = 0;

        for (field, target) in self.pending.references() {
            match self.follow(field, target.clone())? {
                Followed::Resolved { .. } => checked += 1,
                Followed::Dangling {
                    field,
                    target,
                    reason,
                } => {
                    return Err(Error::UnresolvedReference {
                        field,
                        target,
                        reason,
                    });
                }
            }
        }

        Ok(checked)
    }

    pub(super) fn resolve_queued(&mut self, mode: Mode) -> Result<usize> {
        let queued: Vec<FieldPath> = self.markers.iter().cloned().collect();
        let mut resolved = 0;

        for field in queued {
            // Already rewritten as part of an earlier chain.
            if !self.markers.contains(&field) {
                continue;
            }

            let Some(target) = self.placeholder_target(&field) else {
                // Overwritten by a concrete value since it was queued.
                self.markers.shift_remove(&field);
                continue;
            };

            match self.follow(field, target)? {
                Followed::Resolved { chain, value } => {
                    resolved += self.rewrite(&chain, &value);
                }
                Followed::Dangling {
                    field,
                    target,
                    reason,
                } => match mode {
                    Mode::Strict => {
                        return Err(Error::UnresolvedReference {
                            field,
                            target,
                            reason,
                        });
                    }
                    Mode::Lenient => {
                        debug!(%field, %target, reason, "Reference target not available yet");
                    }
                },
            }
        }

        Ok(resolved)
    }

    /// Follows a chain of markers starting at `field`, whose marker points at `target`.
    fn follow(&self, field: FieldPath, mut target: FieldPath) -> Result<Followed> {
        let mut chain = vec![field];

        loop {
            if let Some(start) = chain.iter().position(|link| *link == target) {
                let mut cycle = chain.split_off(start);
                cycle.push(target);
                return Err(Error::ReferenceCycle { chain: cycle });
            }

            match self.target(&target) {
                Target::Value(value) => return Ok(Followed::Resolved { chain, value }),
                Target::Reference(next) => {
                    chain.push(target);
                    target = next;
                }
                Target::Missing(reason) => {
                    let field = chain.pop().unwrap_or_else(|| target.clone());
                    return Ok(Followed::Dangling {
                        field,
                        target,
                        reason,
                    });
                }
            }
        }
    }

    fn target(&self, target: &FieldPath) -> Target {
        if let Some(entry) = self.entries.get(&target.path) {
            return match entry.field(&target.attribute).map(super::Field::slot) {
                Some(Slot::Value(value)) => Target::Value(value.clone()),
                Some(Slot::Reference(next)) => Target::Reference(next.clone()),
                Some(Slot::Unset) => Target::Missing("the target attribute has no value"),
                None => Target::Missing("the target entry has no such attribute"),
            };
        }

        match self.pending.lookup(target) {
            Some(SourceNode::Value(value)) => Target::Value(value),
            Some(SourceNode::Reference(next)) => Target::Reference(next),
            Some(SourceNode::Mapping(_)) | None => {
                Target::Missing("no entry is registered at the target path")
            }
        }
    }

    fn placeholder_target(&self, field: &FieldPath) -> Option<FieldPath> {
        self.entries
            .get(&field.path)
            .and_then(|entry| entry.field(&field.attribute))
            .and_then(super::Field::pending_reference)
            .cloned()
    }

    /// Writes `value` into every registered placeholder on `chain`.
    fn rewrite(&mut self, chain: &[FieldPath], value: &Value) -> usize {
        let mut rewritten = 0;

        for link in chain {
            let Some(entry) = self.entries.get_mut(&link.path) else {
                // Staged for an undeclared entry; it is resolved on registration.
                continue;
            };
            if entry
                .field(&link.attribute)
                .and_then(super::Field::pending_reference)
                .is_none()
            {
                continue;
            }

            entry.set_value(&link.attribute, value.clone());
            self.markers.shift_remove(link);
            rewritten += 1;
            debug!(field = %link, "Resolved reference");
        }

        rewritten
    }
}
