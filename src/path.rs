//! Dotted path handling.
//!
//! Entries live at dotted paths such as `app.database`; a single attribute of
//! an entry is addressed by appending the field name (`app.database.host`).

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// One or more non-empty, whitespace-free segments joined by dots.
static DOTTED_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^.\s]+(\.[^.\s]+)*$").expect("dotted path pattern is valid"));

/// Validates an entry path.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] if `path` is empty or has an empty or
/// whitespace-containing segment.
pub fn validate(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidPath {
            path: String::new(),
            reason: "path must not be empty",
        });
    }

    if !DOTTED_PATH.is_match(path) {
        return Err(Error::InvalidPath {
            path: path.to_string(),
            reason: "segments must be non-empty and contain no whitespace",
        });
    }

    Ok(())
}

/// Validates a single path segment, such as a field name.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] if `segment` is not a valid one-segment path.
pub fn validate_segment(segment: &str) -> Result<()> {
    validate(segment)?;

    if segment.contains('.') {
        return Err(Error::InvalidPath {
            path: segment.to_string(),
            reason: "field names must be a single path segment",
        });
    }

    Ok(())
}

/// Converts a Rust module path (`my_app::db`) into a dotted path (`my_app.db`).
#[must_use]
pub fn from_module_path(module_path: &str) -> String {
    module_path.replace("::", ".")
}

/// Joins a parent path and a child segment; an empty parent yields the child.
#[must_use]
pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

/// Returns `true` if `path` equals `root` or is nested beneath it.
#[must_use]
pub fn is_at_or_below(path: &str, root: &str) -> bool {
    path.strip_prefix(root)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

/// Address of one attribute on one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    /// Dotted path of the owning entry
    pub path: String,
    /// Field name on that entry
    pub attribute: String,
}

impl FieldPath {
    /// Creates a field address from its entry path and attribute name.
    #[must_use]
    pub fn new(path: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            attribute: attribute.into(),
        }
    }

    /// Splits `target.path.attribute` at its last dot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSource`] if `full` is not a valid dotted path
    /// with at least two segments.
    pub fn parse(full: &str) -> Result<Self> {
        let full = full.trim();
        validate(full).map_err(|_| Error::malformed(format!("invalid !REF target '{full}'")))?;

        full.rsplit_once('.')
            .map(|(path, attribute)| Self::new(path, attribute))
            .ok_or_else(|| {
                Error::malformed(format!(
                    "!REF target '{full}' must name an attribute as 'entry.path.attribute'"
                ))
            })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.path, self.attribute)
    }
}
