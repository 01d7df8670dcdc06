//! Error types for entry registration, loading, and reference resolution.

use std::path::PathBuf;

use thiserror::Error;

use crate::path::FieldPath;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Classification of an [`Error`].
///
/// Mirrors the error taxonomy of the registry: `ConfigurationKeyError` is a
/// refinement of `ConfigurationError`, and `PathConflict` is a refinement of
/// `InvalidOperation`. Use [`Error::is_configuration_error`] and
/// [`Error::is_invalid_operation`] to match a kind together with its refinements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Generic configuration-resolution failure.
    ConfigurationError,
    /// A required field has no value at validation time.
    ConfigurationKeyError,
    /// The operation is forbidden in the current state.
    InvalidOperation,
    /// Two entries claimed the same dotted path.
    PathConflict,
    /// Reading a configuration file or stream failed.
    Io,
}

/// Error type for every registry, loader, and resolver operation.
#[derive(Debug, Error)]
pub enum Error {
    /// An entry is already registered at the path.
    #[error("An entry at '{path}' already exists")]
    PathConflict {
        /// The contested dotted path
        path: String,
    },

    /// A dotted path or field name is not well formed.
    #[error("Invalid dotted path '{path}': {reason}")]
    InvalidPath {
        /// The rejected path
        path: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// No entry is registered at the path.
    #[error("No entry is registered at '{path}'")]
    UnknownEntry {
        /// The path that was looked up
        path: String,
    },

    /// One or more fields of an entry have no concrete value.
    #[error("Entry at '{path}' has no defined value for: {}", fields.join(", "))]
    MissingAttributes {
        /// Path of the incomplete entry
        path: String,
        /// Names of the fields lacking a value, in declaration order
        fields: Vec<String>,
    },

    /// A `!REF` marker points at something that does not exist.
    #[error("Cannot resolve !REF {target} for '{field}': {reason}")]
    UnresolvedReference {
        /// The field holding the marker
        field: FieldPath,
        /// The attribute the marker points at
        target: FieldPath,
        /// Why the target could not be used
        reason: &'static str,
    },

    /// A chain of `!REF` markers loops back on itself.
    #[error("Circular reference: {}", render_chain(chain))]
    ReferenceCycle {
        /// Every field on the loop; the first one is repeated at the end
        chain: Vec<FieldPath>,
    },

    /// The configuration source has a shape the loader cannot apply.
    #[error("Malformed configuration source: {0}")]
    MalformedSource(String),

    /// Failed to parse a YAML source.
    #[error("Failed to parse YAML source: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Failed to parse a TOML source.
    #[error("Failed to parse TOML source: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// An entry or field could not be converted into the requested Rust type.
    #[error("Failed to convert '{path}' into the requested type: {source}")]
    Conversion {
        /// Entry path, or `path.field` for a single field
        path: String,
        /// Underlying conversion error
        #[source]
        source: serde_json::Error,
    },

    /// Failed to read the configuration file.
    #[error("Failed to read config file '{}': {source}", path.display())]
    FileRead {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a configuration stream.
    #[error("Failed to read configuration stream: {0}")]
    StreamRead(#[source] std::io::Error),
}

impl Error {
    /// Creates a `MalformedSource` error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedSource(reason.into())
    }

    /// Returns the taxonomy kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PathConflict { .. } => ErrorKind::PathConflict,
            Self::ReferenceCycle { .. } => ErrorKind::InvalidOperation,
            Self::MissingAttributes { .. } => ErrorKind::ConfigurationKeyError,
            Self::FileRead { .. } | Self::StreamRead(_) => ErrorKind::Io,
            Self::InvalidPath { .. }
            | Self::UnknownEntry { .. }
            | Self::UnresolvedReference { .. }
            | Self::MalformedSource(_)
            | Self::YamlParse(_)
            | Self::TomlParse(_)
            | Self::Conversion { .. } => ErrorKind::ConfigurationError,
        }
    }

    /// Returns `true` for `ConfigurationError` and its `ConfigurationKeyError` refinement.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConfigurationError | ErrorKind::ConfigurationKeyError
        )
    }

    /// Returns `true` for `InvalidOperation` and its `PathConflict` refinement.
    #[must_use]
    pub const fn is_invalid_operation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidOperation | ErrorKind::PathConflict
        )
    }
}

fn render_chain(chain: &[FieldPath]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
