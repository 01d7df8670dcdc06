//! Application startup and utilities.
//!
//! This module contains exit codes, tracing setup, and error hints
//! that support the main entry point.

use aegir::{Error, ErrorKind};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::run::RunError;

/// Application exit codes.
pub mod exit_code {
    use std::process::ExitCode;

    use aegir::ErrorKind;

    use crate::run::RunError;

    /// Success (exit code 0).
    pub const SUCCESS: ExitCode = ExitCode::SUCCESS;

    /// Configuration error (exit code 1) - malformed source, missing field, bad reference, etc.
    pub const CONFIG_ERROR: ExitCode = ExitCode::FAILURE;

    /// I/O error (exit code 2) - unreadable file or unwritable output.
    ///
    /// Note: This is a function rather than a constant because `ExitCode::from()` is not `const fn`.
    pub fn io_error() -> ExitCode {
        ExitCode::from(2)
    }

    /// Picks the exit code for a failed run.
    pub fn for_error(error: &RunError) -> ExitCode {
        match error {
            RunError::Config(e) if e.kind() == ErrorKind::Io => io_error(),
            RunError::Config(_) => CONFIG_ERROR,
            RunError::Render(_) => io_error(),
        }
    }
}

/// Prints helpful hints for common configuration errors.
pub fn print_config_hint(error: &RunError) {
    let RunError::Config(error) = error else {
        return;
    };

    match error {
        Error::ReferenceCycle { .. } => {
            eprintln!("\nReplace one '!REF' on the chain with a concrete value.");
        }
        Error::UnresolvedReference { .. } => {
            eprintln!("\nA '!REF' target must be written as 'entry.path.attribute'.");
        }
        Error::MalformedSource(_) => {
            eprintln!("\nTop-level keys are dotted entry paths; each maps field names to values.");
        }
        _ if error.kind() == ErrorKind::Io => {
            eprintln!("\nCheck that the file exists and is readable.");
        }
        _ => {}
    }
}

/// Sets up the tracing subscriber for logging.
///
/// Logs go to stderr so that command output on stdout stays parseable.
pub fn setup_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
