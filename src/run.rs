//! Command execution.
//!
//! Loads the named files into a fresh registry. The binary declares no
//! entries, so every loaded value ends up staged, which is exactly what a
//! host application would receive before declaring its entries.

use std::path::PathBuf;

use aegir::{LoadOptions, Registry};
use thiserror::Error;
use tracing::info;

use crate::cli::{Cli, Command};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for command failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// Loading or checking the configuration failed.
    #[error(transparent)]
    Config(#[from] aegir::Error),

    /// Failed to render the staged configuration.
    #[error("Failed to render configuration: {0}")]
    Render(#[source] serde_json::Error),
}

/// Runs the selected subcommand and returns what it prints.
///
/// # Errors
///
/// Returns an error if a file cannot be loaded, a reference cannot be
/// followed (`check`), or the output cannot be rendered (`show`).
pub fn execute(cli: &Cli) -> Result<String, RunError> {
    let registry = load_sources(cli.command.files(), cli.load_options())?;

    match cli.command {
        Command::Show { .. } => render(&registry),
        Command::Check { .. } => {
            let checked = registry.check_pending_references()?;
            Ok(format!(
                "OK: {checked} references resolved across {} entry paths",
                registry.pending().len()
            ))
        }
    }
}

/// Loads every file in order into a fresh registry.
fn load_sources(files: &[PathBuf], options: LoadOptions) -> Result<Registry, aegir::Error> {
    let mut registry = Registry::new();

    for file in files {
        let report = registry.load_with(file, options)?;
        info!("{}: {report}", file.display());
    }

    Ok(registry)
}

/// Renders the staged overlays as pretty-printed JSON.
fn render(registry: &Registry) -> Result<String, RunError> {
    serde_json::to_string_pretty(registry.pending()).map_err(RunError::Render)
}
