//! CLI argument parsing using clap.

use std::path::PathBuf;

use aegir::{Format, LoadOptions};
use clap::{Parser, Subcommand, ValueEnum};

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;

/// Aegir: configuration overlay inspector
///
/// Loads configuration sources the way an application would and shows
/// what they would apply to its entries.
#[derive(Debug, Parser)]
#[command(name = "aegir")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Source format (default: from the file extension, YAML unless `.toml`)
    #[arg(long, value_enum, global = true)]
    pub format: Option<FormatArg>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Subcommands for aegir
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load the files in order and print the merged overlays as JSON
    Show {
        /// Configuration files, later ones overriding earlier ones
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },
    /// Load the files in order and check that every `!REF` can be resolved
    Check {
        /// Configuration files, later ones overriding earlier ones
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },
}

impl Command {
    /// Files named on the command line, in load order.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        match self {
            Self::Show { files } | Self::Check { files } => files,
        }
    }
}

/// Source format argument for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// YAML with `!REF` tags
    Yaml,
    /// TOML with `"!REF ..."` strings
    Toml,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Yaml => Self::Yaml,
            FormatArg::Toml => Self::Toml,
        }
    }
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    #[cfg(test)]
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }

    /// Options for every load this invocation performs.
    #[must_use]
    pub fn load_options(&self) -> LoadOptions {
        let options = LoadOptions::new();
        match self.format {
            Some(format) => options.with_format(format.into()),
            None => options,
        }
    }
}
