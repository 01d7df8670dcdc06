//! Aegir: configuration overlay inspector
//!
//! Entry point for the aegir application.

use std::process::ExitCode;

mod app;
mod cli;
mod run;

use app::{exit_code, print_config_hint, setup_tracing};
use cli::Cli;

/// Main entry point.
///
/// Excluded from coverage as it's the thin wrapper around testable components.
#[cfg(not(tarpaulin_include))]
fn main() -> ExitCode {
    let cli = Cli::parse_args();
    setup_tracing(cli.verbose);

    match run::execute(&cli) {
        Ok(output) => {
            println!("{output}");
            exit_code::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            print_config_hint(&e);
            exit_code::for_error(&e)
        }
    }
}
