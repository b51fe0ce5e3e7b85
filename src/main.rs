//! Application entry point.
//!
//! Parses command-line arguments and delegates execution to [`runner::run`].

use std::io;
use std::process::ExitCode;

use clap::Parser;
use ninjaweave::{cli::Cli, runner};
use tracing::Level;
use tracing_subscriber::fmt;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let max_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    fmt()
        .with_max_level(max_level)
        .with_writer(io::stderr)
        .init();
    match runner::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let chain = format!("{err:#}");
            tracing::error!(error = %chain, "ninjaweave failed");
            ExitCode::FAILURE
        }
    }
}
