mod analytics;
mod cli;
mod commands;
mod model;
mod store;
#[cfg(test)]
mod test_support;
mod util;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let command = cli.command.name();
    debug!(command, version = env!("CARGO_PKG_VERSION"), "dispatching");

    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(command, error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Ingest(args) => commands::ingest::run(args),
        Commands::Status(args) => commands::status::run(args),
        Commands::Landscape(args) => commands::landscape::run(args),
        Commands::Measure(args) => commands::measure::run(args),
        Commands::Leaderboard(args) => commands::leaderboard::run(args),
    }
}

/// `RUST_LOG` overrides the default `info` filter; logs go to stderr so
/// `--json` output on stdout stays parseable.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
