//! Main entry point for the mutassoc application.
//!
//! Reads passing mutation calls and resistance-associated calls, tests every
//! resistance mutation against every other mutation for co-occurrence and
//! writes the per-pair results with a run summary.

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::info;
use mutassoc::cli::{run_cli, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let summary = run_cli(cli)?;
    info!(
        "Number of tests performed: {} ({} pairs, {} test)",
        summary.n_tests, summary.n_pairs, summary.method
    );
    info!("Analysis finished successfully.");

    Ok(())
}
