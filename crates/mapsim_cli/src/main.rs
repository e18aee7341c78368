//! mapsim CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Template failure
//! - 4: Scenario mismatch

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod error;

use commands::{Cli, Commands};
use error::CliError;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const TEMPLATE_FAILURE: u8 = 3;
    pub const SCENARIO_MISMATCH: u8 = 4;
}

const DEFAULT_FILTER: &str = "mapsim=info,warn";

fn init_logging(verbose: bool, quiet: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    // Logs go to stderr so rendered output on stdout stays clean.
    let log_result = if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .try_init()
    };

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet, cli.log_json);

    let result = cli.engine_config().and_then(|config| match cli.command {
        Commands::Render(args) => commands::render::execute(args, config),
        Commands::Handle(args) => commands::handle::execute(args, config),
        Commands::Scenario(args) => commands::scenario::execute(args, config),
        Commands::Query(args) => commands::query::execute(args),
    });

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    match e.chain().find_map(|cause| cause.downcast_ref::<CliError>()) {
        Some(CliError::InvalidArgument(_)) => ExitCodes::INVALID_ARGS,
        Some(CliError::TemplateFailure(_)) => ExitCodes::TEMPLATE_FAILURE,
        Some(CliError::ScenarioMismatch { .. }) => ExitCodes::SCENARIO_MISMATCH,
        None => ExitCodes::GENERAL_ERROR,
    }
}
