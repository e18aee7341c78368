//! Handle command - Process a JSON envelope.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use mapsim_gateway::VtlProcessorHandler;
use mapsim_vtl::EngineConfig;

use super::read_file;
use crate::error::CliError;

#[derive(Args)]
pub struct HandleArgs {
    /// Envelope file; read from stdin when omitted
    #[arg(short, long)]
    event: Option<PathBuf>,

    /// Print only the response body
    #[arg(long)]
    body_only: bool,
}

pub fn execute(args: HandleArgs, config: EngineConfig) -> Result<()> {
    let event = match &args.event {
        Some(path) => read_file(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read envelope from stdin")?;
            buffer
        }
    };

    let response = VtlProcessorHandler::new(config).handle(&event);
    info!("Handler returned status {}", response.status_code);

    if args.body_only {
        println!("{}", response.body);
    } else {
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    if response.status_code != 200 {
        return Err(CliError::TemplateFailure(format!(
            "handler returned status {}",
            response.status_code
        ))
        .into());
    }
    Ok(())
}
