//! Render command - Render one template against one message.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use mapsim_gateway::{ApiGatewaySimulator, ContextConfiguration, GatewayError, Mode};
use mapsim_vtl::{EngineConfig, TemplateEngine};

use super::{load_context, read_file};
use crate::error::CliError;

#[derive(Args)]
pub struct RenderArgs {
    /// Template role: request or response
    #[arg(short, long, default_value = "request")]
    mode: Mode,

    /// File holding the raw HTTP message
    #[arg(long)]
    message: PathBuf,

    /// File holding the mapping template
    #[arg(short, long)]
    template: PathBuf,

    /// JSON file with context and stage variables
    #[arg(short, long)]
    context: Option<PathBuf>,
}

pub fn execute(args: RenderArgs, config: EngineConfig) -> Result<()> {
    info!("Rendering {} template {}", args.mode, args.template.display());

    let raw = read_file(&args.message)?;
    let template = read_file(&args.template)?;
    let context = match &args.context {
        Some(path) => load_context(path)?,
        None => ContextConfiguration::new(),
    };

    let engine = TemplateEngine::new(config);
    match ApiGatewaySimulator::new(&engine).process(&raw, &template, context, args.mode) {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(GatewayError::Processing(failure)) => {
            println!("{}", serde_json::to_string_pretty(failure.diagnostic())?);
            Err(CliError::TemplateFailure(failure.to_string()).into())
        }
        Err(GatewayError::Message(e)) => Err(CliError::InvalidArgument(e.to_string()).into()),
        Err(e) => Err(e.into()),
    }
}
