//! CLI command definitions.
//!
//! Each subcommand drives one way of exercising mapping templates offline.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use tracing::debug;

use mapsim_gateway::ContextConfiguration;
use mapsim_vtl::EngineConfig;

use crate::error::CliError;

pub mod handle;
pub mod query;
pub mod render;
pub mod scenario;

/// mapsim - API gateway mapping template simulator
#[derive(Parser)]
#[command(name = "mapsim")]
#[command(version, about = "mapsim - API gateway mapping template simulator")]
#[command(long_about = r#"
mapsim renders API gateway mapping templates against raw HTTP messages
offline, reporting failures the way the gateway classifies them.

COMMANDS:
  render    → Render one template against one message
  handle    → Process a JSON envelope like the editor backend
  scenario  → Run scenario directories and compare against expected output
  query     → Probe a JSON body with a dotted path or JSONPath

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Template failure
  4 - Scenario mismatch
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Engine configuration file (YAML)
    #[arg(long, global = true, env = "MAPSIM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Yield null for undefined references instead of failing
    #[arg(long, global = true)]
    pub lenient: bool,

    /// Template resource for #parse/#include, as NAME=FILE (repeatable)
    #[arg(long = "resource", value_name = "NAME=FILE", global = true)]
    pub resources: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a mapping template against a raw HTTP message
    Render(render::RenderArgs),

    /// Process a JSON envelope and print the handler response
    Handle(handle::HandleArgs),

    /// Run scenario directories
    Scenario(scenario::ScenarioArgs),

    /// Query a JSON body with a path expression
    Query(query::QueryArgs),
}

impl Cli {
    /// Engine configuration from `--config`, with flag overrides applied.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = read_file(path)?;
                serde_yaml::from_str(&text)
                    .with_context(|| format!("Failed to parse engine config {}", path.display()))?
            }
            None => EngineConfig::default(),
        };

        if self.lenient {
            config = config.with_strict_references(false);
        }

        for resource in &self.resources {
            let (name, file) = parse_resource(resource)?;
            config = config.with_resource(name, read_file(Path::new(file))?);
        }

        debug!(
            "Engine config: strict_references={}, {} resources",
            config.strict_references,
            config.resources.len()
        );
        Ok(config)
    }
}

fn parse_resource(spec: &str) -> Result<(&str, &str)> {
    match spec.split_once('=') {
        Some((name, file)) if !name.is_empty() && !file.is_empty() => Ok((name, file)),
        _ => Err(CliError::InvalidArgument(format!(
            "--resource expects NAME=FILE, got '{}'",
            spec
        ))
        .into()),
    }
}

/// Read a UTF-8 file, naming it in the error.
pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Load a context file.
///
/// Files with a `context` or `stageVariables` key are used as is; any other
/// object is taken to be the context itself.
pub fn load_context(path: &Path) -> Result<ContextConfiguration> {
    let text = read_file(path)?;
    let value: JsonValue = serde_json::from_str(&text)
        .with_context(|| format!("Invalid context JSON in {}", path.display()))?;
    Ok(context_from_value(value))
}

pub fn context_from_value(value: JsonValue) -> ContextConfiguration {
    let wrapped = value.get("context").is_some() || value.get("stageVariables").is_some();
    if wrapped {
        ContextConfiguration::from_value(Some(&value))
    } else {
        ContextConfiguration::from_value(Some(&serde_json::json!({ "context": value })))
    }
}
