//! Query command - Probe a JSON body with a path expression.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::Value as JsonValue;
use tracing::warn;

use mapsim_gateway::convert::value_to_json;
use mapsim_gateway::jsonpath::JsonPathError;
use mapsim_gateway::PathResolver;
use mapsim_http::MessageParser;

use super::read_file;
use crate::error::CliError;

#[derive(Args)]
pub struct QueryArgs {
    /// File holding the JSON body
    #[arg(short, long)]
    body: PathBuf,

    /// Treat the file as a raw HTTP message and query its body
    #[arg(long)]
    message: bool,

    /// Dotted path such as `$.items[0].name`
    #[arg(long, conflicts_with = "json_path", required_unless_present = "json_path")]
    path: Option<String>,

    /// JSONPath expression
    #[arg(long)]
    json_path: Option<String>,
}

pub fn execute(args: QueryArgs) -> Result<()> {
    let text = read_file(&args.body)?;
    let body = if args.message {
        MessageParser::parse(&text)
            .map_err(|e| CliError::InvalidArgument(e.to_string()))?
            .body
    } else {
        text
    };

    let resolver = PathResolver::new(&body);
    if resolver.document().is_none() {
        warn!("Body of {} is not valid JSON", args.body.display());
    }

    let result = match (&args.path, &args.json_path) {
        (Some(path), _) => value_to_json(&resolver.path(path)),
        (None, Some(expression)) => match resolver.json_path_raw(expression) {
            Ok(value) => value,
            Err(JsonPathError::InvalidPath { path, message }) if resolver.document().is_some() => {
                return Err(CliError::InvalidArgument(format!("invalid JSONPath '{}': {}", path, message)).into());
            }
            Err(e) => {
                warn!("{}", e);
                JsonValue::Null
            }
        },
        (None, None) => return Err(CliError::InvalidArgument("--path or --json-path is required".into()).into()),
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
