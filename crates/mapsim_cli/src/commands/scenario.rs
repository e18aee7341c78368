//! Scenario command - Run scenario directories.
//!
//! A scenario is a directory containing `template.vtl` and either
//! `request.http` or `response.http`, plus optional `context.json` and
//! `expected.json`. Output is compared as JSON when both sides parse, and
//! as trimmed text otherwise. Scenarios without `expected.json` pass when
//! the template renders.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info};
use walkdir::WalkDir;

use mapsim_gateway::{ApiGatewaySimulator, ContextConfiguration, Mode};
use mapsim_vtl::{EngineConfig, TemplateEngine};

use super::{load_context, read_file};
use crate::error::CliError;

const TEMPLATE_FILE: &str = "template.vtl";
const CONTEXT_FILE: &str = "context.json";
const EXPECTED_FILE: &str = "expected.json";

#[derive(Args)]
pub struct ScenarioArgs {
    /// Directory to search for scenarios
    dir: PathBuf,

    /// Stop at the first failing scenario
    #[arg(long)]
    fail_fast: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

/// One discovered scenario directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub dir: PathBuf,
    pub mode: Mode,
}

impl Scenario {
    fn message_file(&self) -> PathBuf {
        match self.mode {
            Mode::Request => self.dir.join("request.http"),
            Mode::Response => self.dir.join("response.http"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Mismatch { expected: String, actual: String },
    Failed { error: String },
}

#[derive(Debug, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub mode: Mode,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Default, Serialize)]
pub struct ScenarioReport {
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ScenarioResult>,
}

/// Find scenario directories under `root`, sorted by path.
pub fn discover(root: &Path) -> Vec<Scenario> {
    let mut scenarios: Vec<Scenario> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| entry.path().join(TEMPLATE_FILE).is_file())
        .filter_map(|entry| {
            let dir = entry.path();
            let mode = if dir.join("request.http").is_file() {
                Mode::Request
            } else if dir.join("response.http").is_file() {
                Mode::Response
            } else {
                debug!("Skipping {}: no request.http or response.http", dir.display());
                return None;
            };

            let name = dir
                .strip_prefix(root)
                .ok()
                .map(|p| p.display().to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| ".".to_string());

            Some(Scenario {
                name,
                dir: dir.to_path_buf(),
                mode,
            })
        })
        .collect();
    scenarios.sort_by(|a, b| a.dir.cmp(&b.dir));
    scenarios
}

/// Whether rendered output matches the expected text.
pub fn outputs_match(expected: &str, actual: &str) -> bool {
    match (
        serde_json::from_str::<JsonValue>(expected),
        serde_json::from_str::<JsonValue>(actual),
    ) {
        (Ok(e), Ok(a)) => e == a,
        _ => expected.trim() == actual.trim(),
    }
}

/// Render one scenario and compare it with its expectation.
pub fn run_scenario(simulator: &ApiGatewaySimulator<'_>, scenario: &Scenario) -> Result<Outcome> {
    let raw = read_file(&scenario.message_file())?;
    let template = read_file(&scenario.dir.join(TEMPLATE_FILE))?;

    let context_path = scenario.dir.join(CONTEXT_FILE);
    let context = if context_path.is_file() {
        load_context(&context_path)?
    } else {
        ContextConfiguration::new()
    };

    let actual = match simulator.process(&raw, &template, context, scenario.mode) {
        Ok(output) => output,
        Err(e) => return Ok(Outcome::Failed { error: e.to_string() }),
    };

    let expected_path = scenario.dir.join(EXPECTED_FILE);
    if !expected_path.is_file() {
        return Ok(Outcome::Passed);
    }
    let expected = read_file(&expected_path)?;

    if outputs_match(&expected, &actual) {
        Ok(Outcome::Passed)
    } else {
        Ok(Outcome::Mismatch { expected, actual })
    }
}

/// Run every scenario under `root`.
pub fn run_all(root: &Path, config: EngineConfig, fail_fast: bool) -> Result<ScenarioReport> {
    let scenarios = discover(root);
    if scenarios.is_empty() {
        return Err(CliError::InvalidArgument(format!("No scenarios found under {}", root.display())).into());
    }
    info!("Running {} scenarios from {}", scenarios.len(), root.display());

    let engine = TemplateEngine::new(config);
    let simulator = ApiGatewaySimulator::new(&engine);
    let mut report = ScenarioReport::default();

    for scenario in scenarios {
        let outcome = run_scenario(&simulator, &scenario)?;
        let passed = outcome == Outcome::Passed;
        if passed {
            report.passed += 1;
        } else {
            report.failed += 1;
        }
        report.results.push(ScenarioResult {
            name: scenario.name,
            mode: scenario.mode,
            outcome,
        });
        if !passed && fail_fast {
            break;
        }
    }

    Ok(report)
}

pub fn execute(args: ScenarioArgs, config: EngineConfig) -> Result<()> {
    let report = run_all(&args.dir, config, args.fail_fast)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for result in &report.results {
            match &result.outcome {
                Outcome::Passed => println!("✅ {} ({})", result.name, result.mode),
                Outcome::Mismatch { expected, actual } => {
                    println!("❌ {} ({}): output differs", result.name, result.mode);
                    println!("   expected: {}", expected.trim());
                    println!("   actual:   {}", actual.trim());
                }
                Outcome::Failed { error } => {
                    println!("❌ {} ({}): {}", result.name, result.mode, error);
                }
            }
        }
        println!();
        println!("{} passed, {} failed", report.passed, report.failed);
    }

    if report.failed > 0 {
        return Err(CliError::ScenarioMismatch {
            failed: report.failed,
            total: report.passed + report.failed,
        }
        .into());
    }
    Ok(())
}
