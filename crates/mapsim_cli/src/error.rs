//! Failures that map to dedicated exit codes.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Template failure: {0}")]
    TemplateFailure(String),

    #[error("{failed} of {total} scenarios failed")]
    ScenarioMismatch { failed: usize, total: usize },
}
