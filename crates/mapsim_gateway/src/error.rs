//! Error types for the gateway simulation.

use mapsim_http::HttpError;
use thiserror::Error;

use crate::simulator::ProcessingError;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur while simulating a gateway invocation.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Message(#[from] HttpError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required {0} parameters")]
    MissingParameters(String),
}

impl GatewayError {
    /// The diagnostic attached to a template failure, if this is one.
    pub fn processing(&self) -> Option<&ProcessingError> {
        match self {
            GatewayError::Processing(e) => Some(e),
            _ => None,
        }
    }
}
