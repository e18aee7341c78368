//! Error types for message parsing.

use thiserror::Error;

/// Result type alias for message parsing.
pub type HttpResult<T> = Result<T, HttpError>;

/// Errors that can occur while parsing a raw HTTP message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("Invalid HTTP request: empty request")]
    Empty,

    #[error("Invalid HTTP request line: {0}")]
    Malformed(String),
}
