//! Error types for template parsing and evaluation.

use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Underlying failure of a method invoked from a template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InvocationCause(pub String);

/// Errors reported by the template engine.
///
/// Every variant records the template name and the position of the construct
/// that failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The template source could not be parsed.
    #[error("{message} at {template}[line {line}, column {column}]")]
    Parse {
        template: String,
        message: String,
        line: usize,
        column: usize,
    },

    /// A reference or method invocation failed while rendering.
    #[error("{message} at {template}[line {line}, column {column}]")]
    Invocation {
        template: String,
        message: String,
        reference: String,
        line: usize,
        column: usize,
        #[source]
        cause: Option<InvocationCause>,
    },

    /// `#parse` or `#include` named a resource the engine does not know.
    #[error("{message} at {template}[line {line}, column {column}]")]
    ResourceNotFound {
        template: String,
        message: String,
        name: String,
        line: usize,
        column: usize,
    },

    /// Any other evaluation failure (bad arithmetic, recursion limits).
    #[error("{message} at {template}[line {line}, column {column}]")]
    Runtime {
        template: String,
        message: String,
        line: usize,
        column: usize,
    },
}

impl EngineError {
    /// Message without the location suffix.
    pub fn message(&self) -> &str {
        match self {
            EngineError::Parse { message, .. }
            | EngineError::Invocation { message, .. }
            | EngineError::ResourceNotFound { message, .. }
            | EngineError::Runtime { message, .. } => message,
        }
    }

    pub fn template(&self) -> &str {
        match self {
            EngineError::Parse { template, .. }
            | EngineError::Invocation { template, .. }
            | EngineError::ResourceNotFound { template, .. }
            | EngineError::Runtime { template, .. } => template,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            EngineError::Parse { line, .. }
            | EngineError::Invocation { line, .. }
            | EngineError::ResourceNotFound { line, .. }
            | EngineError::Runtime { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            EngineError::Parse { column, .. }
            | EngineError::Invocation { column, .. }
            | EngineError::ResourceNotFound { column, .. }
            | EngineError::Runtime { column, .. } => *column,
        }
    }

    /// Cause of an invocation failure, if any.
    pub fn cause(&self) -> Option<&InvocationCause> {
        match self {
            EngineError::Invocation { cause, .. } => cause.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_includes_location() {
        let err = EngineError::Parse {
            template: "requestTemplate".to_string(),
            message: "Encountered \")\"".to_string(),
            line: 2,
            column: 7,
        };
        assert_eq!(
            err.to_string(),
            "Encountered \")\" at requestTemplate[line 2, column 7]"
        );
        assert_eq!(err.line(), 2);
        assert_eq!(err.column(), 7);
    }

    #[test]
    fn test_invocation_cause_is_source() {
        let err = EngineError::Invocation {
            template: "t".to_string(),
            message: "Invocation of method 'get' failed".to_string(),
            reference: "$list.get(9)".to_string(),
            line: 1,
            column: 1,
            cause: Some(InvocationCause("$list.get(): index 9 out of bounds".to_string())),
        };
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("$list.get(): index 9 out of bounds".to_string())
        );
        assert_eq!(err.message(), "Invocation of method 'get' failed");
    }
}
