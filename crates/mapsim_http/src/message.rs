//! Structured form of a raw HTTP message.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A request or response after parsing.
///
/// Header names keep the case they were received with. Path parameters are
/// never filled in by the parser because the resource path pattern is not
/// part of the message text; callers that know it can add them with
/// [`ParsedMessage::with_path_param`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMessage {
    pub method: Option<String>,
    pub path: String,
    pub query_params: IndexMap<String, String>,
    pub headers: IndexMap<String, String>,
    pub path_params: IndexMap<String, String>,
    pub body: String,
}

impl ParsedMessage {
    /// Create a message with only a method and path.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a query string parameter.
    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    /// Add a path parameter.
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Whether both a method and a non-empty path are known.
    pub fn has_request_line(&self) -> bool {
        self.method.as_deref().map_or(false, |m| !m.is_empty()) && !self.path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let message = ParsedMessage::new("POST", "/orders")
            .with_header("Content-Type", "application/json")
            .with_query_param("page", "2")
            .with_path_param("id", "42")
            .with_body("{}");

        assert_eq!(message.method.as_deref(), Some("POST"));
        assert_eq!(message.headers["Content-Type"], "application/json");
        assert_eq!(message.query_params["page"], "2");
        assert_eq!(message.path_params["id"], "42");
        assert!(message.has_request_line());
    }

    #[test]
    fn test_default_has_no_request_line() {
        assert!(!ParsedMessage::default().has_request_line());
    }
}
