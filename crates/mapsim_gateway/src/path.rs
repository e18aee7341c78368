//! Path lookups against a message body.
//!
//! Two syntaxes are offered: a dotted form (`$.items[0].name`) walked
//! directly over the parsed document, and full JSONPath handed to
//! [`crate::jsonpath`]. Both degrade to null instead of failing.

use mapsim_vtl::Value;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::convert::json_to_value;
use crate::jsonpath::{self, JsonPathError};

/// Resolves path expressions against one body.
#[derive(Debug, Clone)]
pub struct PathResolver {
    document: Option<JsonValue>,
}

impl PathResolver {
    /// Parse `body` once. A body that is not JSON resolves every path to null.
    pub fn new(body: &str) -> Self {
        let document = match serde_json::from_str(body) {
            Ok(doc) => Some(doc),
            Err(e) => {
                debug!("Body is not JSON, paths will resolve to null: {}", e);
                None
            }
        };
        Self { document }
    }

    /// The parsed body, if it was JSON.
    pub fn document(&self) -> Option<&JsonValue> {
        self.document.as_ref()
    }

    /// Resolve a dotted path such as `$.items[0].name`.
    pub fn path(&self, expression: &str) -> Value {
        if expression.is_empty() {
            return Value::Null;
        }
        let Some(document) = &self.document else {
            return Value::Null;
        };
        if expression == "$" {
            return json_to_value(document);
        }

        let stripped = expression.strip_prefix('$').unwrap_or(expression);
        let stripped = stripped.strip_prefix('.').unwrap_or(stripped);

        match walk(document, stripped) {
            Some(node) => json_to_value(node),
            None => {
                debug!("Path '{}' did not match the body", stripped);
                Value::Null
            }
        }
    }

    /// Evaluate a JSONPath expression, returning null when it fails.
    pub fn json_path(&self, expression: &str) -> Value {
        match self.json_path_raw(expression) {
            Ok(result) => json_to_value(&result),
            Err(e) => {
                warn!("Error evaluating JSONPath '{}': {}", expression, e);
                Value::Null
            }
        }
    }

    /// Evaluate a JSONPath expression, keeping the JSON result.
    pub fn json_path_raw(&self, expression: &str) -> Result<JsonValue, JsonPathError> {
        let document = self.document.as_ref().ok_or_else(|| JsonPathError::InvalidPath {
            path: expression.to_string(),
            message: "body is not valid JSON".to_string(),
        })?;
        jsonpath::evaluate(document, expression)
    }
}

/// Split on `.` the way `String.split` does: trailing empty segments are
/// dropped, but an empty input still yields one empty segment.
fn split_segments(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = path.split('.').collect();
    while segments.len() > 1 && segments.last().map_or(false, |s| s.is_empty()) {
        segments.pop();
    }
    segments
}

/// Walk `path` one segment at a time. Each segment is a field name with at
/// most one numeric `[index]` suffix; anything else is a miss.
fn walk<'a>(document: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut current = document;

    for segment in split_segments(path) {
        let bracket = segment.find('[').filter(|_| segment.ends_with(']'));
        let Some(open) = bracket else {
            current = current.get(segment)?;
            continue;
        };

        let field = &segment[..open];
        let index_text = &segment[open + 1..segment.len() - 1];
        let index = index_text.parse::<i32>().ok()?;

        if !field.is_empty() {
            current = current.get(field).filter(|next| next.is_array())?;
        }
        let index = usize::try_from(index).ok()?;
        current = current.as_array()?.get(index)?;
    }

    Some(current)
}
