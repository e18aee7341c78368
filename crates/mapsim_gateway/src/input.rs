//! The `$input` accessor.

use indexmap::IndexMap;
use mapsim_vtl::{MethodError, TemplateObject, Value};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::path::PathResolver;
use crate::util::parse_json;

/// Gives templates access to the message body and request parameters.
pub struct InputAccessor {
    body: String,
    resolver: PathResolver,
    parsed_body: Value,
    path: Value,
    query: Value,
    header: Value,
}

impl InputAccessor {
    /// Create an accessor. `path`, `query` and `header` are the same map
    /// values bound as `$path`, `$query` and `$header`.
    pub fn new(body: impl Into<String>, path: Value, query: Value, header: Value) -> Self {
        let body = body.into();
        let resolver = PathResolver::new(&body);
        let parsed_body = parse_json(&body);
        Self {
            body,
            resolver,
            parsed_body,
            path,
            query,
            header,
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// JSONPath result serialized as compact JSON, or `"null"` on failure.
    pub fn json(&self, expression: &str) -> String {
        let result = match self.resolver.json_path_raw(expression) {
            Ok(result) => result,
            Err(e) => {
                warn!("Error in json() function: {}", e);
                return "null".to_string();
            }
        };
        debug!("JSON path result for '{}': {}", expression, result);

        if let JsonValue::String(s) = &result {
            let looks_like_json =
                (s.starts_with('{') && s.ends_with('}')) || (s.starts_with('[') && s.ends_with(']'));
            if looks_like_json {
                return s.clone();
            }
        }
        serde_json::to_string(&result).unwrap_or_else(|e| {
            warn!("Failed to serialize JSON path result: {}", e);
            "null".to_string()
        })
    }

    /// The first of path, query string or header parameters named `name`.
    pub fn param(&self, name: &str) -> Value {
        [&self.path, &self.query, &self.header]
            .into_iter()
            .find_map(|source| source.get(name))
            .unwrap_or(Value::Null)
    }

    /// All parameters, keyed `path`, `querystring` and `header`.
    pub fn params(&self) -> Value {
        let mut all = IndexMap::new();
        all.insert("path".to_string(), self.path.clone());
        all.insert("querystring".to_string(), self.query.clone());
        all.insert("header".to_string(), self.header.clone());
        Value::map(all)
    }
}

impl TemplateObject for InputAccessor {
    fn type_name(&self) -> &str {
        "Input"
    }

    fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, MethodError> {
        match (method, args) {
            ("getBody", []) => Ok(Value::string(self.body.as_str())),
            ("parsedBody", []) => Ok(self.parsed_body.clone()),
            ("params", []) => Ok(self.params()),
            ("json", [Value::Null]) => Ok(Value::from("null")),
            ("path" | "params", [Value::Null]) => Ok(Value::Null),
            ("json", [Value::String(expr)]) => Ok(Value::String(self.json(expr))),
            ("path", [Value::String(expr)]) => Ok(self.resolver.json_path(expr)),
            ("params", [Value::String(name)]) => Ok(self.param(name)),
            _ => Err(MethodError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::string_map;

    fn accessor(body: &str) -> InputAccessor {
        let path: IndexMap<String, String> = [("id".to_string(), "p".to_string())].into_iter().collect();
        let query: IndexMap<String, String> = [
            ("id".to_string(), "q".to_string()),
            ("limit".to_string(), "5".to_string()),
        ]
        .into_iter()
        .collect();
        let header: IndexMap<String, String> = [
            ("limit".to_string(), "h".to_string()),
            ("Authorization".to_string(), "token".to_string()),
        ]
        .into_iter()
        .collect();
        InputAccessor::new(body, string_map(&path), string_map(&query), string_map(&header))
    }

    #[test]
    fn test_params_precedence() {
        let input = accessor("");
        assert_eq!(input.param("id"), Value::from("p"));
        assert_eq!(input.param("limit"), Value::from("5"));
        assert_eq!(input.param("Authorization"), Value::from("token"));
        assert_eq!(input.param("missing"), Value::Null);
        assert_eq!(
            input.params().get("querystring").and_then(|q| q.get("limit")),
            Some(Value::from("5"))
        );
    }

    #[test]
    fn test_json_and_path() {
        let input = accessor(r#"{"id": 1, "name": "x", "nested": {"a": [1, 2]}, "raw": "{\"k\":1}"}"#);
        assert_eq!(input.json("$"), r#"{"id":1,"name":"x","nested":{"a":[1,2]},"raw":"{\"k\":1}"}"#);
        assert_eq!(input.json("$.name"), "\"x\"");
        assert_eq!(input.json("$.raw"), "{\"k\":1}");
        assert_eq!(input.json("$.missing"), "null");
        assert_eq!(input.invoke("path", &[Value::from("$.id")]), Ok(Value::Int(1)));
        assert_eq!(input.invoke("path", &[Value::from("$.nested.a")]).unwrap().render(), "[1, 2]");
    }

    #[test]
    fn test_body_accessors() {
        let input = accessor("[1, 2]");
        assert_eq!(input.property("body"), Ok(Value::from("[1, 2]")));
        assert_eq!(input.invoke("parsedBody", &[]).unwrap().render(), "[1, 2]");

        let plain = accessor("hello");
        assert_eq!(plain.invoke("parsedBody", &[]), Ok(Value::Null));
        assert_eq!(plain.json("$.a"), "null");
    }
}
