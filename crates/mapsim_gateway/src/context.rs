//! `$context` and `$stageVariables` configuration.

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use mapsim_vtl::Value;

use crate::convert::json_to_value;
use crate::error::GatewayResult;

/// Values exposed to templates as `$context` and `$stageVariables`.
///
/// Both trees start empty; nothing is synthesized when the configuration
/// omits them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextConfiguration {
    context: Map<String, JsonValue>,
    stage_variables: Map<String, JsonValue>,
}

impl ContextConfiguration {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a `{"context": {...}, "stageVariables": {...}}` document.
    ///
    /// Keys that are missing or not objects are ignored.
    pub fn from_value(config: Option<&JsonValue>) -> Self {
        let section = |name: &str| {
            config
                .and_then(|c| c.get(name))
                .and_then(JsonValue::as_object)
                .cloned()
                .unwrap_or_default()
        };

        Self {
            context: section("context"),
            stage_variables: section("stageVariables"),
        }
    }

    /// Parse the configuration from JSON text.
    pub fn from_json(text: &str) -> GatewayResult<Self> {
        let value: JsonValue = serde_json::from_str(text)?;
        Ok(Self::from_value(Some(&value)))
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn context(&self) -> &Map<String, JsonValue> {
        &self.context
    }

    pub fn stage_variables(&self) -> &Map<String, JsonValue> {
        &self.stage_variables
    }

    /// Record the method and resource path of the request being rendered.
    pub fn inject_request(&mut self, method: &str, path: &str) {
        debug!("Injecting httpMethod={} resourcePath={} into context", method, path);
        self.context
            .insert("httpMethod".to_string(), JsonValue::String(method.to_string()));
        self.context
            .insert("resourcePath".to_string(), JsonValue::String(path.to_string()));
    }

    /// `$context` as a template value.
    pub fn context_value(&self) -> Value {
        json_to_value(&JsonValue::Object(self.context.clone()))
    }

    /// `$stageVariables` as a template value.
    pub fn stage_variables_value(&self) -> Value {
        json_to_value(&JsonValue::Object(self.stage_variables.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sections_are_copied() {
        let config = ContextConfiguration::from_json(
            r#"{"context": {"stage": "prod", "identity": {"sourceIp": "1.2.3.4"}, "tags": [1]},
                "stageVariables": {"env": "test"}}"#,
        )
        .unwrap();

        assert_eq!(config.context()["stage"], json!("prod"));
        assert_eq!(config.context()["identity"]["sourceIp"], json!("1.2.3.4"));
        assert_eq!(config.stage_variables()["env"], json!("test"));
        assert_eq!(
            config.context_value().get("identity").and_then(|i| i.get("sourceIp")),
            Some(Value::from("1.2.3.4"))
        );
    }

    #[test]
    fn test_missing_or_wrong_sections_are_empty() {
        let config = ContextConfiguration::from_value(Some(&json!({"context": [1, 2]})));
        assert!(config.context().is_empty());
        assert!(config.stage_variables().is_empty());
        assert_eq!(ContextConfiguration::from_value(None), ContextConfiguration::new());
        assert!(ContextConfiguration::from_json("{oops").is_err());
    }

    #[test]
    fn test_inject_request() {
        let mut config = ContextConfiguration::new().with_context("stage", "prod");
        config.inject_request("POST", "/foo");
        assert_eq!(config.context()["httpMethod"], json!("POST"));
        assert_eq!(config.context()["resourcePath"], json!("/foo"));
        assert_eq!(config.context()["stage"], json!("prod"));
    }
}
