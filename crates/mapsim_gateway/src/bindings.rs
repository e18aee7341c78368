//! Variables bound into every mapping template render.

use std::fmt;

use indexmap::IndexMap;
use mapsim_http::ParsedMessage;
use mapsim_vtl::{RenderContext, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::ContextConfiguration;
use crate::convert::string_map;
use crate::input::InputAccessor;
use crate::util::UtilityFunctions;

/// Which side of the integration a template maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Request,
    Response,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Request => "request",
            Mode::Response => "response",
        }
    }

    /// Name the engine reports the template under.
    pub fn template_name(&self) -> &'static str {
        match self {
            Mode::Request => "requestTemplate",
            Mode::Response => "responseTemplate",
        }
    }

    /// Envelope field holding the raw message.
    pub fn message_field(&self) -> &'static str {
        match self {
            Mode::Request => "httpRequest",
            Mode::Response => "httpResponse",
        }
    }

    /// Envelope field holding the template source.
    pub fn template_field(&self) -> &'static str {
        self.template_name()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "request" => Ok(Mode::Request),
            "response" => Ok(Mode::Response),
            other => Err(format!("unknown mode '{}', expected request or response", other)),
        }
    }
}

/// The fixed set of template variables for one render.
pub struct VariableBindings {
    mode: Mode,
    pub input: Value,
    pub util: Value,
    pub header: Value,
    pub path: Value,
    pub query: Value,
    pub context: Value,
    pub stage_variables: Value,
}

impl VariableBindings {
    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl From<VariableBindings> for RenderContext {
    fn from(bindings: VariableBindings) -> Self {
        let mut ctx = RenderContext::new();
        ctx.put("input", bindings.input);
        ctx.put("util", bindings.util);
        ctx.put("header", bindings.header);
        ctx.put("path", bindings.path);
        ctx.put("query", bindings.query);
        ctx.put("context", bindings.context);
        ctx.put("stageVariables", bindings.stage_variables);
        ctx
    }
}

/// Builds [`VariableBindings`] from a parsed message.
pub struct VariableBindingBuilder;

impl VariableBindingBuilder {
    /// Build fresh bindings. Response templates see empty parameter maps;
    /// request templates also get `httpMethod` and `resourcePath` added to
    /// their copy of the context.
    pub fn build(message: &ParsedMessage, mut config: ContextConfiguration, mode: Mode) -> VariableBindings {
        let empty = IndexMap::new();
        let (headers, path_params, query_params) = match mode {
            Mode::Request => (&message.headers, &message.path_params, &message.query_params),
            Mode::Response => (&empty, &empty, &empty),
        };

        if mode == Mode::Request && message.has_request_line() {
            if let Some(method) = message.method.as_deref() {
                config.inject_request(method, &message.path);
            }
        }

        let header = string_map(headers);
        let path = string_map(path_params);
        let query = string_map(query_params);
        debug!(
            "Binding {} template variables: {} headers, {} path params, {} query params",
            mode,
            headers.len(),
            path_params.len(),
            query_params.len()
        );

        let input = Value::object(InputAccessor::new(
            message.body.as_str(),
            path.clone(),
            query.clone(),
            header.clone(),
        ));

        VariableBindings {
            mode,
            input,
            util: Value::object(UtilityFunctions::new()),
            header,
            path,
            query,
            context: config.context_value(),
            stage_variables: config.stage_variables_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> ParsedMessage {
        ParsedMessage::new("POST", "/foo")
            .with_header("X-Trace", "abc")
            .with_query_param("q", "1")
            .with_body(r#"{"a": 1}"#)
    }

    #[test]
    fn test_request_bindings() {
        let config = ContextConfiguration::new().with_context("stage", "prod");
        let bindings = VariableBindingBuilder::build(&message(), config, Mode::Request);

        assert_eq!(bindings.mode(), Mode::Request);
        assert_eq!(bindings.header.get("X-Trace"), Some(Value::from("abc")));
        assert_eq!(bindings.query.get("q"), Some(Value::from("1")));
        assert_eq!(bindings.context.get("stage"), Some(Value::from("prod")));
        assert_eq!(bindings.context.get("httpMethod"), Some(Value::from("POST")));
        assert_eq!(bindings.context.get("resourcePath"), Some(Value::from("/foo")));

        let ctx = RenderContext::from(bindings);
        assert_eq!(
            ctx.names(),
            vec!["context", "header", "input", "path", "query", "stageVariables", "util"]
        );
    }

    #[test]
    fn test_response_bindings_are_empty() {
        let bindings = VariableBindingBuilder::build(&message(), ContextConfiguration::new(), Mode::Response);
        assert_eq!(bindings.header.render(), "{}");
        assert_eq!(bindings.query.render(), "{}");
        assert_eq!(bindings.context.get("httpMethod"), None);
    }

    #[test]
    fn test_no_injection_without_request_line() {
        let message = ParsedMessage::new("GET", "");
        let bindings = VariableBindingBuilder::build(&message, ContextConfiguration::new(), Mode::Request);
        assert_eq!(bindings.context.get("httpMethod"), None);
        assert_eq!(bindings.context.get("resourcePath"), None);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("REQUEST".parse::<Mode>(), Ok(Mode::Request));
        assert!("both".parse::<Mode>().is_err());
        assert_eq!(Mode::Response.template_name(), "responseTemplate");
    }
}
