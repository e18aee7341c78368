//! JSON envelope dispatch, as exposed by the hosted editor backend.
//!
//! An envelope names a processing type and carries the raw message, the
//! template and optional context variables. The response is always a
//! `{statusCode, headers, body}` triple with permissive CORS headers.

use indexmap::IndexMap;
use mapsim_vtl::{EngineConfig, TemplateEngine};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tracing::{error, info};

use crate::bindings::Mode;
use crate::context::ContextConfiguration;
use crate::error::{GatewayError, GatewayResult};
use crate::simulator::ApiGatewaySimulator;

/// Response returned for every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    pub headers: IndexMap<String, String>,
    pub body: String,
}

impl HandlerResponse {
    fn new(status_code: u16, body: impl Into<String>) -> Self {
        let mut headers = IndexMap::new();
        headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
        headers.insert(
            "Access-Control-Allow-Headers".to_string(),
            "Content-Type,X-Amz-Date,Authorization,X-Api-Key".to_string(),
        );
        headers.insert("Access-Control-Allow-Methods".to_string(), "OPTIONS,POST".to_string());
        Self {
            status_code,
            headers,
            body: body.into(),
        }
    }
}

/// Dispatches envelopes to the simulator with one engine.
#[derive(Default)]
pub struct VtlProcessorHandler {
    engine: TemplateEngine,
}

impl VtlProcessorHandler {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engine: TemplateEngine::new(config),
        }
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    /// Handle one envelope given as JSON text.
    pub fn handle(&self, event_body: &str) -> HandlerResponse {
        match self.dispatch(event_body) {
            Ok(response) => response,
            Err(e) => {
                error!("Error processing request: {}", e);
                HandlerResponse::new(400, error_body(&e).to_string())
            }
        }
    }

    fn dispatch(&self, event_body: &str) -> GatewayResult<HandlerResponse> {
        let envelope: JsonValue = serde_json::from_str(event_body)?;

        let processing_type = envelope
            .get("processingType")
            .and_then(JsonValue::as_str)
            .unwrap_or("UNKNOWN");
        info!("Processing type: {}", processing_type);

        let mode = match processing_type {
            "REQUEST_ONLY" => Mode::Request,
            "RESPONSE_ONLY" => Mode::Response,
            _ => {
                info!("Unknown request type");
                return Ok(HandlerResponse::new(
                    400,
                    r#"{"success":false, "error":"Unknown request type"}"#,
                ));
            }
        };

        let field = |name: &str| envelope.get(name).and_then(JsonValue::as_str);
        let (Some(raw), Some(template)) = (field(mode.message_field()), field(mode.template_field())) else {
            return Err(GatewayError::MissingParameters(mode.as_str().to_string()));
        };

        let config = ContextConfiguration::from_value(envelope.get("contextVariables"));
        let output = ApiGatewaySimulator::new(&self.engine).process(raw, template, config, mode)?;
        info!("HTTP {} template processing complete", mode);

        Ok(HandlerResponse::new(200, output))
    }
}

/// The message followed by one `caused by` line per source error.
fn error_trace(e: &GatewayError) -> String {
    let mut trace = format!("{}\n", e);
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        trace.push_str(&format!("    caused by: {}\n", cause));
        source = cause.source();
    }
    trace
}

fn error_body(e: &GatewayError) -> JsonValue {
    let mut body = json!({
        "success": false,
        "error": e.to_string(),
    });
    if let Some(processing) = e.processing() {
        body["errorDetails"] = json!(processing.diagnostic());
    }
    body["stackTrace"] = JsonValue::String(error_trace(e));
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_json(response: &HandlerResponse) -> JsonValue {
        serde_json::from_str(&response.body).unwrap()
    }

    #[test]
    fn test_request_envelope() {
        let event = json!({
            "processingType": "REQUEST_ONLY",
            "httpRequest": "GET /pets?type=dog\n\n",
            "requestTemplate": "$input.params('type') $context.stage",
            "contextVariables": {"context": {"stage": "dev"}}
        });
        let response = VtlProcessorHandler::default().handle(&event.to_string());
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "dog dev");
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
    }

    #[test]
    fn test_unknown_type() {
        let response = VtlProcessorHandler::default().handle(r#"{"processingType": "BOTH"}"#);
        assert_eq!(response.status_code, 400);
        assert_eq!(body_json(&response), json!({"success": false, "error": "Unknown request type"}));
    }

    #[test]
    fn test_missing_parameters() {
        let response = VtlProcessorHandler::default()
            .handle(r#"{"processingType": "RESPONSE_ONLY", "responseTemplate": "x"}"#);
        assert_eq!(response.status_code, 400);
        let body = body_json(&response);
        assert_eq!(body["error"], "Missing required response parameters");
        assert!(body.get("errorDetails").is_none());
    }

    #[test]
    fn test_template_failure_details() {
        let event = json!({
            "processingType": "RESPONSE_ONLY",
            "httpResponse": "HTTP/1.1 200\n\n{}",
            "responseTemplate": "#foreach($x in $missing)#end"
        });
        let response = VtlProcessorHandler::default().handle(&event.to_string());
        assert_eq!(response.status_code, 400);

        let body = body_json(&response);
        assert_eq!(body["success"], false);
        assert_eq!(body["errorDetails"]["type"], "REFERENCE_ERROR");
        assert_eq!(body["errorDetails"]["templateType"], "response");
        assert_eq!(body["errorDetails"]["context"], "Variable: $missing");
        let trace = body["stackTrace"].as_str().unwrap();
        assert!(trace.contains("caused by: Failed to render responseTemplate"));
    }

    #[test]
    fn test_invalid_envelope_json() {
        let response = VtlProcessorHandler::default().handle("not json");
        assert_eq!(response.status_code, 400);
        assert!(body_json(&response)["error"].as_str().unwrap().starts_with("JSON error"));
    }
}
