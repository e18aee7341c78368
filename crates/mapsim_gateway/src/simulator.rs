//! End-to-end simulation of one mapping template invocation.

use mapsim_http::{MessageParser, ParsedMessage};
use mapsim_vtl::TemplateEngine;
use thiserror::Error;
use tracing::{error, info};

use crate::bindings::{Mode, VariableBindingBuilder};
use crate::classifier::{classify, Diagnostic};
use crate::context::ContextConfiguration;
use crate::error::GatewayResult;
use crate::renderer::{RenderError, TemplateRenderer};

/// A template render failed. Carries the classified diagnostic next to the
/// original error, which stays reachable through `source()`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", .diagnostic.message)]
pub struct ProcessingError {
    diagnostic: Diagnostic,
    #[source]
    source: RenderError,
}

impl ProcessingError {
    pub fn new(source: RenderError, mode: Mode) -> Self {
        Self {
            diagnostic: classify(&source, mode),
            source,
        }
    }

    pub fn diagnostic(&self) -> &Diagnostic {
        &self.diagnostic
    }

    pub fn render_error(&self) -> &RenderError {
        &self.source
    }
}

/// Runs raw messages through the mapping pipeline.
pub struct ApiGatewaySimulator<'e> {
    engine: &'e TemplateEngine,
}

impl<'e> ApiGatewaySimulator<'e> {
    pub fn new(engine: &'e TemplateEngine) -> Self {
        Self { engine }
    }

    /// Parse `raw`, bind it and render `template`.
    pub fn process(
        &self,
        raw: &str,
        template: &str,
        config: ContextConfiguration,
        mode: Mode,
    ) -> GatewayResult<String> {
        let message = MessageParser::parse(raw)?;
        Ok(self.render_message(&message, template, config, mode)?)
    }

    /// Render `template` for an already parsed message.
    pub fn render_message(
        &self,
        message: &ParsedMessage,
        template: &str,
        config: ContextConfiguration,
        mode: Mode,
    ) -> Result<String, ProcessingError> {
        info!("Processing {} template", mode);
        let bindings = VariableBindingBuilder::build(message, config, mode);

        match TemplateRenderer::new(self.engine).render(template, bindings) {
            Ok(output) => {
                info!("Rendered {} template ({} bytes)", mode, output.len());
                Ok(output)
            }
            Err(e) => {
                let failure = ProcessingError::new(e, mode);
                error!(
                    kind = ?failure.diagnostic().kind,
                    "Error evaluating template: {}", failure
                );
                Err(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::DiagnosticKind;
    use crate::error::GatewayError;

    #[test]
    fn test_process_request() {
        let engine = TemplateEngine::default();
        let simulator = ApiGatewaySimulator::new(&engine);
        let out = simulator
            .process(
                "POST /orders?expand=true\nContent-Type: application/json\n\n{\"qty\": 3}",
                r#"{"qty": $input.path('$.qty'), "expand": "$input.params('expand')", "m": "$context.httpMethod"}"#,
                ContextConfiguration::new(),
                Mode::Request,
            )
            .unwrap();
        assert_eq!(out, r#"{"qty": 3, "expand": "true", "m": "POST"}"#);
    }

    #[test]
    fn test_failure_keeps_source_and_diagnostic() {
        let engine = TemplateEngine::default();
        let err = ApiGatewaySimulator::new(&engine)
            .process("GET /", "$nope", ContextConfiguration::new(), Mode::Request)
            .unwrap_err();

        let processing = err.processing().unwrap();
        assert_eq!(processing.diagnostic().kind, DiagnosticKind::ReferenceError);
        assert_eq!(err.to_string(), processing.diagnostic().message);
        assert!(std::error::Error::source(processing).is_some());
    }

    #[test]
    fn test_malformed_message() {
        let engine = TemplateEngine::default();
        let err = ApiGatewaySimulator::new(&engine)
            .process("", "x", ContextConfiguration::new(), Mode::Request)
            .unwrap_err();
        assert!(matches!(err, GatewayError::Message(_)));
    }
}
