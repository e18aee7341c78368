//! Renders a mapping template against its bindings.

use mapsim_vtl::{EngineError, RenderContext, TemplateEngine};
use thiserror::Error;
use tracing::debug;

use crate::bindings::VariableBindings;

/// A template failed to parse or render.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to render {template}")]
pub struct RenderError {
    template: String,
    #[source]
    source: EngineError,
}

impl RenderError {
    pub fn new(template: impl Into<String>, source: EngineError) -> Self {
        Self {
            template: template.into(),
            source,
        }
    }

    /// Name of the template that failed.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The engine's error.
    pub fn engine(&self) -> &EngineError {
        &self.source
    }
}

/// Renders templates with a shared engine.
pub struct TemplateRenderer<'e> {
    engine: &'e TemplateEngine,
}

impl<'e> TemplateRenderer<'e> {
    pub fn new(engine: &'e TemplateEngine) -> Self {
        Self { engine }
    }

    /// Render `template` once. The bindings are consumed.
    pub fn render(&self, template: &str, bindings: VariableBindings) -> Result<String, RenderError> {
        let name = bindings.mode().template_name();
        debug!("Rendering {} ({} bytes)", name, template.len());

        let mut ctx = RenderContext::from(bindings);
        self.engine
            .evaluate(&mut ctx, name, template)
            .map_err(|e| RenderError::new(name, e))
    }
}
