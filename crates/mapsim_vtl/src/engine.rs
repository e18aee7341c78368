//! Engine configuration and the public rendering entry points.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::Node;
use crate::context::RenderContext;
use crate::error::EngineResult;
use crate::evaluator::Evaluator;
use crate::parser;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Undefined references and member access on null fail the render
    /// instead of yielding null.
    pub strict_references: bool,

    /// Templates available to `#parse` and `#include`, by name.
    pub resources: HashMap<String, String>,

    /// Maximum `#parse` nesting.
    pub max_parse_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_references: true,
            resources: HashMap::new(),
            max_parse_depth: 10,
        }
    }
}

impl EngineConfig {
    pub fn with_strict_references(mut self, strict: bool) -> Self {
        self.strict_references = strict;
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.resources.insert(name.into(), source.into());
        self
    }
}

/// A parsed template, reusable across renders.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

/// Template engine.
///
/// Holds only configuration; one instance can serve any number of renders.
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    config: EngineConfig,
}

impl TemplateEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse `source`; `name` identifies it in error messages.
    pub fn parse(&self, name: &str, source: &str) -> EngineResult<Template> {
        debug!("Parsing template {} ({} chars)", name, source.len());
        Ok(Template {
            name: name.to_string(),
            nodes: parser::parse(name, source)?,
        })
    }

    /// Render a parsed template against `ctx`.
    pub fn render(&self, template: &Template, ctx: &mut RenderContext) -> EngineResult<String> {
        Evaluator::new(&self.config, &template.name).render(&template.nodes, ctx)
    }

    /// Parse and render in one step.
    pub fn evaluate(&self, ctx: &mut RenderContext, name: &str, source: &str) -> EngineResult<String> {
        let template = self.parse(name, source)?;
        self.render(&template, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_yaml() {
        let config: EngineConfig = serde_yaml::from_str("resources:\n  header.vtl: \"x\"\n").unwrap();
        assert!(config.strict_references);
        assert_eq!(config.max_parse_depth, 10);
        assert_eq!(config.resources.get("header.vtl").map(String::as_str), Some("x"));
    }

    #[test]
    fn test_parse_once_render_twice() {
        let engine = TemplateEngine::default();
        let template = engine.parse("t", "Hi $name").unwrap();
        assert_eq!(template.name(), "t");

        let mut ctx = RenderContext::new();
        ctx.put("name", "Ana");
        let first = engine.render(&template, &mut ctx).unwrap();
        let second = engine.render(&template, &mut ctx).unwrap();
        assert_eq!(first, "Hi Ana");
        assert_eq!(first, second);
    }
}
