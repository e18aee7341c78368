//! # mapsim_vtl
//!
//! Velocity-compatible template engine used to render API gateway mapping
//! templates.
//!
//! # Architecture
//!
//! - **Parser**: turns template source into a node tree, reporting syntax
//!   errors with line and column
//! - **Evaluator**: renders the tree against a [`RenderContext`]
//! - **Values**: [`Value`] covers scalars, shared lists and maps, and host
//!   objects implementing [`TemplateObject`]
//!
//! # Example
//!
//! ```rust
//! use mapsim_vtl::{RenderContext, TemplateEngine, EngineConfig};
//!
//! let engine = TemplateEngine::new(EngineConfig::default());
//! let mut ctx = RenderContext::new();
//! ctx.put("name", "world");
//!
//! let out = engine
//!     .evaluate(&mut ctx, "greeting", "#if($name)Hello, $name!#end")
//!     .unwrap();
//! assert_eq!(out, "Hello, world!");
//! ```

pub mod ast;
pub mod context;
pub mod engine;
pub mod error;
mod evaluator;
mod methods;
pub mod parser;
pub mod value;

pub use context::RenderContext;
pub use engine::{EngineConfig, Template, TemplateEngine};
pub use error::{EngineError, EngineResult, InvocationCause};
pub use value::{format_double, MethodError, TemplateObject, Value};
