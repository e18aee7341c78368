//! # mapsim_gateway
//!
//! Simulates how an API gateway runs mapping templates against requests and
//! backend responses.
//!
//! # Architecture
//!
//! - **Bindings**: [`VariableBindingBuilder`] turns a parsed message and a
//!   [`ContextConfiguration`] into `$input`, `$util`, `$header`, `$path`,
//!   `$query`, `$context` and `$stageVariables`
//! - **Paths**: [`PathResolver`] answers dotted paths and JSONPath queries
//!   against the body
//! - **Rendering**: [`TemplateRenderer`] runs the template on a shared
//!   engine; failures are classified into a [`Diagnostic`]
//! - **Dispatch**: [`ApiGatewaySimulator`] drives one invocation and
//!   [`VtlProcessorHandler`] wraps it in the JSON envelope protocol
//!
//! # Example
//!
//! ```rust
//! use mapsim_gateway::{ApiGatewaySimulator, ContextConfiguration, Mode};
//! use mapsim_vtl::TemplateEngine;
//!
//! let engine = TemplateEngine::default();
//! let simulator = ApiGatewaySimulator::new(&engine);
//!
//! let out = simulator
//!     .process(
//!         "GET /items?limit=5\nAuthorization: token\n\n{\"id\":1}",
//!         "{\"id\": ${input.path('$.id')}, \"limit\": \"$input.params('limit')\"}",
//!         ContextConfiguration::new(),
//!         Mode::Request,
//!     )
//!     .unwrap();
//! assert_eq!(out, "{\"id\": 1, \"limit\": \"5\"}");
//! ```

pub mod bindings;
pub mod classifier;
pub mod context;
pub mod convert;
pub mod error;
pub mod handler;
pub mod input;
pub mod jsonpath;
pub mod path;
pub mod renderer;
pub mod simulator;
pub mod util;

pub use bindings::{Mode, VariableBindingBuilder, VariableBindings};
pub use classifier::{classify, Diagnostic, DiagnosticKind};
pub use context::ContextConfiguration;
pub use error::{GatewayError, GatewayResult};
pub use handler::{HandlerResponse, VtlProcessorHandler};
pub use input::InputAccessor;
pub use path::PathResolver;
pub use renderer::{RenderError, TemplateRenderer};
pub use simulator::{ApiGatewaySimulator, ProcessingError};
pub use util::UtilityFunctions;
