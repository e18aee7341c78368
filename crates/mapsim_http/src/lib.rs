//! # mapsim_http
//!
//! Raw HTTP message parsing for mapsim.
//!
//! Template authors paste requests and backend responses in plain HTTP text
//! form. This crate turns that text into a [`ParsedMessage`] holding the
//! method, path, query parameters, headers and body the gateway would see.
//!
//! ## Example
//!
//! ```rust
//! use mapsim_http::MessageParser;
//!
//! let message = MessageParser::parse("GET /items?limit=5\nAuthorization: token\n\n{\"id\":1}").unwrap();
//! assert_eq!(message.method.as_deref(), Some("GET"));
//! assert_eq!(message.path, "/items");
//! assert_eq!(message.query_params["limit"], "5");
//! assert_eq!(message.body, "{\"id\":1}");
//! ```

pub mod error;
pub mod message;
pub mod parser;

pub use error::{HttpError, HttpResult};
pub use message::ParsedMessage;
pub use parser::MessageParser;
