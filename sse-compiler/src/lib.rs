#![deny(missing_docs)]
//! Translates a declarative ECS configuration document into an ordered
//! list of [`sse_core::Operator`]s plus an initial [`sse_core::State`].

mod compile;
mod config;
mod convert;
mod error;
mod initializer;

pub use compile::{compile, extract_variable_defaults};
pub use config::{ConfigDocument, OperatorTemplate};
pub use convert::json_to_value;
pub use error::ConfigError;
pub use initializer::{is_callable_expression, parse_initializer, substitute_index, Initializer};
