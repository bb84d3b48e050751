#![deny(missing_docs)]
//! Shared types for the simulation stream engine: the dynamic [`Value`]
//! model, the mutable [`State`], [`Operator`]/[`Next`] definitions, and the
//! append-only [`HistoryStep`] record.
//!
//! Every other crate in this workspace (`sse-eval`, `sse-history`,
//! `sse-compiler`, `sse-runner`, `sse-driver`) builds on top of these types
//! rather than redefining them, so that a `Value` produced by the evaluator
//! can be written straight into `State` and read back out by the Runner
//! and Context Builder without any conversion layer.

pub mod history;
pub mod operator;
pub mod state;
pub mod value;

pub use history::HistoryStep;
pub use operator::{Next, Operator, UseLm};
pub use state::{AssignPathError, State, SELF_KEY};
pub use value::{ExpectedType, Handle, HandleOps, Map, Value};
