#![deny(missing_docs)]
//! # sse — umbrella crate
//!
//! Single import surface for the simulation stream engine: the ECS
//! compiler, the Safe Evaluator, the Operator Runner, and the Step
//! Driver, plus a `prelude` for the happy path.

pub use sse_compiler;
pub use sse_core;
pub use sse_driver;
pub use sse_eval;
pub use sse_history;
pub use sse_runner;
pub use sse_sampler;

#[cfg(feature = "openai")]
pub use sse_sampler_openai;

#[cfg(feature = "anthropic")]
pub use sse_sampler_anthropic;

mod error;
mod simulation;

pub use error::SimulationError;
pub use simulation::Simulation;

/// Happy-path imports for composing a simulation.
pub mod prelude {
    pub use sse_compiler::{compile, ConfigDocument, OperatorTemplate};
    pub use sse_core::{HistoryStep, Next, Operator, State, UseLm, Value};
    pub use sse_driver::{CancellationToken, DriverError, StepDriver};
    pub use sse_eval::{Evaluator, FunctionRegistry};
    pub use sse_history::{ContextBuilder, HistoryStore, Query};
    pub use sse_runner::{Runner, RunnerError};
    pub use sse_sampler::{MockSampler, SampleMode, SampleRequest, Sampler, SamplerError};

    pub use crate::{Simulation, SimulationError};
}
