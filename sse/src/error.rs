//! Errors from wiring a [`crate::Simulation`] together.

use thiserror::Error;

/// Errors that can occur building or stepping a [`crate::Simulation`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The configuration document failed to compile.
    #[error(transparent)]
    Config(#[from] sse_compiler::ConfigError),

    /// A compiled program has no operators to start from.
    #[error("compiled program has no operators")]
    EmptyProgram,

    /// The driver could not be constructed or a step failed.
    #[error(transparent)]
    Driver(#[from] sse_driver::DriverError),
}
