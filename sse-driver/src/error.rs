//! Driver error taxonomy.

use thiserror::Error;

/// Errors that can escape [`crate::StepDriver::step`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DriverError {
    /// Cancellation was requested before this step started. The current
    /// step is discarded; state and history remain at the last completed
    /// step.
    #[error("cancellation requested")]
    CancelRequested,

    /// `next` (or the operator looked up for the next step) does not name
    /// a compiled operator.
    #[error("unknown operator id: {0}")]
    UnknownOperator(String),

    /// A [`sse_runner::RunnerError`] escaped the Runner's own recovery —
    /// only a sampler transport surrender reaches here.
    #[error(transparent)]
    Runner(#[from] sse_runner::RunnerError),
}
