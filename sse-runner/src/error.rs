//! Runner error taxonomy.

use thiserror::Error;

/// Errors that can escape [`crate::Runner::run`].
///
/// Evaluation failures, shape mismatches, and type mismatches on a sampled
/// candidate are all recovered internally by the retry loop — they never
/// reach here. Only a sampler adapter surrendering after its own internal
/// retries propagates, per the propagation policy: it ends the current
/// step without corrupting state, so callers should log a warning and
/// advance to the next step rather than treat this as fatal.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The sampler adapter surrendered after exhausting its own retries.
    #[error("sampler transport failure: {0}")]
    SamplerTransport(#[from] sse_sampler::SamplerError),

    /// Catch-all for failures that don't fit a named variant.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
