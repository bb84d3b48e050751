//! Errors from the Sampler Oracle boundary.

use thiserror::Error;

/// Errors a [`crate::Sampler`] implementation can surface.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SamplerError {
    /// The HTTP/transport call to the model provider failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider rejected the request (bad model name, malformed payload).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The provider's response could not be parsed into a completion string.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The model identifier did not match any known provider prefix.
    #[error("no provider registered for model {0:?}")]
    UnknownModel(String),

    /// Catch-all for errors that don't fit the named variants.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl SamplerError {
    /// Whether retrying the same request might succeed. Mirrors the
    /// Runner's own attempt loop, which retries on any sampler error, but
    /// lets callers short-circuit on non-retryable ones instead.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SamplerError::UnknownModel(_))
    }
}
