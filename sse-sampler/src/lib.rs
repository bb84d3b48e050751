#![deny(missing_docs)]
//! The Sampler Oracle boundary: the one async suspension point in an
//! otherwise synchronous engine (see `sse-runner`'s retry loop).
//!
//! [`Sampler`] is intentionally minimal and object-safe (`Rc<dyn Sampler>`
//! held by the Runner) — unlike `neuron_turn::Provider`'s RPITIT trait,
//! which stays generic because `NeuronTurn<P>` never needs to erase `P`.
//! Here the Runner is built once and handed whichever sampler the embedder
//! chooses, so object safety is worth the `async-trait` macro's cost.

mod error;
pub mod mock;
mod normalize;

pub use error::SamplerError;
pub use mock::MockSampler;
pub use normalize::{select_candidate_line, strip_escaped_quote_wrapper, unescape_quotes};

use async_trait::async_trait;
use sse_core::Value;

/// Whether a sample request wants the whole `lhs = rhs` line echoed back
/// (`Full`) or just the candidate right-hand side (`RhsOnly`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    /// Expect the model to restate `defaultAssignment = <value>` and scan
    /// for that line in its reply.
    Full,
    /// Take the first line of the reply as the right-hand side directly.
    RhsOnly,
}

/// A single sampling request assembled by the Runner.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SampleRequest {
    /// The operator's prompt (or its feedback-augmented retry prompt).
    pub prompt: String,
    /// The truncated, query-filtered history context.
    pub context: String,
    /// The `lhs` of the assignment being sampled, e.g. `state['mood']`.
    pub default_assignment: String,
    /// The current value at `default_assignment`, rendered for display in
    /// the hint the model sees.
    pub current_value: Value,
    /// Which shape of reply is expected.
    pub mode: SampleMode,
    /// The model identifier selecting a provider (`gpt-4o`, `claude-3-5…`).
    pub model: String,
}

impl SampleRequest {
    /// Build a request. `#[non_exhaustive]` blocks struct-literal
    /// construction from other crates, so this is the constructor the
    /// Runner and adapter tests use.
    pub fn new(
        prompt: impl Into<String>,
        context: impl Into<String>,
        default_assignment: impl Into<String>,
        current_value: Value,
        mode: SampleMode,
        model: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            context: context.into(),
            default_assignment: default_assignment.into(),
            current_value,
            mode,
            model: model.into(),
        }
    }
}

/// Produces a candidate assignment line given a prompt, context, and the
/// current default. Implementations talk to a concrete LLM provider; the
/// Runner retries on [`SamplerError`] or on a type-mismatched result.
#[async_trait(?Send)]
pub trait Sampler {
    /// Sample one candidate line for `request`.
    async fn sample(&self, request: &SampleRequest) -> Result<String, SamplerError>;
}

/// The provider family a model identifier selects. Adapter crates
/// (`sse-sampler-openai`, `sse-sampler-anthropic`) each cover one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProviderKind {
    /// `gpt-` prefixed model identifiers.
    OpenAi,
    /// `claude-` prefixed model identifiers.
    Anthropic,
}

/// Dispatch by prefix, mirroring
/// `original_source/sampling.py::MODEL_PROVIDER_MAPPING`. Returns `None`
/// for a model identifier with no matching adapter crate in this
/// workspace (the original's mapping also lists `gemini`, `mistral`, and
/// `llama` prefixes, which have no adapter here).
pub fn provider_kind_for_model(model: &str) -> Option<ProviderKind> {
    if model.starts_with("gpt") {
        Some(ProviderKind::OpenAi)
    } else if model.starts_with("claude") {
        Some(ProviderKind::Anthropic)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_mode_is_copy_and_comparable() {
        assert_eq!(SampleMode::Full, SampleMode::Full);
        assert_ne!(SampleMode::Full, SampleMode::RhsOnly);
    }

    #[test]
    fn provider_kind_dispatches_by_prefix() {
        assert_eq!(provider_kind_for_model("gpt-4o-mini"), Some(ProviderKind::OpenAi));
        assert_eq!(
            provider_kind_for_model("claude-3-5-sonnet"),
            Some(ProviderKind::Anthropic)
        );
        assert_eq!(provider_kind_for_model("gemini-pro"), None);
    }
}
