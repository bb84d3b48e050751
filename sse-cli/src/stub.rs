//! A deterministic, offline sampler used when no `--live` provider is
//! requested: echoes the current value straight back, so every LM-tagged
//! operator behaves like a no-op assignment instead of calling out to a
//! model. Useful for exercising a config's control flow without credentials.

use async_trait::async_trait;
use sse_sampler::{SampleMode, SampleRequest, Sampler, SamplerError};

/// Echoes `currentValue` back as the candidate line, every time.
#[derive(Debug, Default)]
pub struct StubSampler;

impl StubSampler {
    /// Build a new stub sampler.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait(?Send)]
impl Sampler for StubSampler {
    async fn sample(&self, request: &SampleRequest) -> Result<String, SamplerError> {
        let rendered = request.current_value.render();
        match request.mode {
            SampleMode::Full => Ok(format!("{} = {rendered}", request.default_assignment)),
            SampleMode::RhsOnly => Ok(rendered),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sse_core::Value;

    #[tokio::test]
    async fn full_mode_echoes_the_whole_assignment() {
        let sampler = StubSampler::new();
        let request = SampleRequest::new("p", "c", "mood", Value::Str("glad".into()), SampleMode::Full, "gpt-4o-mini");
        assert_eq!(sampler.sample(&request).await.unwrap(), "mood = \"glad\"");
    }

    #[tokio::test]
    async fn rhs_only_mode_echoes_just_the_value() {
        let sampler = StubSampler::new();
        let request = SampleRequest::new("p", "c", "mood", Value::Int(3), SampleMode::RhsOnly, "gpt-4o-mini");
        assert_eq!(sampler.sample(&request).await.unwrap(), "3");
    }
}
