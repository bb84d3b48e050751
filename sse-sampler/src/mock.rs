//! A canned-response sampler for tests in downstream crates.

use crate::{SampleRequest, Sampler, SamplerError};
use async_trait::async_trait;
use std::cell::RefCell;

/// Returns a fixed queue of responses in order, one per call. Records every
/// request it was asked to sample, so a test can assert on prompts built
/// by the Runner's retry loop.
#[derive(Debug, Default)]
pub struct MockSampler {
    responses: RefCell<std::collections::VecDeque<Result<String, SamplerError>>>,
    requests: RefCell<Vec<SampleRequest>>,
}

impl MockSampler {
    /// A sampler with no queued responses (any call will panic-worthy-error).
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful candidate line to be returned on the next call.
    pub fn push_line(&self, line: impl Into<String>) -> &Self {
        self.responses.borrow_mut().push_back(Ok(line.into()));
        self
    }

    /// Queue an error to be returned on the next call.
    pub fn push_error(&self, err: SamplerError) -> &Self {
        self.responses.borrow_mut().push_back(Err(err));
        self
    }

    /// All requests made so far, in order.
    pub fn requests(&self) -> Vec<SampleRequest> {
        self.requests.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Sampler for MockSampler {
    async fn sample(&self, request: &SampleRequest) -> Result<String, SamplerError> {
        self.requests.borrow_mut().push(request.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(SamplerError::Transport("no more queued responses".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sse_core::Value;

    fn req() -> SampleRequest {
        SampleRequest {
            prompt: "p".into(),
            context: "c".into(),
            default_assignment: "x".into(),
            current_value: Value::Int(1),
            mode: crate::SampleMode::Full,
            model: "gpt-4o-mini".into(),
        }
    }

    #[tokio::test]
    async fn replays_queued_responses_in_order() {
        let sampler = MockSampler::new();
        sampler.push_line("x = 2");
        sampler.push_line("x = 3");
        assert_eq!(sampler.sample(&req()).await.unwrap(), "x = 2");
        assert_eq!(sampler.sample(&req()).await.unwrap(), "x = 3");
        assert_eq!(sampler.requests().len(), 2);
    }

    #[tokio::test]
    async fn errors_when_queue_is_exhausted() {
        let sampler = MockSampler::new();
        assert!(sampler.sample(&req()).await.is_err());
    }
}
