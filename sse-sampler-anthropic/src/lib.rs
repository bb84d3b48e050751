#![deny(missing_docs)]
//! Anthropic Messages API adapter for [`sse_sampler::Sampler`].
//!
//! Chat-style provider using Anthropic's message format, matching
//! `original_source/sampling.py::PROVIDER_REGISTRY['anthropic']`.

mod types;

use async_trait::async_trait;
use sse_sampler::{Sampler, SamplerError, SampleRequest};
use types::{Message, MessagesRequest, MessagesResponse};

/// Default Messages API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Default `anthropic-version` header value.
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Default max tokens requested per completion, matching the original's
/// fixed `max_tokens: 1024`.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Talks to Anthropic's Messages API.
pub struct AnthropicSampler {
    api_key: String,
    client: reqwest::Client,
    api_url: String,
    api_version: String,
}

impl AnthropicSampler {
    /// Build a sampler with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    /// Override the API URL (for proxies or tests).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    fn build_prompt(request: &SampleRequest) -> String {
        format!("{}\n\n{}", request.prompt, request.context)
    }
}

#[async_trait(?Send)]
impl Sampler for AnthropicSampler {
    async fn sample(&self, request: &SampleRequest) -> Result<String, SamplerError> {
        let body = MessagesRequest {
            model: request.model.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: Self::build_prompt(request),
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| SamplerError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SamplerError::Transport(e.to_string()))?;

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| SamplerError::InvalidResponse(format!("{e}: {text}")))?;

        if let Some(err) = parsed.error {
            return Err(SamplerError::Rejected(err.message));
        }
        if !status.is_success() {
            return Err(SamplerError::Rejected(format!("HTTP {status}")));
        }

        parsed
            .content
            .into_iter()
            .next()
            .map(|c| c.text.trim().to_string())
            .ok_or_else(|| SamplerError::InvalidResponse("no content blocks in response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_prompt_joins_prompt_and_context() {
        let request = SampleRequest::new(
            "hint",
            "history",
            "x",
            sse_core::Value::Int(1),
            sse_sampler::SampleMode::Full,
            "claude-3-5-sonnet",
        );
        assert_eq!(AnthropicSampler::build_prompt(&request), "hint\n\nhistory");
    }
}
