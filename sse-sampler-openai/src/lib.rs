#![deny(missing_docs)]
//! OpenAI Chat Completions adapter for [`sse_sampler::Sampler`].
//!
//! Chat-style provider: `{messages, model, temperature}` request, reads
//! `choices[0].message.content`, matching
//! `original_source/sampling.py::PROVIDER_REGISTRY['openai']`.

mod types;

use async_trait::async_trait;
use sse_sampler::{Sampler, SamplerError, SampleRequest};
use types::{ChatMessage, ChatRequest, ChatResponse};

/// Default chat completions endpoint.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Talks to OpenAI's Chat Completions API.
pub struct OpenAiSampler {
    api_key: String,
    client: reqwest::Client,
    api_url: String,
}

impl OpenAiSampler {
    /// Build a sampler with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
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
impl Sampler for OpenAiSampler {
    async fn sample(&self, request: &SampleRequest) -> Result<String, SamplerError> {
        let body = ChatRequest {
            model: request.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a helpful assistant.".to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::build_prompt(request),
                },
            ],
            temperature: 0.7,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SamplerError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SamplerError::Transport(e.to_string()))?;

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| SamplerError::InvalidResponse(format!("{e}: {text}")))?;

        if let Some(err) = parsed.error {
            return Err(SamplerError::Rejected(err.message));
        }
        if !status.is_success() {
            return Err(SamplerError::Rejected(format!("HTTP {status}")));
        }

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| SamplerError::InvalidResponse("no choices in response".into()))
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
            "gpt-4o-mini",
        );
        assert_eq!(OpenAiSampler::build_prompt(&request), "hint\n\nhistory");
    }
}
