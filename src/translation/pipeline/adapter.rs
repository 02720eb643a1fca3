/*!
 * Provider invocation adapter.
 *
 * Wraps a resolved backend so that the retry orchestrator sees exactly one
 * operation per attempt: send a prompt, get raw text or a failure. The
 * per-backend timeout is enforced here and surfaces as an ordinary
 * `ProviderError::Timeout`.
 */

use log::debug;
use std::time::{Duration, Instant};

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, ResolvedBackend};

/// Raw text of one attempt; never outlives the attempt
#[derive(Debug, Clone, PartialEq)]
pub struct RawModelResponse {
    pub text: String,
    pub latency: Duration,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

/// Single-call interface to one backend
#[derive(Debug, Clone)]
pub struct InvocationAdapter {
    backend: ResolvedBackend,
}

impl InvocationAdapter {
    pub fn new(backend: ResolvedBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &ResolvedBackend {
        &self.backend
    }

    /// Send one prompt to the backend within the backend timeout
    pub async fn invoke(&self, prompt: &str) -> Result<RawModelResponse, ProviderError> {
        let request = CompletionRequest {
            prompt: prompt.to_string(),
            model: self.backend.model.clone(),
            temperature: self.backend.temperature,
        };

        let started = Instant::now();
        let response = tokio::time::timeout(self.backend.timeout, self.backend.provider.complete(request))
            .await
            .map_err(|_| ProviderError::Timeout {
                secs: self.backend.timeout.as_secs(),
            })??;
        let latency = started.elapsed();

        debug!(
            "{} answered in {:.1}s ({} chars)",
            self.backend.provider_type,
            latency.as_secs_f32(),
            response.text.chars().count()
        );

        Ok(RawModelResponse {
            text: response.text,
            latency,
            provider: self.backend.provider_type.clone(),
            model: response.model,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        })
    }

    /// Availability probe bounded by `timeout`
    pub async fn probe(&self, timeout: Duration) -> Result<(), ProviderError> {
        tokio::time::timeout(timeout, self.backend.provider.test_connection())
            .await
            .map_err(|_| ProviderError::Timeout { secs: timeout.as_secs() })?
    }
}
