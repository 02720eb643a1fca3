/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockProvider::working()` - Always succeeds with an English document
 * - `MockProvider::scripted()` - Replays a queue of responses and failures
 * - `MockProvider::failing()` - Always fails with a transient error
 * - `MockProvider::unavailable()` - Fails the availability probe
 * - `MockProvider::slow()` - Delays every answer (for timeout and cancellation tests)
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, CompletionResponse, Provider};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a fixed document
    Working,
    /// Replays the scripted queue
    Scripted,
    /// Always fails with a connection error
    Failing,
    /// Probe and invocations fail with `Unavailable`
    Unavailable,
}

/// Text returned by a working mock
pub const MOCK_TRANSLATION: &str = "# Translated document\n\nThis is a mock translation of the source text.";

/// Mock provider for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    behavior: MockBehavior,
    /// Delay applied before every answer
    delay: Option<Duration>,
    /// Queued answers for `Scripted`
    script: Arc<Mutex<VecDeque<Result<String, ProviderError>>>>,
    /// Shared across clones so tests can count invocations
    request_count: Arc<AtomicUsize>,
    /// Prompts received, in order
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            delay: None,
            script: Arc::new(Mutex::new(VecDeque::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Replay `responses` in order; once exhausted every call fails
    pub fn scripted<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<String, ProviderError>>,
    {
        let provider = Self::new(MockBehavior::Scripted);
        provider.script.lock().extend(responses);
        provider
    }

    /// Replay successful responses in order
    pub fn replies<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::scripted(responses.into_iter().map(|r| Ok(r.into())))
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock whose availability probe fails
    pub fn unavailable() -> Self {
        Self::new(MockBehavior::Unavailable)
    }

    /// Create a working mock that answers after `delay_ms`
    pub fn slow(delay_ms: u64) -> Self {
        Self::working().with_delay(Duration::from_millis(delay_ms))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `complete` calls so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(request.prompt.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let text = match self.behavior {
            MockBehavior::Working => MOCK_TRANSLATION.to_string(),
            MockBehavior::Scripted => {
                let next = self.script.lock().pop_front();
                next.unwrap_or_else(|| Err(ProviderError::RequestFailed("mock script exhausted".to_string())))?
            }
            MockBehavior::Failing => {
                return Err(ProviderError::ConnectionError("Mock provider failure".to_string()));
            }
            MockBehavior::Unavailable => {
                return Err(ProviderError::Unavailable("mock provider is offline".to_string()));
            }
        };

        Ok(CompletionResponse {
            completion_tokens: Some(text.len() as u64 / 4),
            prompt_tokens: Some(request.prompt.len() as u64 / 4),
            text,
            model: request.model,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Unavailable => Err(ProviderError::Unavailable("mock provider is offline".to_string())),
            _ => Ok(()),
        }
    }
}
