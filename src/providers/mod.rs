/*!
 * Provider implementations for different translation backends.
 *
 * This module contains client implementations for various LLM providers:
 * - Ollama: Local LLM server
 * - OpenAI: OpenAI API and every OpenAI-compatible service (LM Studio, DeepSeek, Qwen, MiMo)
 * - Anthropic: Anthropic API integration
 * - Mock: scriptable in-process provider
 *
 * A [`ProviderFactory`] turns the backend configuration of a job into a
 * ready-to-use provider handle.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::{PipelineError, ProviderError};

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;

/// A single completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
}

/// Text produced by a backend
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub text: String,
    /// Model that answered, as reported by the backend
    pub model: String,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the translation pipeline.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Provider type name, e.g. `ollama`
    fn name(&self) -> &str;

    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The prompt, model and temperature
    ///
    /// # Returns
    /// * `Result<CompletionResponse, ProviderError>` - The response from the provider or an error
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Test the connection to the provider
    ///
    /// # Returns
    /// * `Result<(), ProviderError>` - Ok if the connection is successful, or an error
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

/// Backend selection of a translation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Provider type, e.g. `ollama` or `deepseek`
    pub provider: String,
    pub model: String,
    pub temperature: f32,
}

/// Provider ready for invocation plus the settings of its backend
#[derive(Debug, Clone)]
pub struct ResolvedBackend {
    pub provider: Arc<dyn Provider>,
    /// Provider type used for capability lookup
    pub provider_type: String,
    pub model: String,
    pub temperature: f32,
    /// Per-invocation timeout
    pub timeout: Duration,
}

/// Builds providers for job backend configurations
pub trait ProviderFactory: Send + Sync {
    /// Fails with `PROVIDER_UNCONFIGURED` when the backend cannot be used
    fn resolve(&self, backend: &BackendConfig) -> Result<ResolvedBackend, PipelineError>;
}

/// Whether an API key looks like a value copied from documentation
pub fn is_placeholder_key(api_key: &str) -> bool {
    const PLACEHOLDERS: [&str; 11] = [
        "your_", "your-api", "your_api", "placeholder", "example", "test_key", "sk-xxx", "sk-test",
        "sk-your", "your_key", "changeme",
    ];
    let lowered = api_key.trim().to_lowercase();
    lowered.chars().count() < 10 || PLACEHOLDERS.iter().any(|p| lowered.contains(p))
}

/// Provider factory backed by the `translation` section of the configuration
#[derive(Debug, Clone)]
pub struct ConfiguredProviders {
    config: TranslationConfig,
}

impl ConfiguredProviders {
    pub fn new(config: TranslationConfig) -> Self {
        Self { config }
    }

    fn api_key(&self, provider_type: TranslationProvider, configured: &str) -> Option<String> {
        if !configured.trim().is_empty() {
            return Some(configured.trim().to_string());
        }
        provider_type
            .api_key_env()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl ProviderFactory for ConfiguredProviders {
    fn resolve(&self, backend: &BackendConfig) -> Result<ResolvedBackend, PipelineError> {
        let unconfigured = |reason: String| PipelineError::ProviderUnconfigured {
            provider: backend.provider.clone(),
            reason,
        };

        let provider_type: TranslationProvider = backend
            .provider
            .parse()
            .map_err(|e: anyhow::Error| unconfigured(e.to_string()))?;
        let defaults;
        let settings = match self.config.get_provider_config(&provider_type) {
            Some(settings) => settings,
            None => {
                defaults = crate::app_config::ProviderConfig::new(provider_type);
                &defaults
            }
        };

        let endpoint = if settings.endpoint.trim().is_empty() {
            provider_type.default_endpoint()
        } else {
            settings.endpoint.trim().to_string()
        };
        let model = if backend.model.trim().is_empty() {
            settings.model.clone()
        } else {
            backend.model.trim().to_string()
        };
        if model.is_empty() {
            return Err(unconfigured("no model configured".to_string()));
        }
        let timeout = Duration::from_secs(settings.timeout_secs.max(1));

        let api_key = self.api_key(provider_type, &settings.api_key);
        if provider_type.requires_api_key() {
            match &api_key {
                None => return Err(unconfigured("API key is missing".to_string())),
                Some(key) if is_placeholder_key(key) => {
                    return Err(unconfigured("API key appears to be a placeholder".to_string()));
                }
                Some(_) => {}
            }
        }
        let api_key = api_key.unwrap_or_default();

        let provider: Arc<dyn Provider> = match provider_type {
            TranslationProvider::Ollama => Arc::new(
                ollama::Ollama::new(&endpoint, 11434, timeout).map_err(|e| unconfigured(e.to_string()))?,
            ),
            TranslationProvider::Anthropic => {
                Arc::new(anthropic::Anthropic::new(api_key, endpoint, model.clone(), timeout))
            }
            TranslationProvider::OpenAI
            | TranslationProvider::LMStudio
            | TranslationProvider::DeepSeek
            | TranslationProvider::Qwen
            | TranslationProvider::Mimo => Arc::new(openai::OpenAI::new(
                provider_type.to_lowercase_string(),
                api_key,
                endpoint,
                timeout,
            )),
            TranslationProvider::Mock => Arc::new(mock::MockProvider::working()),
        };

        Ok(ResolvedBackend {
            provider,
            provider_type: provider_type.to_lowercase_string(),
            model,
            temperature: backend.temperature,
            timeout,
        })
    }
}
