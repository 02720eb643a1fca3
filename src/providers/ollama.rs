/*!
 * Ollama client for locally hosted models.
 *
 * Uses the `/api/generate` endpoint with streaming disabled; some Ollama
 * builds still answer with JSONL chunks, which are stitched back together.
 */

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, CompletionResponse, Provider};

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    /// How long to keep the model loaded in memory
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
}

/// Generation options for the Ollama API
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation (default: 0.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Generated text
    #[serde(default)]
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
    /// Number of prompt tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

/// Model list returned by `/api/tags`
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

impl GenerationRequest {
    /// Create a new non-streaming generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            options: None,
            stream: Some(false),
            keep_alive: None,
        }
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).temperature = Some(temperature);
        self
    }

    /// Let the model generate until it stops on its own
    pub fn unbounded_output(mut self) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).num_predict = Some(-1);
        self
    }

    /// Set the keep-alive duration
    pub fn keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }
}

impl Ollama {
    /// Create a new Ollama client from an endpoint with or without scheme.
    /// `port` applies only when the endpoint names none.
    pub fn new(endpoint: impl AsRef<str>, port: u16, timeout: Duration) -> Result<Self, ProviderError> {
        let endpoint = endpoint.as_ref().trim();
        if endpoint.is_empty() {
            return Err(ProviderError::ConnectionError("Endpoint cannot be empty".to_string()));
        }

        let mut url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            Url::parse(endpoint)
        } else {
            Url::parse(&format!("http://{}", endpoint))
        }
        .map_err(|e| ProviderError::ConnectionError(format!("Invalid endpoint {}: {}", endpoint, e)))?;

        if url.host_str().is_none() {
            return Err(ProviderError::ConnectionError(format!("Invalid host in endpoint: {}", endpoint)));
        }
        if url.port().is_none() {
            url.set_port(Some(port))
                .map_err(|_| ProviderError::ConnectionError(format!("Cannot set port on endpoint: {}", endpoint)))?;
        }

        Ok(Self::from_url(url.as_str(), timeout))
    }

    /// Create a new Ollama client from a complete URL
    ///
    /// Ollama speaks HTTP/1.1 only, connections are kept alive between jobs.
    pub fn from_url(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(timeout)
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate text from the Ollama API
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Ollama API error ({}): {}", status, error_text);
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let response_text = response.text().await?;
        parse_generation_response(&response_text)
    }

    /// Names of the models installed on the server
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), "failed to list models"));
        }
        let tags = response
            .json::<TagsResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

/// Parse a generate response, accepting both a single object and JSONL chunks
pub fn parse_generation_response(response_text: &str) -> Result<GenerationResponse, ProviderError> {
    match serde_json::from_str::<GenerationResponse>(response_text) {
        Ok(generated) => Ok(generated),
        Err(e) => {
            debug!(
                "Ollama response is not a single JSON object ({}), trying JSONL: {}",
                e,
                response_text.chars().take(500).collect::<String>()
            );

            let chunks: Vec<serde_json::Value> = response_text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .filter_map(|line| serde_json::from_str(line).ok())
                .collect();
            if chunks.is_empty() {
                error!("Failed to parse Ollama API response: {}", e);
                return Err(ProviderError::ParseError(e.to_string()));
            }

            let mut full_response = String::new();
            for chunk in &chunks {
                if let Some(part) = chunk.get("response").and_then(|v| v.as_str()) {
                    full_response.push_str(part);
                }
            }

            // The final chunk carries the model name and token counts
            let last = chunks.iter().rev().find(|c| c.get("done").and_then(|v| v.as_bool()).unwrap_or(false));
            let last = last.or(chunks.last());
            let field = |name: &str| last.and_then(|v| v.get(name)).and_then(|v| v.as_u64());

            Ok(GenerationResponse {
                model: last
                    .and_then(|v| v.get("model"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                response: full_response,
                done: true,
                prompt_eval_count: field("prompt_eval_count"),
                eval_count: field("eval_count"),
            })
        }
    }
}

#[async_trait]
impl Provider for Ollama {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let generation = GenerationRequest::new(&request.model, request.prompt)
            .temperature(request.temperature)
            .unbounded_output()
            .keep_alive("10m");
        let response = self.generate(generation).await?;
        Ok(CompletionResponse {
            text: response.response,
            model: if response.model.is_empty() { request.model } else { response.model },
            prompt_tokens: response.prompt_eval_count,
            completion_tokens: response.eval_count,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.list_models()
            .await
            .map(|_| ())
            .map_err(|e| ProviderError::Unavailable(format!("{} ({})", e, self.base_url)))
    }
}
