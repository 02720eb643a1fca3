use anyhow::{anyhow, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::default::Default;

use crate::translation::profile::{CapabilityRule, CapabilityTable};
use crate::translation::retry::RetryConfig;
use crate::translation::sanitizer::SanitizerConfig;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Translation config
    pub translation: TranslationConfig,

    /// Sanitizer, retry and capability settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Job admission and retention
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama
    #[default]
    Ollama,
    // @provider: OpenAI
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
    // @provider: DeepSeek (OpenAI-compatible)
    DeepSeek,
    // @provider: Qwen via DashScope compatible mode
    Qwen,
    // @provider: MiMo translation models (OpenAI-compatible)
    Mimo,
    // @provider: In-process mock for dry runs
    Mock,
}

impl TranslationProvider {
    pub const ALL: [TranslationProvider; 8] = [
        Self::Ollama,
        Self::OpenAI,
        Self::Anthropic,
        Self::LMStudio,
        Self::DeepSeek,
        Self::Qwen,
        Self::Mimo,
        Self::Mock,
    ];

    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::LMStudio => "LM Studio",
            Self::DeepSeek => "DeepSeek",
            Self::Qwen => "Qwen",
            Self::Mimo => "MiMo",
            Self::Mock => "Mock",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
            Self::DeepSeek => "deepseek".to_string(),
            Self::Qwen => "qwen".to_string(),
            Self::Mimo => "mimo".to_string(),
            Self::Mock => "mock".to_string(),
        }
    }

    // @returns: Whether the provider is a cloud API that needs a key
    pub fn requires_api_key(&self) -> bool {
        matches!(
            self,
            Self::OpenAI | Self::Anthropic | Self::DeepSeek | Self::Qwen | Self::Mimo
        )
    }

    // @returns: Environment variable consulted when the config has no key
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::DeepSeek => Some("DEEPSEEK_API_KEY"),
            Self::Qwen => Some("QWEN_API_KEY"),
            Self::Mimo => Some("MIMO_API_KEY"),
            Self::Ollama | Self::LMStudio | Self::Mock => None,
        }
    }

    pub fn default_endpoint(&self) -> String {
        match self {
            Self::Ollama => default_ollama_endpoint(),
            Self::OpenAI => default_openai_endpoint(),
            Self::Anthropic => default_anthropic_endpoint(),
            Self::LMStudio => default_lmstudio_endpoint(),
            Self::DeepSeek => "https://api.deepseek.com/v1".to_string(),
            Self::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
            Self::Mimo => "https://api.xiaomimimo.com/v1".to_string(),
            Self::Mock => String::new(),
        }
    }

    pub fn default_model(&self) -> String {
        match self {
            Self::Ollama => default_ollama_model(),
            Self::OpenAI => default_openai_model(),
            Self::Anthropic => default_anthropic_model(),
            Self::LMStudio => default_lmstudio_model(),
            Self::DeepSeek => "deepseek-chat".to_string(),
            Self::Qwen => "qwen-plus".to_string(),
            Self::Mimo => "mimo-v2-flash".to_string(),
            Self::Mock => "mock-model".to_string(),
        }
    }

    fn default_timeout_secs(&self) -> u64 {
        match self {
            Self::Ollama | Self::LMStudio => default_local_timeout_secs(),
            Self::Mock => 5,
            _ => default_timeout_secs(),
        }
    }
}

// Implement Display trait for TranslationProvider
impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Implement FromStr trait for TranslationProvider
impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.to_lowercase_string() == lowered)
            .ok_or_else(|| anyhow!("Invalid provider type: {}", s))
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Invocation timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model: provider_type.default_model(),
            api_key: String::new(),
            endpoint: provider_type.default_endpoint(),
            timeout_secs: provider_type.default_timeout_secs(),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Model override for the active provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Temperature parameter for text generation (0.0 to 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,
}

/// Pipeline thresholds and capability overrides
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub sanitizer: SanitizerConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Extra capability rules, checked before the built-in ones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<CapabilityRule>,
}

impl PipelineConfig {
    pub fn capability_table(&self) -> CapabilityTable {
        CapabilityTable::builtin().with_rules(self.profiles.clone())
    }
}

/// Job admission and retention settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JobsConfig {
    /// Largest accepted document, in characters
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// How long terminal jobs stay queryable
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Timeout of the availability probe
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            retention_secs: default_retention_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_local_timeout_secs() -> u64 {
    600
}

fn default_temperature() -> f32 {
    0.3
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_lmstudio_endpoint() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_ollama_model() -> String {
    "qwen2.5:7b".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_lmstudio_model() -> String {
    "local-model".to_string()
}

fn default_max_input_chars() -> usize {
    10_000_000
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_probe_timeout_secs() -> u64 {
    10
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        let _source_name = crate::language_utils::get_language_name(&self.source_language)?;
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;
        if crate::language_utils::language_codes_match(&self.source_language, &self.target_language) {
            return Err(anyhow!(
                "Source and target language are the same: {}",
                self.source_language
            ));
        }

        if !(0.0..=2.0).contains(&self.translation.temperature) {
            return Err(anyhow!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.translation.temperature
            ));
        }

        for provider in &self.translation.available_providers {
            provider.provider_type.parse::<TranslationProvider>()?;
            if provider.timeout_secs == 0 {
                return Err(anyhow!("timeout_secs must be positive for {}", provider.provider_type));
            }
        }

        self.pipeline.sanitizer.validate()?;
        self.pipeline.retry.validate()?;

        if self.jobs.max_input_chars == 0 {
            return Err(anyhow!("jobs.max_input_chars must be positive"));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "zh".to_string(),
            target_language: "en".to_string(),
            translation: TranslationConfig::default(),
            pipeline: PipelineConfig::default(),
            jobs: JobsConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(model) = self.model.as_ref().filter(|m| !m.trim().is_empty()) {
            return model.clone();
        }

        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        // Default fallback based on provider type
        self.provider.default_model()
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            model: None,
            temperature: default_temperature(),
            available_providers: [
                TranslationProvider::Ollama,
                TranslationProvider::OpenAI,
                TranslationProvider::Anthropic,
                TranslationProvider::LMStudio,
                TranslationProvider::DeepSeek,
            ]
            .into_iter()
            .map(ProviderConfig::new)
            .collect(),
        }
    }
}
