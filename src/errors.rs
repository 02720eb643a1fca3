/*!
 * Error types for the mdtranslate application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions. Errors that cross the
 * job boundary carry a stable machine-readable [`ErrorCode`].
 */

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The invocation did not finish within the backend timeout
    #[error("Request timed out after {secs}s")]
    Timeout {
        /// Configured timeout in seconds
        secs: u64,
    },

    /// The backend answered the availability probe negatively
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Authentication failures and client-side API errors are permanent; the
    /// orchestrator stops spending retry budget on them.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_)
            | Self::ParseError(_)
            | Self::ConnectionError(_)
            | Self::RateLimitExceeded(_)
            | Self::Timeout { .. }
            | Self::Unavailable(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500 || *status_code == 429,
            Self::AuthenticationError(_) => false,
        }
    }

    /// Map an HTTP error status to the matching variant
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else if let Some(status) = error.status() {
            Self::from_status(status.as_u16(), error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Stable machine-readable codes surfaced at the job boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InputEmpty,
    InputTooLarge,
    GlossaryInvalid,
    /// Unknown source or target language code
    LanguageUnsupported,
    ProviderUnconfigured,
    ProviderUnavailable,
    TranslationFailed,
    JobNotFound,
    /// A result was requested before the job completed
    JobNotCompleted,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputEmpty => "INPUT_EMPTY",
            Self::InputTooLarge => "INPUT_TOO_LARGE",
            Self::GlossaryInvalid => "GLOSSARY_INVALID",
            Self::LanguageUnsupported => "LANGUAGE_UNSUPPORTED",
            Self::ProviderUnconfigured => "PROVIDER_UNCONFIGURED",
            Self::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            Self::TranslationFailed => "TRANSLATION_FAILED",
            Self::JobNotFound => "JOB_NOT_FOUND",
            Self::JobNotCompleted => "JOB_NOT_COMPLETED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while executing a translation job
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    /// The source document has no content
    #[error("Source document is empty")]
    InputEmpty,

    /// The source document exceeds the configured size limit
    #[error("Source document is too large: {size} characters (limit {limit})")]
    InputTooLarge {
        /// Document size in characters
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// The glossary failed validation
    #[error("Invalid glossary: {0}")]
    GlossaryInvalid(String),

    /// A language code is not a known ISO 639 code
    #[error("Unsupported language: {0}")]
    LanguageUnsupported(String),

    /// No usable configuration exists for the requested provider
    #[error("Provider '{provider}' is not configured: {reason}")]
    ProviderUnconfigured {
        /// Provider name as requested
        provider: String,
        /// Why the configuration is unusable
        reason: String,
    },

    /// The availability probe failed
    #[error("Provider '{provider}' is unavailable: {reason}")]
    ProviderUnavailable {
        /// Provider name
        provider: String,
        /// Probe failure description
        reason: String,
    },

    /// Retries were exhausted without an acceptable attempt
    #[error("Translation failed after {attempts} attempt(s): {reason}")]
    TranslationFailed {
        /// Invocations performed
        attempts: usize,
        /// Best residual source-language ratio observed, if any attempt produced output
        residual_ratio: Option<f64>,
        /// Human readable reason
        reason: String,
    },

    /// Unknown job identifier
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Result requested before the job completed
    #[error("Job {job_id} has no result (status: {status})")]
    JobNotCompleted {
        /// Job identifier
        job_id: String,
        /// Current status name
        status: String,
    },
}

impl PipelineError {
    /// Stable code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InputEmpty => ErrorCode::InputEmpty,
            Self::InputTooLarge { .. } => ErrorCode::InputTooLarge,
            Self::GlossaryInvalid(_) => ErrorCode::GlossaryInvalid,
            Self::LanguageUnsupported(_) => ErrorCode::LanguageUnsupported,
            Self::ProviderUnconfigured { .. } => ErrorCode::ProviderUnconfigured,
            Self::ProviderUnavailable { .. } => ErrorCode::ProviderUnavailable,
            Self::TranslationFailed { .. } => ErrorCode::TranslationFailed,
            Self::JobNotFound(_) => ErrorCode::JobNotFound,
            Self::JobNotCompleted { .. } => ErrorCode::JobNotCompleted,
        }
    }

    /// Diagnostic payload attached to the error when it is surfaced
    pub fn details(&self) -> Value {
        match self {
            Self::InputTooLarge { size, limit } => json!({ "size": size, "limit": limit }),
            Self::ProviderUnconfigured { provider, .. }
            | Self::ProviderUnavailable { provider, .. } => json!({ "provider": provider }),
            Self::TranslationFailed { attempts, residual_ratio, .. } => {
                json!({ "attempts": attempts, "residual_ratio": residual_ratio })
            }
            Self::JobNotFound(job_id) => json!({ "job_id": job_id }),
            Self::LanguageUnsupported(code) => json!({ "language": code }),
            Self::JobNotCompleted { job_id, status } => json!({ "job_id": job_id, "status": status }),
            Self::InputEmpty | Self::GlossaryInvalid(_) => Value::Null,
        }
    }
}

/// Serializable terminal error stored on a failed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl From<&PipelineError> for JobFailure {
    fn from(error: &PipelineError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
            details: error.details(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
