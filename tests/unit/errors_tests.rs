/*!
 * Tests for error types and their job-boundary representation
 */

use mdtranslate::errors::{ErrorCode, JobFailure, PipelineError, ProviderError};
use mdtranslate::providers::Provider;
use mdtranslate::providers::mock::MockProvider;

/// Test that every pipeline error maps to its stable code
#[test]
fn test_pipeline_error_code_shouldBeStable() {
    let cases = [
        (PipelineError::InputEmpty, "INPUT_EMPTY"),
        (PipelineError::InputTooLarge { size: 2, limit: 1 }, "INPUT_TOO_LARGE"),
        (PipelineError::GlossaryInvalid("x".into()), "GLOSSARY_INVALID"),
        (PipelineError::LanguageUnsupported("xx".into()), "LANGUAGE_UNSUPPORTED"),
        (
            PipelineError::ProviderUnconfigured {
                provider: "openai".into(),
                reason: "API key is missing".into(),
            },
            "PROVIDER_UNCONFIGURED",
        ),
        (
            PipelineError::ProviderUnavailable {
                provider: "ollama".into(),
                reason: "connection refused".into(),
            },
            "PROVIDER_UNAVAILABLE",
        ),
        (PipelineError::JobNotFound("abc".into()), "JOB_NOT_FOUND"),
    ];
    for (error, code) in cases {
        assert_eq!(error.code().as_str(), code);
        assert_eq!(error.code().to_string(), code);
    }
}

/// Test that a job failure carries code, message and details
#[test]
fn test_job_failure_fromTranslationFailed_shouldCarryDiagnostics() {
    let error = PipelineError::TranslationFailed {
        attempts: 3,
        residual_ratio: Some(0.85),
        reason: "residual source text above threshold".into(),
    };
    let failure = JobFailure::from(&error);

    assert_eq!(failure.code, ErrorCode::TranslationFailed);
    assert!(failure.message.contains("3 attempt(s)"));
    assert_eq!(failure.details["attempts"], 3);
    assert_eq!(failure.details["residual_ratio"], 0.85);
    assert!(failure.to_string().starts_with("[TRANSLATION_FAILED]"));
}

/// Test that errors without details serialize without a details field
#[test]
fn test_job_failure_serialization_withoutDetails_shouldOmitField() {
    let failure = JobFailure::from(&PipelineError::InputEmpty);
    let json = serde_json::to_value(&failure).unwrap();
    assert_eq!(json["code"], "INPUT_EMPTY");
    assert!(json.get("details").is_none());

    let parsed: JobFailure = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, failure);
}

/// Test HTTP status classification of provider errors
#[test]
fn test_provider_error_from_status_shouldClassify() {
    assert!(matches!(
        ProviderError::from_status(401, "bad key"),
        ProviderError::AuthenticationError(_)
    ));
    assert!(ProviderError::from_status(429, "slow down").is_transient());
    assert!(ProviderError::from_status(503, "overloaded").is_transient());
    assert!(!ProviderError::from_status(401, "bad key").is_transient());
}

/// Test that an offline backend reports a transient unavailability
#[test]
fn test_unavailable_probe_shouldBeTransient() {
    let result = tokio_test::block_on(async { MockProvider::unavailable().test_connection().await });

    let err = result.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(_)));
    assert!(err.is_transient());
}
