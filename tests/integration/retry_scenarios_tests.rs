/*!
 * Integration tests for retry accounting, cleanup of noisy answers and
 * fallback acceptance
 */

use anyhow::Result;
use mdtranslate::errors::{ErrorCode, ProviderError};
use mdtranslate::jobs::JobStatus;
use mdtranslate::providers::mock::MockProvider;
use crate::common::{self, FixedProviderFactory};

const PARTIAL: &str = "# Title\n\nThis is a document. 这是一个关于系统设计的技术文档";

/// Test that transient provider failures consume retries and then succeed
#[tokio::test]
async fn test_retry_withTransientFailures_shouldSucceedOnThirdAttempt() -> Result<()> {
    let provider = MockProvider::scripted([
        Err(ProviderError::Timeout { secs: 5 }),
        Err(ProviderError::from_status(503, "overloaded")),
        Ok(common::ENGLISH_DOC.to_string()),
    ]);
    let (manager, _) = common::manager_with(FixedProviderFactory::new(provider.clone()));

    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;
    let snapshot = common::finished(&manager, &job_id).await?;

    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.attempts, 3);
    assert_eq!(provider.request_count(), 3);
    Ok(())
}

/// Test that authentication failures are not retried
#[tokio::test]
async fn test_retry_withAuthenticationError_shouldStopImmediately() -> Result<()> {
    let provider = MockProvider::scripted([
        Err(ProviderError::from_status(401, "invalid key")),
        Ok(common::ENGLISH_DOC.to_string()),
    ]);
    let (manager, _) = common::manager_with(FixedProviderFactory::new(provider.clone()));

    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;
    let snapshot = common::finished(&manager, &job_id).await?;

    assert_eq!(snapshot.status, JobStatus::Error);
    assert_eq!(provider.request_count(), 1);
    let error = snapshot.error.expect("error recorded");
    assert_eq!(error.code, ErrorCode::TranslationFailed);
    assert!(error.message.contains("invalid key"));
    assert!(error.details["residual_ratio"].is_null());
    Ok(())
}

/// Test that every attempt failing transiently ends without a residual ratio
#[tokio::test]
async fn test_retry_withAlwaysFailingProvider_shouldExhaustBudget() -> Result<()> {
    let provider = MockProvider::failing();
    let (manager, _) = common::manager_with(FixedProviderFactory::new(provider.clone()));

    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;
    let snapshot = common::finished(&manager, &job_id).await?;

    assert_eq!(snapshot.status, JobStatus::Error);
    assert_eq!(snapshot.attempts, 3);
    assert_eq!(provider.request_count(), 3);
    Ok(())
}

/// Test that reasoning narration is stripped from an accepted answer
#[tokio::test]
async fn test_retry_withReasoningNarration_shouldStoreCleanDocument() -> Result<()> {
    let raw = format!(
        "<think>\nThe user wants English. I will keep the headings.\n</think>\n\nHere is the translation:\n\n{}",
        common::ENGLISH_DOC
    );
    let provider = MockProvider::replies([raw]);
    let (manager, _) = common::manager_with(FixedProviderFactory::new(provider));

    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("ollama", "qwq:32b")))?;
    let snapshot = common::finished(&manager, &job_id).await?;

    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(manager.result(&job_id)?, common::ENGLISH_DOC);
    assert!(snapshot.warnings.is_empty());
    Ok(())
}

/// Test that empty answers are unusable and retried
#[tokio::test]
async fn test_retry_withEmptyFirstAnswer_shouldRetry() -> Result<()> {
    let provider = MockProvider::replies(["   ", common::ENGLISH_DOC]);
    let (manager, _) = common::manager_with(FixedProviderFactory::new(provider.clone()));

    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;
    let snapshot = common::finished(&manager, &job_id).await?;

    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.attempts, 2);
    Ok(())
}

/// Test that a moderately incomplete answer is accepted with a warning once retries run out
#[tokio::test]
async fn test_retry_withModerateResidualOnEveryAttempt_shouldFallBackWithWarning() -> Result<()> {
    let provider = MockProvider::replies([PARTIAL; 3]);
    let (manager, notifier) = common::manager_with(FixedProviderFactory::new(provider.clone()));

    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;
    let snapshot = common::finished(&manager, &job_id).await?;

    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.attempts, 3);
    assert_eq!(snapshot.warnings.len(), 1);
    assert!(snapshot.warnings[0].contains("residual"));
    assert_eq!(manager.result(&job_id)?, PARTIAL);
    assert!(notifier
        .events()
        .iter()
        .any(|e| matches!(e, mdtranslate::jobs::JobEvent::WarningRaised { .. })));
    Ok(())
}

/// Test that stricter thresholds from the configuration are honored
#[tokio::test]
async fn test_retry_withStrictFallbackThreshold_shouldFail() -> Result<()> {
    let mut config = mdtranslate::app_config::Config::default();
    config.pipeline.retry.fallback_acceptance_ratio = 0.35;
    let provider = MockProvider::replies([PARTIAL; 3]);
    let manager = mdtranslate::jobs::JobManager::new(
        config.pipeline.clone(),
        config.jobs.clone(),
        std::sync::Arc::new(FixedProviderFactory::new(provider)),
        std::sync::Arc::new(mdtranslate::jobs::NullNotifier),
    );

    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;
    let snapshot = common::finished(&manager, &job_id).await?;

    assert_eq!(snapshot.status, JobStatus::Error);
    let error = snapshot.error.expect("error recorded");
    assert_eq!(error.code, ErrorCode::TranslationFailed);
    let ratio = error.details["residual_ratio"].as_f64().unwrap();
    assert!(ratio > 0.35 && ratio < 0.6, "ratio {}", ratio);
    Ok(())
}
