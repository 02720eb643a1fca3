/*!
 * Integration tests for the job lifecycle through the job manager
 */

use anyhow::Result;
use serde_json::json;
use mdtranslate::errors::ErrorCode;
use mdtranslate::jobs::{JobEvent, JobManager, JobStatus};
use mdtranslate::providers::mock::MockProvider;
use mdtranslate::translation::ProfileKind;
use mdtranslate::app_config::Config;
use crate::common::{self, FixedProviderFactory};

fn statuses(events: &[JobEvent]) -> Vec<JobStatus> {
    events
        .iter()
        .filter_map(|e| match e {
            JobEvent::StatusChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}

/// Test that a clean first answer completes the job in one attempt
#[tokio::test]
async fn test_job_withCleanTranslation_shouldCompleteInOneAttempt() -> Result<()> {
    let provider = MockProvider::replies([common::ENGLISH_DOC]);
    let (manager, notifier) = common::manager_with(FixedProviderFactory::new(provider.clone()));

    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;
    let snapshot = common::finished(&manager, &job_id).await?;

    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.attempts, 1);
    assert_eq!(snapshot.progress, 100.0);
    assert_eq!(snapshot.profile, Some(ProfileKind::Chat));
    assert!(snapshot.error.is_none());
    assert!(snapshot.finished_at.is_some());
    assert_eq!(manager.result(&job_id)?, common::ENGLISH_DOC);
    assert_eq!(provider.request_count(), 1);

    let events = notifier.events();
    assert_eq!(
        statuses(&events),
        vec![JobStatus::Validating, JobStatus::Translating, JobStatus::Completed]
    );
    assert!(matches!(events.last(), Some(JobEvent::Completed { attempts: 1, .. })));
    Ok(())
}

/// Test that reported progress never decreases
#[tokio::test]
async fn test_job_progressEvents_shouldBeMonotonic() -> Result<()> {
    let provider = MockProvider::replies([common::CHINESE_DOC, common::ENGLISH_DOC]);
    let (manager, notifier) = common::manager_with(FixedProviderFactory::new(provider));

    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;
    common::finished(&manager, &job_id).await?;

    let progress: Vec<f32> = notifier
        .events()
        .iter()
        .filter_map(|e| match e {
            JobEvent::ProgressUpdated { progress, .. } => Some(*progress),
            _ => None,
        })
        .collect();
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
    assert!(progress.iter().all(|p| (0.0..=100.0).contains(p)));
    Ok(())
}

/// Test the mostly-untranslated first answer followed by a good retry
#[tokio::test]
async fn test_job_withHighResidualThenClean_shouldAcceptSecondAttempt() -> Result<()> {
    let untranslated = "# System Design\n\n本文档介绍分布式缓存的架构。\n\n## 组件\n\n缓存节点通过一致性哈希分配数据。";
    let mostly_english = format!("{}\n\nSee the 缓存 section.", common::ENGLISH_DOC);
    let provider = MockProvider::replies([untranslated.to_string(), mostly_english.clone()]);
    let (manager, _) = common::manager_with(FixedProviderFactory::new(provider.clone()));

    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;
    let snapshot = common::finished(&manager, &job_id).await?;

    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.attempts, 2);
    assert!(snapshot.warnings.is_empty());
    assert_eq!(manager.result(&job_id)?, mostly_english);

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].starts_with("IMPORTANT:"));
    assert!(prompts[1].starts_with("IMPORTANT:"));
    Ok(())
}

/// Test that a failed availability probe spends no invocation
#[tokio::test]
async fn test_job_withUnavailableProvider_shouldFailWithoutInvocation() -> Result<()> {
    let provider = MockProvider::unavailable();
    let (manager, notifier) = common::manager_with(FixedProviderFactory::new(provider.clone()));

    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;
    let snapshot = common::finished(&manager, &job_id).await?;

    assert_eq!(snapshot.status, JobStatus::Error);
    assert_eq!(snapshot.attempts, 0);
    assert_eq!(provider.request_count(), 0);
    let error = snapshot.error.expect("error recorded");
    assert_eq!(error.code, ErrorCode::ProviderUnavailable);
    assert_eq!(error.details["provider"], "mock");
    assert_eq!(statuses(&notifier.events()), vec![JobStatus::Validating, JobStatus::Error]);
    Ok(())
}

/// Test that an unknown provider type fails the job as unconfigured
#[tokio::test]
async fn test_job_withUnknownProvider_shouldFailUnconfigured() -> Result<()> {
    let manager = JobManager::from_config(&Config::default());

    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("bard", "bard-1")))?;
    let snapshot = common::finished(&manager, &job_id).await?;

    assert_eq!(snapshot.status, JobStatus::Error);
    assert_eq!(snapshot.error.map(|e| e.code), Some(ErrorCode::ProviderUnconfigured));
    Ok(())
}

/// Test that a reasoning model stops after its smaller budget
#[tokio::test]
async fn test_job_withReasoningModelAndUntranslatedOutput_shouldFailAfterTwoAttempts() -> Result<()> {
    let untranslated = "# 系统\n\n缓存节点通过一致性哈希分配数据。";
    let provider = MockProvider::replies([untranslated; 4]);
    let (manager, _) = common::manager_with(FixedProviderFactory::new(provider.clone()));

    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("ollama", "deepseek-r1:14b")))?;
    let snapshot = common::finished(&manager, &job_id).await?;

    assert_eq!(snapshot.status, JobStatus::Error);
    assert_eq!(snapshot.profile, Some(ProfileKind::Reasoning));
    assert_eq!(snapshot.attempts, 2);
    assert_eq!(provider.request_count(), 2);
    let error = snapshot.error.expect("error recorded");
    assert_eq!(error.code, ErrorCode::TranslationFailed);
    assert_eq!(error.details["attempts"], 2);
    assert!(error.details["residual_ratio"].as_f64().unwrap() > 0.9);
    assert!(manager.result(&job_id).is_err());
    Ok(())
}

/// Test that glossary terms reach the prompt ahead of the document
#[tokio::test]
async fn test_job_withGlossary_shouldThreadTermsIntoPrompt() -> Result<()> {
    let provider = MockProvider::replies([common::ENGLISH_DOC]);
    let (manager, _) = common::manager_with(FixedProviderFactory::new(provider.clone()));
    let spec = common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model"))
        .with_glossary(json!({"一致性哈希": "consistent hashing"}));

    let job_id = manager.start(spec)?;
    common::finished(&manager, &job_id).await?;

    let prompt = &provider.prompts()[0];
    let term_at = prompt.find("- 一致性哈希 → consistent hashing").expect("term listed");
    let document_at = prompt.find("# 系统设计").expect("document included");
    assert!(term_at < document_at);
    Ok(())
}

/// Test that a malformed glossary is rejected before the job exists
#[tokio::test]
async fn test_start_withInvalidGlossary_shouldRejectSynchronously() {
    let provider = MockProvider::working();
    let (manager, notifier) = common::manager_with(FixedProviderFactory::new(provider.clone()));
    let spec = common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model"))
        .with_glossary(json!({"缓存": 42}));

    let err = manager.start(spec).unwrap_err();

    assert_eq!(err.code(), ErrorCode::GlossaryInvalid);
    assert!(manager.list().is_empty());
    assert!(notifier.events().is_empty());
    assert_eq!(provider.request_count(), 0);
}

/// Test that an unsupported language is rejected before the job exists
#[tokio::test]
async fn test_start_withUnknownTargetLanguage_shouldReturnLanguageUnsupported() {
    let (manager, _) = common::manager_with(FixedProviderFactory::new(MockProvider::working()));
    let spec = mdtranslate::jobs::JobSpec::new(
        common::CHINESE_DOC,
        "zh",
        "klingon",
        common::backend("mock", "mock-model"),
    );

    let err = manager.start(spec).unwrap_err();

    assert_eq!(err.code(), ErrorCode::LanguageUnsupported);
    assert_eq!(err.details()["language"], "klingon");
}

/// Test that a pair sharing a script completes with a not-measurable warning
#[tokio::test]
async fn test_job_withSameScriptLanguages_shouldWarnResidualNotMeasurable() -> Result<()> {
    let provider = MockProvider::replies(["# Systementwurf\n\nDieses Dokument beschreibt den Cache."]);
    let (manager, _) = common::manager_with(FixedProviderFactory::new(provider));
    let spec = mdtranslate::jobs::JobSpec::new(
        "# System Design\n\nThis document describes the cache.",
        "en",
        "de",
        common::backend("mock", "mock-model"),
    );

    let job_id = manager.start(spec)?;
    let snapshot = common::finished(&manager, &job_id).await?;

    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.warnings.len(), 1);
    assert!(snapshot.warnings[0].contains("cannot be measured"));
    Ok(())
}

/// Test status queries, listing and retention purge
#[tokio::test]
async fn test_manager_queries_shouldReflectStoredJobs() -> Result<()> {
    let mut config = Config::default();
    config.jobs.retention_secs = 0;
    let manager = JobManager::new(
        config.pipeline.clone(),
        config.jobs.clone(),
        std::sync::Arc::new(FixedProviderFactory::new(MockProvider::working())),
        std::sync::Arc::new(mdtranslate::jobs::NullNotifier),
    );

    let first = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "")))?;
    common::finished(&manager, &first).await?;
    assert_eq!(manager.get_status(&first)?.status, JobStatus::Completed);
    assert_eq!(manager.list().len(), 1);

    assert_eq!(manager.purge_expired(), 1);
    assert_eq!(
        manager.get_status(&first).unwrap_err().code(),
        ErrorCode::JobNotFound
    );
    assert!(manager.list().is_empty());
    Ok(())
}
