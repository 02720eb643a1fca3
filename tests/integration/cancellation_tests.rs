/*!
 * Integration tests for cancelling running jobs
 */

use anyhow::Result;
use std::time::Duration;
use mdtranslate::errors::ErrorCode;
use mdtranslate::jobs::{JobEvent, JobStatus};
use mdtranslate::providers::mock::MockProvider;
use crate::common::{self, FixedProviderFactory};

/// Test that cancelling during invocation ends the job as cancelled
#[tokio::test]
async fn test_cancel_duringInvocation_shouldEndCancelled() -> Result<()> {
    let provider = MockProvider::slow(5_000);
    let (manager, notifier) = common::manager_with(FixedProviderFactory::new(provider.clone()));
    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;

    assert!(common::wait_until(|| provider.request_count() == 1).await);
    let ack = manager.cancel(&job_id)?;

    assert!(ack.cancelled);
    assert_eq!(ack.status, JobStatus::Cancelled);
    let snapshot = common::finished(&manager, &job_id).await?;
    assert_eq!(snapshot.status, JobStatus::Cancelled);
    assert!(snapshot.result.is_none());
    assert!(snapshot.progress < 100.0);

    let events = notifier.events();
    assert!(events.iter().any(|e| matches!(e, JobEvent::Cancelled { .. })));
    assert!(!events.iter().any(|e| matches!(e, JobEvent::Completed { .. })));
    Ok(())
}

/// Test that a response arriving after cancellation is never applied
#[tokio::test]
async fn test_cancel_beforeLateResponse_shouldDropResponse() -> Result<()> {
    let provider = MockProvider::slow(150);
    let (manager, notifier) = common::manager_with(FixedProviderFactory::new(provider.clone()));
    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;

    assert!(common::wait_until(|| provider.request_count() == 1).await);
    manager.cancel(&job_id)?;
    let progress_at_cancel = manager.get_status(&job_id)?.progress;
    tokio::time::sleep(Duration::from_millis(400)).await;

    let snapshot = manager.get_status(&job_id)?;
    assert_eq!(snapshot.status, JobStatus::Cancelled);
    assert_eq!(snapshot.progress, progress_at_cancel);
    assert_eq!(provider.request_count(), 1);
    assert_eq!(manager.result(&job_id).unwrap_err().code(), ErrorCode::JobNotCompleted);

    // Nothing about the job is reported after the cancellation event
    let events = notifier.events();
    let cancelled_at = events
        .iter()
        .position(|e| matches!(e, JobEvent::Cancelled { .. }))
        .expect("cancellation reported");
    assert_eq!(cancelled_at, events.len() - 1);
    Ok(())
}

/// Test that cancelling twice is acknowledged without a second transition
#[tokio::test]
async fn test_cancel_twice_shouldReportAlreadyCancelled() -> Result<()> {
    let provider = MockProvider::slow(5_000);
    let (manager, _) = common::manager_with(FixedProviderFactory::new(provider.clone()));
    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;

    assert!(manager.cancel(&job_id)?.cancelled);
    let second = manager.cancel(&job_id)?;

    assert!(!second.cancelled);
    assert_eq!(second.status, JobStatus::Cancelled);
    Ok(())
}

/// Test that a completed job cannot be cancelled
#[tokio::test]
async fn test_cancel_afterCompletion_shouldKeepCompletedState() -> Result<()> {
    let (manager, _) = common::manager_with(FixedProviderFactory::new(MockProvider::replies([common::ENGLISH_DOC])));
    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;
    common::finished(&manager, &job_id).await?;

    let ack = manager.cancel(&job_id)?;

    assert!(!ack.cancelled);
    assert_eq!(ack.status, JobStatus::Completed);
    assert_eq!(manager.result(&job_id)?, common::ENGLISH_DOC);
    Ok(())
}

/// Test that cancelling an unknown job reports it as not found
#[tokio::test]
async fn test_cancel_withUnknownJob_shouldReturnJobNotFound() {
    let (manager, _) = common::manager_with(FixedProviderFactory::new(MockProvider::working()));
    let err = manager.cancel("no-such-job").unwrap_err();
    assert_eq!(err.code(), ErrorCode::JobNotFound);
}

/// Test that an invocation timeout counts as a failed attempt, not a hang
#[tokio::test]
async fn test_invocation_timeout_shouldFailJobAfterBudget() -> Result<()> {
    let provider = MockProvider::slow(2_000);
    let factory = FixedProviderFactory::new(provider.clone()).with_timeout(Duration::from_millis(50));
    let (manager, _) = common::manager_with(factory);
    let job_id = manager.start(common::zh_en_spec(common::CHINESE_DOC, common::backend("mock", "mock-model")))?;

    let snapshot = common::finished(&manager, &job_id).await?;

    assert_eq!(snapshot.status, JobStatus::Error);
    assert_eq!(snapshot.attempts, 3);
    assert!(snapshot.error.expect("error recorded").message.contains("timed out"));
    Ok(())
}
