/*!
 * Job manager: owns the job store and drives each job through its lifecycle.
 *
 * This module handles:
 * - Admission checks (empty or oversized document, languages, glossary)
 * - One Tokio task per job running validation, probe and attempts
 * - Non-blocking status reads, cancellation and result retrieval
 * - Retention of terminal jobs
 *
 * The store lock is only held for short synchronous updates, never across
 * an await, so status reads never wait on an in-flight invocation.
 */

use log::{debug, error, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::app_config::{Config, JobsConfig, PipelineConfig};
use crate::errors::{JobFailure, PipelineError};
use crate::language_utils;
use crate::providers::{ConfiguredProviders, ProviderFactory};
use crate::translation::glossary::{GlossaryLoader, GlossaryMapping};
use crate::translation::pipeline::{InvocationAdapter, PipelineProgress};
use crate::translation::profile::CapabilityTable;
use crate::translation::prompts::PromptRenderer;
use crate::translation::retry::{AttemptObserver, RetryOrchestrator, RetryOutcome};
use crate::translation::sanitizer::OutputSanitizer;

use super::events::{JobEvent, LogNotifier, NotificationChannel};
use super::models::{JobSnapshot, JobSpec, JobStatus, TranslationJob};

/// Acknowledgement of a cancellation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelAck {
    pub job_id: String,
    /// Status after the request was handled
    pub status: JobStatus,
    /// False when the job had already reached a terminal state
    pub cancelled: bool,
}

struct JobEntry {
    job: TranslationJob,
    cancel: CancellationToken,
    status_tx: watch::Sender<JobStatus>,
}

struct Inner {
    jobs: RwLock<HashMap<String, JobEntry>>,
    capabilities: Arc<CapabilityTable>,
    providers: Arc<dyn ProviderFactory>,
    notifier: Arc<dyn NotificationChannel>,
    pipeline: PipelineConfig,
    limits: JobsConfig,
}

/// Job manager handling the translation job lifecycle
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

impl JobManager {
    /// Create a job manager with an explicit provider factory and notification channel
    pub fn new(
        pipeline: PipelineConfig,
        limits: JobsConfig,
        providers: Arc<dyn ProviderFactory>,
        notifier: Arc<dyn NotificationChannel>,
    ) -> Self {
        let capabilities = Arc::new(pipeline.capability_table());
        Self {
            inner: Arc::new(Inner {
                jobs: RwLock::new(HashMap::new()),
                capabilities,
                providers,
                notifier,
                pipeline,
                limits,
            }),
        }
    }

    /// Create a job manager from the application configuration, logging every event
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.pipeline.clone(),
            config.jobs.clone(),
            Arc::new(ConfiguredProviders::new(config.translation.clone())),
            Arc::new(LogNotifier),
        )
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.inner.capabilities
    }

    // =========================================================================
    // Job Creation
    // =========================================================================

    /// Validate a job spec and start it in the background.
    ///
    /// Must be called from within a Tokio runtime. Malformed input is
    /// rejected here, before any backend is contacted.
    pub fn start(&self, spec: JobSpec) -> Result<String, PipelineError> {
        if spec.document.trim().is_empty() {
            return Err(PipelineError::InputEmpty);
        }
        let size = spec.document.chars().count();
        if size > self.inner.limits.max_input_chars {
            return Err(PipelineError::InputTooLarge {
                size,
                limit: self.inner.limits.max_input_chars,
            });
        }
        for code in [&spec.source_language, &spec.target_language] {
            if language_utils::validate_language_code(code).is_err() {
                return Err(PipelineError::LanguageUnsupported(code.clone()));
            }
        }
        let glossary = match &spec.glossary {
            Some(value) => GlossaryLoader::from_value(value)?,
            None => GlossaryMapping::new(),
        };

        self.purge_expired();

        let job_id = Uuid::new_v4().to_string();
        let mut job = TranslationJob::new(job_id.clone(), spec, glossary);
        job.transition(JobStatus::Validating);
        let (status_tx, _) = watch::channel(job.status);
        let cancel = CancellationToken::new();

        info!(
            "Starting job {} ({} → {}, {} chars, {}/{})",
            short_id(&job_id),
            job.source_language,
            job.target_language,
            size,
            job.backend.provider,
            job.backend.model
        );

        self.inner.jobs.write().insert(
            job_id.clone(),
            JobEntry {
                job,
                cancel: cancel.clone(),
                status_tx,
            },
        );
        self.inner.notifier.notify(JobEvent::StatusChanged {
            job_id: job_id.clone(),
            from: JobStatus::Idle,
            to: JobStatus::Validating,
        });

        tokio::spawn(run_job(self.inner.clone(), job_id.clone(), cancel));
        Ok(job_id)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current view of a job; never waits on the job's task
    pub fn get_status(&self, job_id: &str) -> Result<JobSnapshot, PipelineError> {
        self.inner
            .jobs
            .read()
            .get(job_id)
            .map(|entry| entry.job.snapshot())
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))
    }

    /// Translated text of a completed job
    pub fn result(&self, job_id: &str) -> Result<String, PipelineError> {
        let jobs = self.inner.jobs.read();
        let entry = jobs
            .get(job_id)
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;
        match (&entry.job.status, &entry.job.result) {
            (JobStatus::Completed, Some(result)) => Ok(result.clone()),
            (status, _) => Err(PipelineError::JobNotCompleted {
                job_id: job_id.to_string(),
                status: status.to_string(),
            }),
        }
    }

    /// Snapshots of every stored job, oldest first
    pub fn list(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self.inner.jobs.read().values().map(|e| e.job.snapshot()).collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Wait until a job reaches a terminal state
    pub async fn wait(&self, job_id: &str) -> Result<JobSnapshot, PipelineError> {
        let mut rx = {
            let jobs = self.inner.jobs.read();
            let entry = jobs
                .get(job_id)
                .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;
            entry.status_tx.subscribe()
        };
        rx.wait_for(|status| status.is_terminal())
            .await
            .map_err(|_| PipelineError::JobNotFound(job_id.to_string()))?;
        self.get_status(job_id)
    }

    // =========================================================================
    // Cancellation and retention
    // =========================================================================

    /// Cancel a running job; the job is terminal when this returns
    pub fn cancel(&self, job_id: &str) -> Result<CancelAck, PipelineError> {
        let mut jobs = self.inner.jobs.write();
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;

        let from = entry.job.status;
        if !entry.job.transition(JobStatus::Cancelled) {
            debug!("Job {} is already {}, nothing to cancel", short_id(job_id), from);
            return Ok(CancelAck {
                job_id: job_id.to_string(),
                status: from,
                cancelled: false,
            });
        }
        entry.cancel.cancel();
        entry.status_tx.send_replace(JobStatus::Cancelled);
        let progress = entry.job.progress;
        drop(jobs);

        info!("Job {} cancelled at {:.0}%", short_id(job_id), progress);
        self.inner.notifier.notify(JobEvent::StatusChanged {
            job_id: job_id.to_string(),
            from,
            to: JobStatus::Cancelled,
        });
        self.inner.notifier.notify(JobEvent::Cancelled {
            job_id: job_id.to_string(),
            progress,
        });
        Ok(CancelAck {
            job_id: job_id.to_string(),
            status: JobStatus::Cancelled,
            cancelled: true,
        })
    }

    /// Drop terminal jobs older than the retention window; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let retention = self.inner.limits.retention_secs as i64;
        let now = chrono::Utc::now();
        let mut jobs = self.inner.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, entry| match entry.job.finished_at {
            Some(finished) if entry.job.status.is_terminal() => (now - finished).num_seconds() < retention,
            _ => true,
        });
        let removed = before - jobs.len();
        if removed > 0 {
            debug!("Purged {} expired job(s)", removed);
        }
        removed
    }
}

impl Inner {
    /// Apply `f` to a live job; returns None when the job is gone or terminal
    fn with_active_job<R>(&self, job_id: &str, f: impl FnOnce(&mut TranslationJob) -> R) -> Option<R> {
        let mut jobs = self.jobs.write();
        let entry = jobs.get_mut(job_id)?;
        if entry.job.status.is_terminal() {
            return None;
        }
        Some(f(&mut entry.job))
    }

    /// Move a job to `next` and notify; false when the job was cancelled meanwhile
    fn transition(&self, job_id: &str, next: JobStatus) -> bool {
        self.finish(job_id, next, |_| {})
    }

    fn warn(&self, job_id: &str, message: &str) {
        let applied = self.with_active_job(job_id, |job| job.warnings.push(message.to_string()));
        if applied.is_some() {
            self.notifier.notify(JobEvent::WarningRaised {
                job_id: job_id.to_string(),
                message: message.to_string(),
            });
        }
    }

    fn report(&self, job_id: &str, progress: &PipelineProgress) {
        let advanced = self
            .with_active_job(job_id, |job| job.advance(progress.overall_progress))
            .unwrap_or(false);
        if advanced {
            self.notifier.notify(JobEvent::ProgressUpdated {
                job_id: job_id.to_string(),
                progress: progress.overall_progress,
                phase: progress.phase,
                message: progress.status.clone(),
            });
        }
    }

    /// Apply `f` and move the job to `next` under one lock
    fn finish(&self, job_id: &str, next: JobStatus, f: impl FnOnce(&mut TranslationJob)) -> bool {
        let from = {
            let mut jobs = self.jobs.write();
            let Some(entry) = jobs.get_mut(job_id) else {
                return false;
            };
            let from = entry.job.status;
            if !from.can_transition_to(next) {
                return false;
            }
            f(&mut entry.job);
            entry.job.transition(next);
            entry.status_tx.send_replace(next);
            from
        };
        self.notifier.notify(JobEvent::StatusChanged {
            job_id: job_id.to_string(),
            from,
            to: next,
        });
        true
    }

    fn fail(&self, job_id: &str, err: PipelineError) {
        let failure = JobFailure::from(&err);
        let applied = self.finish(job_id, JobStatus::Error, |job| {
            if let PipelineError::TranslationFailed { attempts, .. } = &err {
                job.attempts = *attempts;
            }
            job.failure = Some(failure.clone());
        });
        if applied {
            error!("Job {} failed: {}", short_id(job_id), failure);
            self.notifier.notify(JobEvent::Failed {
                job_id: job_id.to_string(),
                error: failure,
            });
        }
    }
}

/// Forwards attempt progress and warnings into the job record
struct JobObserver<'a> {
    inner: &'a Inner,
    job_id: &'a str,
}

impl AttemptObserver for JobObserver<'_> {
    fn progress(&self, progress: &PipelineProgress) {
        self.inner.report(self.job_id, progress);
    }

    fn warning(&self, message: &str) {
        self.inner.warn(self.job_id, message);
    }
}

async fn run_job(inner: Arc<Inner>, job_id: String, cancel: CancellationToken) {
    let Some(job) = inner.jobs.read().get(&job_id).map(|e| e.job.clone()) else {
        return;
    };
    let observer = JobObserver {
        inner: inner.as_ref(),
        job_id: &job_id,
    };
    let mut progress = PipelineProgress::new();

    // Validation: backend resolution and availability probe
    let backend = match inner.providers.resolve(&job.backend) {
        Ok(backend) => backend,
        Err(err) => return inner.fail(&job_id, err),
    };
    progress.update(0.3, "Backend resolved");
    observer.progress(&progress);

    let adapter = InvocationAdapter::new(backend);
    let probe_timeout = Duration::from_secs(inner.limits.probe_timeout_secs.max(1));
    let probe = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        probe = adapter.probe(probe_timeout) => probe,
    };
    if cancel.is_cancelled() {
        return;
    }
    if let Err(err) = probe {
        return inner.fail(
            &job_id,
            PipelineError::ProviderUnavailable {
                provider: job.backend.provider.clone(),
                reason: err.to_string(),
            },
        );
    }
    progress.update(0.7, "Backend available");
    observer.progress(&progress);

    let profile = inner
        .capabilities
        .classify(&adapter.backend().provider_type, &adapter.backend().model);
    info!(
        "Job {} uses the {} profile (retry budget {})",
        short_id(&job_id),
        profile.kind,
        profile.retry_budget
    );
    inner.with_active_job(&job_id, |j| j.profile = Some(profile.kind));

    let prepared = PromptRenderer::new(&job.source_language, &job.target_language).and_then(|renderer| {
        let sanitizer = OutputSanitizer::new(inner.pipeline.sanitizer.clone())
            .with_languages(&job.source_language, &job.target_language)?
            .with_glossary(job.glossary.clone());
        Ok((renderer.with_glossary(job.glossary.clone()), sanitizer))
    });
    let (renderer, sanitizer) = match prepared {
        Ok(prepared) => prepared,
        Err(err) => return inner.fail(&job_id, PipelineError::LanguageUnsupported(err.to_string())),
    };
    if !sanitizer.residual_measurable() {
        observer.warning(&format!(
            "Residual source-language text cannot be measured for {} → {}; attempts are accepted on validation alone",
            renderer.source_language(),
            renderer.target_language()
        ));
    }
    progress.update(1.0, "Validation complete");
    observer.progress(&progress);

    if cancel.is_cancelled() || !inner.transition(&job_id, JobStatus::Translating) {
        return;
    }

    let orchestrator = RetryOrchestrator::new(profile, renderer, sanitizer, inner.pipeline.retry.clone());
    let outcome = orchestrator
        .run(&adapter, &job.document, &cancel, &mut progress, &observer)
        .await;

    match outcome {
        RetryOutcome::Accepted(accepted) => {
            progress.complete();
            let applied = inner.finish(&job_id, JobStatus::Completed, |j| {
                j.advance(progress.overall_progress);
                j.attempts = accepted.attempts;
                j.result = Some(accepted.text.clone());
            });
            if applied {
                inner.notifier.notify(JobEvent::Completed {
                    job_id: job_id.clone(),
                    attempts: accepted.attempts,
                    residual_ratio: accepted.residual_ratio,
                });
            } else {
                debug!("Job {} finished after it was cancelled; result dropped", short_id(&job_id));
            }
        }
        RetryOutcome::Cancelled => {
            debug!("Job {} stopped on cancellation", short_id(&job_id));
        }
        RetryOutcome::Failed(err) => inner.fail(&job_id, err),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
