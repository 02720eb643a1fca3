/*!
 * Retry orchestration.
 *
 * One attempt is render, invoke, sanitize, evaluate. The sanitizer only
 * reports; this module decides whether an attempt is accepted, whether the
 * next one escalates, and which attempt wins once the budget is spent.
 */

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::errors::{PipelineError, ProviderError};
use crate::translation::pipeline::{InvocationAdapter, PipelinePhase, PipelineProgress};
use crate::translation::profile::ModelProfile;
use crate::translation::prompts::PromptRenderer;
use crate::translation::sanitizer::{OutputSanitizer, SanitizeStatus, SanitizedOutput};

fn default_acceptance_ratio() -> f64 {
    0.30
}

fn default_fallback_acceptance_ratio() -> f64 {
    0.70
}

/// Residual-ratio thresholds for accepting an attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    // @field: Attempts below this residual ratio are accepted immediately
    #[serde(default = "default_acceptance_ratio")]
    pub acceptance_ratio: f64,

    // @field: Best attempt is still accepted below this ratio once retries run out
    #[serde(default = "default_fallback_acceptance_ratio")]
    pub fallback_acceptance_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            acceptance_ratio: default_acceptance_ratio(),
            fallback_acceptance_ratio: default_fallback_acceptance_ratio(),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("acceptance_ratio", self.acceptance_ratio),
            ("fallback_acceptance_ratio", self.fallback_acceptance_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow::anyhow!("{} must be between 0 and 1, got {}", name, value));
            }
        }
        if self.fallback_acceptance_ratio < self.acceptance_ratio {
            return Err(anyhow::anyhow!(
                "fallback_acceptance_ratio ({}) must not be below acceptance_ratio ({})",
                self.fallback_acceptance_ratio,
                self.acceptance_ratio
            ));
        }
        Ok(())
    }
}

/// Result of evaluating one sanitized attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted,
    /// Usable as a fallback candidate, but above the acceptance ratio
    Rejected { reason: String },
    /// Never usable: invalid status or fatal validation errors
    Unusable { reason: String },
}

/// Final text chosen by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedTranslation {
    pub text: String,
    /// 1-based number of the winning attempt
    pub attempt: usize,
    /// Invocations performed in total
    pub attempts: usize,
    pub residual_ratio: f64,
    pub status: SanitizeStatus,
    /// Accepted under the fallback threshold after the budget was spent
    pub fallback: bool,
}

#[derive(Debug)]
pub enum RetryOutcome {
    Accepted(AcceptedTranslation),
    Cancelled,
    Failed(PipelineError),
}

/// Receives progress and warnings while attempts run
pub trait AttemptObserver: Send + Sync {
    fn progress(&self, progress: &PipelineProgress);
    fn warning(&self, message: &str);
}

/// Observer that ignores everything
pub struct NoopObserver;

impl AttemptObserver for NoopObserver {
    fn progress(&self, _progress: &PipelineProgress) {}
    fn warning(&self, _message: &str) {}
}

struct Candidate {
    attempt: usize,
    output: SanitizedOutput,
}

/// Drives the attempts of one job
#[derive(Debug, Clone)]
pub struct RetryOrchestrator {
    profile: ModelProfile,
    renderer: PromptRenderer,
    sanitizer: OutputSanitizer,
    config: RetryConfig,
}

impl RetryOrchestrator {
    pub fn new(
        profile: ModelProfile,
        renderer: PromptRenderer,
        sanitizer: OutputSanitizer,
        config: RetryConfig,
    ) -> Self {
        Self {
            profile,
            renderer,
            sanitizer,
            config,
        }
    }

    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    /// Decide on one sanitized attempt
    pub fn evaluate(&self, output: &SanitizedOutput) -> Verdict {
        if output.status == SanitizeStatus::Invalid {
            return Verdict::Unusable {
                reason: "sanitizer found no usable content".to_string(),
            };
        }
        if let Some(issue) = output.validation_errors.iter().find(|e| e.fatal) {
            return Verdict::Unusable {
                reason: issue.message.clone(),
            };
        }
        if output.residual_ratio >= self.config.acceptance_ratio {
            return Verdict::Rejected {
                reason: format!(
                    "{:.0}% of the text is still in the source language",
                    output.residual_ratio * 100.0
                ),
            };
        }
        Verdict::Accepted
    }

    /// Run attempts until one is accepted, the budget is spent or the job is cancelled
    pub async fn run(
        &self,
        adapter: &InvocationAdapter,
        document: &str,
        cancel: &CancellationToken,
        progress: &mut PipelineProgress,
        observer: &dyn AttemptObserver,
    ) -> RetryOutcome {
        let max_invocations = self.profile.max_invocations();
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut last_failure: Option<String> = None;
        let mut attempts = 0;

        for attempt in 0..max_invocations {
            if cancel.is_cancelled() {
                return RetryOutcome::Cancelled;
            }
            attempts = attempt + 1;
            progress.begin_attempt(attempt, max_invocations);

            progress.next_phase(PipelinePhase::PromptConstruction);
            let prompt = self.renderer.render(self.profile.template, document, attempt);
            progress.update(1.0, &format!("Prompt for attempt {}/{} ready", attempts, max_invocations));
            observer.progress(progress);

            progress.next_phase(PipelinePhase::Invocation);
            progress.update(0.0, &format!("Waiting for {}", adapter.backend().model));
            observer.progress(progress);

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return RetryOutcome::Cancelled,
                result = adapter.invoke(&prompt.text) => result,
            };
            // A response that raced with cancellation is dropped
            if cancel.is_cancelled() {
                return RetryOutcome::Cancelled;
            }
            progress.update(1.0, &format!("Attempt {}/{} answered", attempts, max_invocations));
            observer.progress(progress);

            let raw = match result {
                Ok(raw) => raw,
                Err(err) if err.is_transient() => {
                    warn!("Attempt {}/{} failed: {}", attempts, max_invocations, err);
                    last_failure = Some(err.to_string());
                    continue;
                }
                Err(err) => return RetryOutcome::Failed(self.provider_failure(attempts, err)),
            };

            progress.next_phase(PipelinePhase::Cleaning);
            let output = self.sanitizer.sanitize(&raw.text, Some(document));
            progress.update(1.0, &format!("Attempt {}/{} cleaned", attempts, max_invocations));
            observer.progress(progress);

            match self.evaluate(&output) {
                Verdict::Accepted => {
                    info!(
                        "Attempt {}/{} accepted (residual {:.1}%)",
                        attempts,
                        max_invocations,
                        output.residual_ratio * 100.0
                    );
                    return RetryOutcome::Accepted(self.accept(attempts, attempts, output, false, observer));
                }
                Verdict::Rejected { reason } => {
                    warn!("Attempt {}/{} rejected: {}", attempts, max_invocations, reason);
                    last_failure = Some(reason);
                    candidates.push(Candidate {
                        attempt: attempts,
                        output,
                    });
                }
                Verdict::Unusable { reason } => {
                    warn!("Attempt {}/{} unusable: {}", attempts, max_invocations, reason);
                    last_failure = Some(reason);
                }
            }
        }

        debug!("Retry budget spent after {} attempts, {} candidates", attempts, candidates.len());
        match select_best(candidates) {
            Some(best) if best.output.residual_ratio < self.config.fallback_acceptance_ratio => {
                observer.warning(&format!(
                    "Accepted attempt {} of {} with {:.0}% residual source-language text after all retries were rejected",
                    best.attempt,
                    attempts,
                    best.output.residual_ratio * 100.0
                ));
                RetryOutcome::Accepted(self.accept(best.attempt, attempts, best.output, true, observer))
            }
            Some(best) => RetryOutcome::Failed(PipelineError::TranslationFailed {
                attempts,
                residual_ratio: Some(best.output.residual_ratio),
                reason: format!(
                    "best attempt still has {:.0}% source-language text",
                    best.output.residual_ratio * 100.0
                ),
            }),
            None => RetryOutcome::Failed(PipelineError::TranslationFailed {
                attempts,
                residual_ratio: None,
                reason: last_failure.unwrap_or_else(|| "no attempt produced usable output".to_string()),
            }),
        }
    }

    fn accept(
        &self,
        attempt: usize,
        attempts: usize,
        output: SanitizedOutput,
        fallback: bool,
        observer: &dyn AttemptObserver,
    ) -> AcceptedTranslation {
        match output.status {
            SanitizeStatus::FallbackMinimal | SanitizeStatus::FallbackOriginal => {
                observer.warning(&format!(
                    "Output cleanup fell back to {} to avoid discarding content",
                    serde_json::to_value(output.status)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default()
                ));
            }
            _ => {}
        }
        AcceptedTranslation {
            text: output.cleaned_text,
            attempt,
            attempts,
            residual_ratio: output.residual_ratio,
            status: output.status,
            fallback,
        }
    }

    fn provider_failure(&self, attempts: usize, err: ProviderError) -> PipelineError {
        warn!("Provider error is not retryable: {}", err);
        PipelineError::TranslationFailed {
            attempts,
            residual_ratio: None,
            reason: err.to_string(),
        }
    }
}

/// Lowest residual ratio wins; on a tie the later attempt wins
fn select_best(candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(best) if best.output.residual_ratio < candidate.output.residual_ratio => Some(best),
        _ => Some(candidate),
    })
}
