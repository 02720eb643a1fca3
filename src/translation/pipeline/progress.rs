/*!
 * Weighted progress across the phases of a translation job.
 */

use serde::{Deserialize, Serialize};

/// Phases of the translation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    /// Input and provider checks
    Validation,
    /// Prompt rendering
    PromptConstruction,
    /// Waiting for the backend
    Invocation,
    /// Sanitizing and evaluating the response
    Cleaning,
}

impl PipelinePhase {
    /// Share of the overall progress, in percent
    pub fn weight(&self) -> f32 {
        match self {
            Self::Validation => 10.0,
            Self::PromptConstruction => 10.0,
            Self::Invocation => 60.0,
            Self::Cleaning => 20.0,
        }
    }

    /// Overall progress at the start of the phase, in percent
    pub fn offset(&self) -> f32 {
        match self {
            Self::Validation => 0.0,
            Self::PromptConstruction => 10.0,
            Self::Invocation => 20.0,
            Self::Cleaning => 80.0,
        }
    }
}

/// Progress information during pipeline execution.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineProgress {
    /// Current phase
    pub phase: PipelinePhase,

    /// Progress within current phase (0.0 - 1.0)
    pub phase_progress: f32,

    /// Overall progress (0.0 - 100.0), never decreasing
    pub overall_progress: f32,

    /// Current status message
    pub status: String,

    /// Zero-based attempt whose share of the progress is being filled
    pub attempt: usize,

    /// Attempts the post-validation progress is divided between
    pub max_attempts: usize,
}

impl Default for PipelineProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineProgress {
    /// Create a new progress indicator at the start of validation.
    pub fn new() -> Self {
        Self {
            phase: PipelinePhase::Validation,
            phase_progress: 0.0,
            overall_progress: 0.0,
            status: String::new(),
            attempt: 0,
            max_attempts: 1,
        }
    }

    /// Reserve an equal share of the post-validation progress for each attempt
    pub fn begin_attempt(&mut self, attempt: usize, max_attempts: usize) {
        self.max_attempts = max_attempts.max(1);
        self.attempt = attempt.min(self.max_attempts - 1);
    }

    /// Update progress for current phase.
    pub fn update(&mut self, phase_progress: f32, status: &str) {
        self.phase_progress = phase_progress.clamp(0.0, 1.0);
        self.status = status.to_string();

        let within = self.phase.offset() + self.phase.weight() * self.phase_progress;
        let overall = if self.phase == PipelinePhase::Validation {
            within
        } else {
            let start = PipelinePhase::Validation.weight();
            let share = (100.0 - start) / self.max_attempts as f32;
            start + share * self.attempt as f32 + share * (within - start) / (100.0 - start)
        };
        // A retry re-enters earlier phases; the overall figure must not go back
        self.overall_progress = self.overall_progress.max(overall).min(100.0);
    }

    /// Transition to next phase.
    pub fn next_phase(&mut self, phase: PipelinePhase) {
        self.phase = phase;
        self.phase_progress = 0.0;
        self.status = format!("Starting {:?} phase", phase);
    }

    /// Mark the pipeline as finished
    pub fn complete(&mut self) {
        self.attempt = self.max_attempts - 1;
        self.phase = PipelinePhase::Cleaning;
        self.update(1.0, "Completed");
    }
}
