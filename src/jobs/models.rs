/*!
 * Job records and the status state machine.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::JobFailure;
use crate::providers::BackendConfig;
use crate::translation::glossary::GlossaryMapping;
use crate::translation::profile::ProfileKind;

/// Lifecycle state of a translation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet picked up
    Idle,
    /// Backend resolution and availability probe
    Validating,
    /// Attempts are running
    Translating,
    Completed,
    Error,
    Cancelled,
}

impl JobStatus {
    /// Completed, error and cancelled accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }

    /// Whether the state machine allows moving to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Idle, Error)
                | (Validating, Translating)
                | (Validating, Error)
                | (Validating, Cancelled)
                | (Translating, Completed)
                | (Translating, Error)
                | (Translating, Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Idle => write!(f, "idle"),
            JobStatus::Validating => write!(f, "validating"),
            JobStatus::Translating => write!(f, "translating"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Error => write!(f, "error"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(JobStatus::Idle),
            "validating" => Ok(JobStatus::Validating),
            "translating" => Ok(JobStatus::Translating),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Everything needed to start a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Markdown source document
    pub document: String,
    /// ISO 639 code of the document language
    pub source_language: String,
    /// ISO 639 code of the translation language
    pub target_language: String,
    /// Unvalidated glossary object of source term to target term
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glossary: Option<serde_json::Value>,
    pub backend: BackendConfig,
}

impl JobSpec {
    pub fn new(
        document: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        backend: BackendConfig,
    ) -> Self {
        Self {
            document: document.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            glossary: None,
            backend,
        }
    }

    pub fn with_glossary(mut self, glossary: serde_json::Value) -> Self {
        self.glossary = Some(glossary);
        self
    }
}

/// Job record owned by the job manager
#[derive(Debug, Clone)]
pub struct TranslationJob {
    pub id: String,
    pub document: String,
    pub source_language: String,
    pub target_language: String,
    pub glossary: GlossaryMapping,
    pub backend: BackendConfig,
    pub status: JobStatus,
    /// 0 - 100, never decreasing
    pub progress: f32,
    pub warnings: Vec<String>,
    pub profile: Option<ProfileKind>,
    pub attempts: usize,
    pub result: Option<String>,
    pub failure: Option<JobFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TranslationJob {
    pub fn new(id: String, spec: JobSpec, glossary: GlossaryMapping) -> Self {
        let now = Utc::now();
        Self {
            id,
            document: spec.document,
            source_language: spec.source_language,
            target_language: spec.target_language,
            glossary,
            backend: spec.backend,
            status: JobStatus::Idle,
            progress: 0.0,
            warnings: Vec::new(),
            profile: None,
            attempts: 0,
            result: None,
            failure: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Apply a transition; returns false when the state machine forbids it
    pub fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        if next.is_terminal() {
            self.finished_at = Some(self.updated_at);
        }
        true
    }

    /// Raise progress; lower values and updates after cancellation are ignored
    pub fn advance(&mut self, progress: f32) -> bool {
        if self.status.is_terminal() || progress <= self.progress {
            return false;
        }
        self.progress = progress.min(100.0);
        self.updated_at = Utc::now();
        true
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            warnings: self.warnings.clone(),
            profile: self.profile,
            attempts: self.attempts,
            result: self.result.clone(),
            error: self.failure.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            finished_at: self.finished_at,
        }
    }
}

/// Read-only view returned by status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobStatus,
    pub progress: f32,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileKind>,
    pub attempts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
