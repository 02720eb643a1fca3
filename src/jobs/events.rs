/*!
 * Lifecycle events and the notification channels that deliver them.
 *
 * The job manager only produces events; delivery to clients (websocket,
 * log, test recorder) is the channel's concern.
 */

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::errors::JobFailure;
use crate::translation::pipeline::PipelinePhase;

use super::models::JobStatus;

/// Event emitted by the job manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    StatusChanged {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },
    ProgressUpdated {
        job_id: String,
        progress: f32,
        phase: PipelinePhase,
        message: String,
    },
    WarningRaised {
        job_id: String,
        message: String,
    },
    Completed {
        job_id: String,
        attempts: usize,
        residual_ratio: f64,
    },
    Failed {
        job_id: String,
        error: JobFailure,
    },
    Cancelled {
        job_id: String,
        progress: f32,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::StatusChanged { job_id, .. }
            | JobEvent::ProgressUpdated { job_id, .. }
            | JobEvent::WarningRaised { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. }
            | JobEvent::Cancelled { job_id, .. } => job_id,
        }
    }
}

/// Sink for job lifecycle events
pub trait NotificationChannel: Send + Sync {
    /// Must not block; called while the job runs
    fn notify(&self, event: JobEvent);
}

/// Fan-out to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<JobEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NotificationChannel for BroadcastNotifier {
    fn notify(&self, event: JobEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}

/// Writes every event to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationChannel for LogNotifier {
    fn notify(&self, event: JobEvent) {
        let id = short_id(event.job_id()).to_string();
        match event {
            JobEvent::StatusChanged { from, to, .. } => info!("Job {}: {} → {}", id, from, to),
            JobEvent::ProgressUpdated { progress, message, .. } => {
                log::debug!("Job {}: {:.0}% {}", id, progress, message)
            }
            JobEvent::WarningRaised { message, .. } => warn!("Job {}: {}", id, message),
            JobEvent::Completed {
                attempts, residual_ratio, ..
            } => info!(
                "Job {} completed after {} attempt(s), residual {:.1}%",
                id,
                attempts,
                residual_ratio * 100.0
            ),
            JobEvent::Failed { error, .. } => error!("Job {} failed: {}", id, error),
            JobEvent::Cancelled { progress, .. } => info!("Job {} cancelled at {:.0}%", id, progress),
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl NotificationChannel for NullNotifier {
    fn notify(&self, _event: JobEvent) {}
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
