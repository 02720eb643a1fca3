/*!
 * Translation jobs: lifecycle state machine, job store and lifecycle events.
 *
 * - `models`: job status, job spec, job record and status snapshot
 * - `events`: lifecycle events and notification channels
 * - `manager`: the job manager exposing start, status, cancel and result
 */

pub mod events;
pub mod manager;
pub mod models;

pub use self::events::{BroadcastNotifier, JobEvent, LogNotifier, NotificationChannel, NullNotifier};
pub use self::manager::{CancelAck, JobManager};
pub use self::models::{JobSnapshot, JobSpec, JobStatus, TranslationJob};
