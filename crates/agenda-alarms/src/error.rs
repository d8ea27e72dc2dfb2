//! Error type for `agenda-alarms`.

use thiserror::Error;

/// A platform timer operation failed. Logged by the scheduler, never
/// returned to its callers.
#[derive(Debug, Error)]
pub enum TimerError {
  #[error("timer backend unavailable: {0}")]
  Unavailable(String),

  #[error("timer for event {event_id} rejected: {reason}")]
  Rejected { event_id: i64, reason: String },
}
