//! Seams to the platform: timers and notification presentation.

use agenda_core::schedule::EventItem;
use chrono::{DateTime, Utc};

use crate::error::TimerError;

/// A platform timer keyed by event id.
///
/// Both operations must be idempotent: arming an armed id replaces its
/// instant, cancelling an unknown id does nothing. When a timer elapses the
/// platform calls [`AlarmScheduler::fire`](crate::AlarmScheduler::fire).
pub trait TimerPort: Send + Sync {
  fn arm(&self, event_id: i64, at: DateTime<Utc>) -> Result<(), TimerError>;

  fn cancel(&self, event_id: i64) -> Result<(), TimerError>;
}

/// Presents a reminder for an event whose alarm fired.
pub trait Notifier: Send + Sync {
  fn notify(&self, event: &EventItem);
}
