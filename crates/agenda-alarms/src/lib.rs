//! Bookmark reminders for the Agenda schedule store.
//!
//! The [`AlarmScheduler`] keeps no state of its own: it derives every alarm
//! from the current bookmarks and drives a platform timer through the
//! [`TimerPort`] trait. Timer failures are logged and never reach the
//! bookmark or storage callers.

mod port;
mod scheduler;

pub mod error;

pub use error::TimerError;
pub use port::{Notifier, TimerPort};
pub use scheduler::{AlarmScheduler, AlarmSettings};
