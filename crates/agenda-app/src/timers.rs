//! In-process platform adapters: a tokio-backed [`TimerPort`] and a
//! [`Notifier`] that writes reminders to the log.

use std::{collections::HashMap, sync::Mutex};

use agenda_alarms::{Notifier, TimerError, TimerPort};
use agenda_core::schedule::EventItem;
use chrono::{DateTime, Utc};
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};

/// One sleeping task per armed event. When a task wakes it sends the event id
/// on the channel returned by [`TokioTimers::new`]; the receiver is expected
/// to call `AlarmScheduler::fire`.
pub struct TokioTimers {
  tasks: Mutex<HashMap<i64, JoinHandle<()>>>,
  fired: mpsc::UnboundedSender<i64>,
}

impl TokioTimers {
  pub fn new() -> (Self, mpsc::UnboundedReceiver<i64>) {
    let (fired, rx) = mpsc::unbounded_channel();
    let timers = Self {
      tasks: Mutex::new(HashMap::new()),
      fired,
    };
    (timers, rx)
  }

  #[cfg(test)]
  pub(crate) fn tracked_tasks(&self) -> usize {
    self.tasks.lock().map(|tasks| tasks.len()).unwrap_or_default()
  }

  pub fn armed_count(&self) -> usize {
    self
      .tasks
      .lock()
      .map(|tasks| tasks.values().filter(|t| !t.is_finished()).count())
      .unwrap_or_default()
  }
}

impl TimerPort for TokioTimers {
  fn arm(&self, event_id: i64, at: DateTime<Utc>) -> Result<(), TimerError> {
    let runtime = Handle::try_current().map_err(|e| TimerError::Unavailable(e.to_string()))?;
    let wait = (at - Utc::now()).to_std().unwrap_or_default();
    let fired = self.fired.clone();
    let task = runtime.spawn(async move {
      tokio::time::sleep(wait).await;
      // The receiver is gone only during shutdown.
      let _ = fired.send(event_id);
    });

    let mut tasks = self
      .tasks
      .lock()
      .map_err(|e| TimerError::Unavailable(e.to_string()))?;
    // Drop handles of timers that already delivered.
    tasks.retain(|_, task| !task.is_finished());
    if let Some(previous) = tasks.insert(event_id, task) {
      previous.abort();
    }
    Ok(())
  }

  fn cancel(&self, event_id: i64) -> Result<(), TimerError> {
    let mut tasks = self
      .tasks
      .lock()
      .map_err(|e| TimerError::Unavailable(e.to_string()))?;
    if let Some(task) = tasks.remove(&event_id) {
      task.abort();
    }
    Ok(())
  }
}

impl Drop for TokioTimers {
  fn drop(&mut self) {
    if let Ok(tasks) = self.tasks.get_mut() {
      for task in tasks.values() {
        task.abort();
      }
    }
  }
}

/// Writes every reminder as an `info` event.
pub struct LogNotifier;

impl Notifier for LogNotifier {
  fn notify(&self, item: &EventItem) {
    let event = &item.event;
    tracing::info!(
      event_id = event.id,
      room = event.room_name.as_deref().unwrap_or("-"),
      start = ?event.start_time,
      "reminder: {}",
      event.title
    );
  }
}
