//! The alarm scheduler and its bus reactor.

use std::sync::Arc;

use agenda_core::{
  Error, Result,
  bus::{ChangeBus, ScheduleChange},
  store::ScheduleStore,
};
use chrono::{DateTime, Duration, Utc};
use tokio::{
  sync::{RwLock, broadcast::{self, error::RecvError}},
  task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::port::{Notifier, TimerPort};

// ─── AlarmSettings ───────────────────────────────────────────────────────────

/// User preferences for bookmark reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmSettings {
  pub enabled: bool,
  /// How long before an event's start the reminder fires.
  pub delay:   Duration,
}

impl Default for AlarmSettings {
  fn default() -> Self {
    Self {
      enabled: true,
      delay:   Duration::zero(),
    }
  }
}

impl AlarmSettings {
  pub fn notify_at(&self, start: DateTime<Utc>) -> DateTime<Utc> { start - self.delay }
}

// ─── AlarmScheduler ──────────────────────────────────────────────────────────

/// Keeps one platform timer per future bookmark.
pub struct AlarmScheduler<S> {
  store:    Arc<S>,
  timers:   Arc<dyn TimerPort>,
  notifier: Arc<dyn Notifier>,
  settings: RwLock<AlarmSettings>,
}

impl<S: ScheduleStore> AlarmScheduler<S> {
  pub fn new(
    store: Arc<S>,
    timers: Arc<dyn TimerPort>,
    notifier: Arc<dyn Notifier>,
    settings: AlarmSettings,
  ) -> Self {
    Self {
      store,
      timers,
      notifier,
      settings: RwLock::new(settings),
    }
  }

  pub async fn settings(&self) -> AlarmSettings { *self.settings.read().await }

  /// Replace the settings and bring the timers in line with them.
  ///
  /// Disabling cancels the alarms of every future bookmark. Enabling, or
  /// changing the delay, re-arms everything. Returns whether any future
  /// alarm is armed afterwards.
  pub async fn update_settings(&self, settings: AlarmSettings) -> Result<bool> {
    let previous = std::mem::replace(&mut *self.settings.write().await, settings);
    debug!(?previous, ?settings, "alarm settings updated");
    if settings.enabled {
      self.reconcile_all().await
    } else {
      if previous.enabled {
        self.disable_all().await?;
      }
      Ok(false)
    }
  }

  // ── Change handling ───────────────────────────────────────────────────

  /// React to one committed store change.
  pub async fn on_change(&self, change: &ScheduleChange) -> Result<()> {
    match change {
      ScheduleChange::ScheduleRefreshed => {
        self.reconcile_all().await?;
      }
      ScheduleChange::BookmarkAdded {
        event_id,
        start_time,
      } => {
        self.on_bookmark_added(*event_id, *start_time, Utc::now()).await;
      }
      ScheduleChange::BookmarksRemoved { event_ids } => {
        self.on_bookmarks_removed(event_ids);
      }
    }
    Ok(())
  }

  /// Arm the alarm for a new bookmark if it is still ahead of `now`.
  /// Returns whether a timer was armed.
  pub async fn on_bookmark_added(
    &self,
    event_id: i64,
    start_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
  ) -> bool {
    let settings = self.settings().await;
    if !settings.enabled {
      return false;
    }
    match start_time.map(|start| settings.notify_at(start)) {
      Some(at) if at > now => self.arm(event_id, at),
      _ => false,
    }
  }

  pub fn on_bookmarks_removed(&self, event_ids: &[i64]) {
    for &event_id in event_ids {
      self.cancel(event_id);
    }
  }

  // ── Bulk operations ───────────────────────────────────────────────────

  /// Re-derive every alarm from the current bookmarks.
  ///
  /// Bookmarks whose reminder is still ahead are armed; all others have
  /// their timer cancelled. Returns whether any bookmark still needs a
  /// future alarm.
  pub async fn reconcile_all(&self) -> Result<bool> { self.reconcile_all_at(Utc::now()).await }

  pub async fn reconcile_all_at(&self, now: DateTime<Utc>) -> Result<bool> {
    let settings = self.settings().await;
    if !settings.enabled {
      self.disable_all_at(now).await?;
      return Ok(false);
    }

    let bookmarks = self.store.bookmarks(None).await.map_err(Error::store)?;
    let mut armed = 0usize;
    let mut has_future = false;
    for item in &bookmarks {
      let event = &item.event;
      match event.start_time.map(|start| settings.notify_at(start)) {
        Some(at) if at > now => {
          has_future = true;
          if self.arm(event.id, at) {
            armed += 1;
          }
        }
        _ => self.cancel(event.id),
      }
    }

    info!(bookmarks = bookmarks.len(), armed, has_future, "alarms reconciled");
    Ok(has_future)
  }

  /// Cancel the alarm of every bookmark that has not started yet.
  pub async fn disable_all(&self) -> Result<()> { self.disable_all_at(Utc::now()).await }

  async fn disable_all_at(&self, now: DateTime<Utc>) -> Result<()> {
    let upcoming = self.store.bookmarks(Some(now)).await.map_err(Error::store)?;
    for item in &upcoming {
      self.cancel(item.id());
    }
    debug!(cancelled = upcoming.len(), "alarms disabled");
    Ok(())
  }

  /// Called by the platform when the timer for `event_id` elapses.
  ///
  /// The event is read again so the reminder reflects the current schedule.
  /// Returns `false` if the event no longer exists.
  pub async fn fire(&self, event_id: i64) -> Result<bool> {
    match self.store.event(event_id).await.map_err(Error::store)? {
      Some(item) => {
        self.notifier.notify(&item);
        Ok(true)
      }
      None => {
        debug!(event_id, "alarm fired for an event that is gone");
        Ok(false)
      }
    }
  }

  // ── Reactor ───────────────────────────────────────────────────────────

  /// Subscribe to `bus` and process changes on a background task until the
  /// bus is dropped.
  pub fn spawn(self: Arc<Self>, bus: &ChangeBus) -> JoinHandle<()> {
    let changes = bus.subscribe();
    tokio::spawn(async move { self.run(changes).await })
  }

  pub async fn run(&self, mut changes: broadcast::Receiver<ScheduleChange>) {
    loop {
      match changes.recv().await {
        Ok(change) => {
          if let Err(err) = self.on_change(&change).await {
            warn!(topic = ?change.topic(), error = %err, "failed to update alarms");
          }
        }
        Err(RecvError::Lagged(skipped)) => {
          warn!(skipped, "alarm reactor lagged; reconciling");
          if let Err(err) = self.reconcile_all().await {
            warn!(error = %err, "failed to reconcile alarms");
          }
        }
        Err(RecvError::Closed) => break,
      }
    }
    debug!("alarm reactor stopped");
  }

  // ── Timer port ────────────────────────────────────────────────────────

  fn arm(&self, event_id: i64, at: DateTime<Utc>) -> bool {
    match self.timers.arm(event_id, at) {
      Ok(()) => true,
      Err(err) => {
        warn!(event_id, %at, error = %err, "failed to arm alarm");
        false
      }
    }
  }

  fn cancel(&self, event_id: i64) {
    if let Err(err) = self.timers.cancel(event_id) {
      warn!(event_id, error = %err, "failed to cancel alarm");
    }
  }
}
