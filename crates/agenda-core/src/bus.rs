//! In-process change bus backed by a `tokio::sync::broadcast` channel.
//!
//! Publishers send only after their transaction has committed. Subscribers
//! see changes in publish order; there is no replay for late subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ─── ScheduleChange ──────────────────────────────────────────────────────────

/// The topic a change is published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
  ScheduleRefreshed,
  BookmarkAdded,
  BookmarksRemoved,
}

impl Topic {
  pub const ALL: [Topic; 3] = [
    Topic::ScheduleRefreshed,
    Topic::BookmarkAdded,
    Topic::BookmarksRemoved,
  ];
}

/// A committed change to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum ScheduleChange {
  /// A reload committed.
  ScheduleRefreshed,
  /// A bookmark row was inserted.
  BookmarkAdded {
    event_id:   i64,
    start_time: Option<DateTime<Utc>>,
  },
  /// A removal deleted at least one bookmark. Carries every requested id,
  /// including ones that were not bookmarked.
  BookmarksRemoved { event_ids: Vec<i64> },
}

impl ScheduleChange {
  pub fn topic(&self) -> Topic {
    match self {
      Self::ScheduleRefreshed => Topic::ScheduleRefreshed,
      Self::BookmarkAdded { .. } => Topic::BookmarkAdded,
      Self::BookmarksRemoved { .. } => Topic::BookmarksRemoved,
    }
  }
}

// ─── ChangeBus ───────────────────────────────────────────────────────────────

/// Default buffer capacity for the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 256;

/// Fan-out bus for [`ScheduleChange`]s.
///
/// Cloning is cheap; all clones publish into the same channel.
#[derive(Clone)]
pub struct ChangeBus {
  sender: broadcast::Sender<ScheduleChange>,
}

impl ChangeBus {
  /// Create a bus with a specific channel capacity.
  ///
  /// When the buffer is full the oldest messages are dropped and slow
  /// receivers observe `RecvError::Lagged`.
  pub fn new(capacity: usize) -> Self {
    let (sender, _) = broadcast::channel(capacity.max(1));
    Self { sender }
  }

  /// Publish a change to all current subscribers.
  pub fn publish(&self, change: ScheduleChange) {
    tracing::debug!(topic = ?change.topic(), "publishing change");
    // A send error only means there are no receivers.
    let _ = self.sender.send(change);
  }

  /// Subscribe to every change published from now on.
  pub fn subscribe(&self) -> broadcast::Receiver<ScheduleChange> {
    self.sender.subscribe()
  }

  pub fn subscriber_count(&self) -> usize { self.sender.receiver_count() }
}

impl Default for ChangeBus {
  fn default() -> Self { Self::new(DEFAULT_CAPACITY) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn subscribers_see_changes_in_publish_order() {
    let bus = ChangeBus::default();
    let mut rx = bus.subscribe();

    bus.publish(ScheduleChange::BookmarkAdded {
      event_id:   1,
      start_time: None,
    });
    bus.publish(ScheduleChange::BookmarksRemoved { event_ids: vec![1] });
    bus.publish(ScheduleChange::ScheduleRefreshed);

    let topics = [
      rx.recv().await.unwrap().topic(),
      rx.recv().await.unwrap().topic(),
      rx.recv().await.unwrap().topic(),
    ];
    assert_eq!(topics, [
      Topic::BookmarkAdded,
      Topic::BookmarksRemoved,
      Topic::ScheduleRefreshed
    ]);
  }

  #[tokio::test]
  async fn late_subscribers_miss_earlier_changes() {
    let bus = ChangeBus::default();
    bus.publish(ScheduleChange::ScheduleRefreshed);

    let mut rx = bus.subscribe();
    assert!(rx.try_recv().is_err());
  }

  #[test]
  fn publish_without_subscribers_does_not_panic() {
    let bus = ChangeBus::new(0);
    bus.publish(ScheduleChange::ScheduleRefreshed);
    assert_eq!(bus.subscriber_count(), 0);
  }
}
