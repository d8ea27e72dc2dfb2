//! Live result sets: query snapshots that refresh on change notifications.
//!
//! A [`LiveResults`] owns a background task that listens on the
//! [`ChangeBus`] and re-runs its query whenever a change with one of its
//! topics is published. Consumers read [`LiveResults::current`] or watch
//! for new snapshots through [`LiveResults::subscribe`]; dropping the
//! returned receiver unsubscribes, dropping the handle stops the task.

use std::future::Future;

use tokio::{
  sync::{broadcast::error::RecvError, watch},
  task::JoinHandle,
};

use crate::bus::{ChangeBus, Topic};

pub struct LiveResults<T> {
  snapshot: watch::Receiver<T>,
  refresher: JoinHandle<()>,
}

impl<T> LiveResults<T>
where
  T: Clone + Send + Sync + 'static,
{
  /// Run `fetch` once and keep re-running it after every change on `topics`.
  ///
  /// The bus subscription is taken before the first read so a change that
  /// commits in between still triggers a refresh. The first read's error is
  /// returned; later refresh errors are logged and the previous snapshot is
  /// kept.
  pub async fn spawn<F, Fut, E>(
    bus: &ChangeBus,
    topics: &'static [Topic],
    fetch: F,
  ) -> Result<Self, E>
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
  {
    let mut changes = bus.subscribe();
    let initial = fetch().await?;
    let (sender, snapshot) = watch::channel(initial);

    let refresher = tokio::spawn(async move {
      loop {
        match changes.recv().await {
          Ok(change) if !topics.contains(&change.topic()) => continue,
          Ok(_) => {}
          // Missed changes may have touched anything we depend on.
          Err(RecvError::Lagged(skipped)) => {
            tracing::debug!(skipped, "live query lagged behind the change bus");
          }
          Err(RecvError::Closed) => break,
        }

        match fetch().await {
          Ok(value) => {
            sender.send_replace(value);
          }
          Err(err) => tracing::warn!(error = %err, "live query refresh failed"),
        }
      }
    });

    Ok(Self { snapshot, refresher })
  }

  /// A copy of the latest snapshot.
  pub fn current(&self) -> T { self.snapshot.borrow().clone() }

  /// A receiver that is notified of every snapshot after the current one.
  pub fn subscribe(&self) -> watch::Receiver<T> {
    let mut rx = self.snapshot.clone();
    rx.borrow_and_update();
    rx
  }
}

impl<T> Drop for LiveResults<T> {
  fn drop(&mut self) { self.refresher.abort(); }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      Arc,
      atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
  };

  use tokio::time::timeout;

  use super::*;
  use crate::bus::ScheduleChange;

  fn counting_fetch(
    calls: Arc<AtomicUsize>,
  ) -> impl (Fn() -> std::future::Ready<Result<usize, std::fmt::Error>>) + Send + Sync + 'static
  {
    move || std::future::ready(Ok(calls.fetch_add(1, Ordering::SeqCst) + 1))
  }

  #[tokio::test]
  async fn first_snapshot_is_read_on_spawn() {
    let bus = ChangeBus::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let live = LiveResults::spawn(
      &bus,
      &[Topic::ScheduleRefreshed],
      counting_fetch(calls.clone()),
    )
    .await
    .unwrap();

    assert_eq!(live.current(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn refreshes_on_matching_topic() {
    let bus = ChangeBus::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let live = LiveResults::spawn(
      &bus,
      &[Topic::ScheduleRefreshed],
      counting_fetch(calls.clone()),
    )
    .await
    .unwrap();
    let mut rx = live.subscribe();

    bus.publish(ScheduleChange::ScheduleRefreshed);
    timeout(Duration::from_secs(1), rx.changed())
      .await
      .expect("refresh within a second")
      .unwrap();

    assert_eq!(*rx.borrow(), 2);
    assert_eq!(live.current(), 2);
  }

  #[tokio::test]
  async fn ignores_other_topics() {
    let bus = ChangeBus::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let live = LiveResults::spawn(
      &bus,
      &[Topic::ScheduleRefreshed],
      counting_fetch(calls.clone()),
    )
    .await
    .unwrap();
    let mut rx = live.subscribe();

    bus.publish(ScheduleChange::BookmarksRemoved { event_ids: vec![7] });
    bus.publish(ScheduleChange::ScheduleRefreshed);
    timeout(Duration::from_secs(1), rx.changed())
      .await
      .expect("refresh within a second")
      .unwrap();

    // Only the schedule refresh triggered a re-read.
    assert_eq!(*rx.borrow(), 2);
  }

  #[tokio::test]
  async fn first_read_error_is_returned() {
    let bus = ChangeBus::default();
    let result = LiveResults::<usize>::spawn(&bus, &Topic::ALL, || {
      std::future::ready(Err(std::fmt::Error))
    })
    .await;
    assert!(result.is_err());
    // The subscription taken for the failed query is gone again.
    assert_eq!(bus.subscriber_count(), 0);
  }

  #[tokio::test]
  async fn dropping_the_handle_stops_refreshing() {
    let bus = ChangeBus::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let live = LiveResults::spawn(&bus, &Topic::ALL, counting_fetch(calls.clone()))
      .await
      .unwrap();
    drop(live);
    tokio::task::yield_now().await;

    bus.publish(ScheduleChange::ScheduleRefreshed);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
