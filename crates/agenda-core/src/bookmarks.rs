//! The bookmark manager, the only writer of bookmarks besides the reload
//! purge.
//!
//! Every mutation runs in its own store transaction and is published on the
//! [`ChangeBus`] after it commits. Mutation and publication happen under one
//! lock so subscribers see changes in commit order.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
  Error, Result,
  bus::{ChangeBus, ScheduleChange},
  schedule::Event,
  store::ScheduleStore,
};

pub struct BookmarkManager<S> {
  store:  Arc<S>,
  bus:    ChangeBus,
  writer: Mutex<()>,
}

impl<S: ScheduleStore> BookmarkManager<S> {
  pub fn new(store: Arc<S>, bus: ChangeBus) -> Self {
    Self {
      store,
      bus,
      writer: Mutex::new(()),
    }
  }

  /// Bookmark `event`. Returns `false` if it was already bookmarked, in
  /// which case nothing is published.
  pub async fn add(&self, event: &Event) -> Result<bool> {
    let _guard = self.writer.lock().await;

    let added = self.store.insert_bookmark(event.id).await.map_err(Error::store)?;
    if added {
      tracing::debug!(event_id = event.id, "bookmark added");
      self.bus.publish(ScheduleChange::BookmarkAdded {
        event_id:   event.id,
        start_time: event.start_time,
      });
    }
    Ok(added)
  }

  /// Remove the bookmark on a single event.
  pub async fn remove(&self, event_id: i64) -> Result<bool> {
    self.remove_all(vec![event_id]).await
  }

  /// Remove several bookmarks at once.
  ///
  /// Returns `false` if none of the ids was bookmarked. Otherwise publishes
  /// the full requested id list, including ids that were not bookmarked.
  pub async fn remove_all(&self, event_ids: Vec<i64>) -> Result<bool> {
    if event_ids.is_empty() {
      return Err(Error::NoBookmarkIds);
    }

    let _guard = self.writer.lock().await;

    let removed = self
      .store
      .delete_bookmarks(event_ids.clone())
      .await
      .map_err(Error::store)?;
    if removed {
      tracing::debug!(count = event_ids.len(), "bookmarks removed");
      self.bus.publish(ScheduleChange::BookmarksRemoved { event_ids });
    }
    Ok(removed)
  }

  /// Flip the bookmark on `event`. Returns the new bookmark state.
  pub async fn toggle(&self, event: &Event) -> Result<bool> {
    if self.store.is_bookmarked(event.id).await.map_err(Error::store)? {
      self.remove(event.id).await?;
      Ok(false)
    } else {
      self.add(event).await?;
      Ok(true)
    }
  }
}
