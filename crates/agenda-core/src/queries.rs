//! The query layer: read-only schedule queries as live result sets.
//!
//! Each list query is bound to the change topics that can alter its result.
//! Schedule structure (days, tracks, persons, links) only changes on reload;
//! anything carrying a bookmark flag also changes on bookmark mutations.

use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  bus::{ChangeBus, Topic},
  live::LiveResults,
  schedule::{Day, Event, EventItem, Link, Person, SearchSuggestion, Track},
  store::{ScheduleStore, TimeWindow},
};

const SCHEDULE: &[Topic] = &[Topic::ScheduleRefreshed];
const SCHEDULE_AND_BOOKMARKS: &[Topic] = &Topic::ALL;

/// Read access to the schedule for UI and background consumers.
pub struct ScheduleQueries<S> {
  store: Arc<S>,
  bus:   ChangeBus,
}

impl<S> Clone for ScheduleQueries<S> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
      bus:   self.bus.clone(),
    }
  }
}

impl<S: ScheduleStore> ScheduleQueries<S> {
  pub fn new(store: Arc<S>, bus: ChangeBus) -> Self { Self { store, bus } }

  async fn live<T, F, Fut>(
    &self,
    topics: &'static [Topic],
    query: F,
  ) -> Result<LiveResults<T>>
  where
    T: Clone + Send + Sync + 'static,
    F: Fn(Arc<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, S::Error>> + Send + 'static,
  {
    let store = self.store.clone();
    LiveResults::spawn(&self.bus, topics, move || query(store.clone()))
      .await
      .map_err(Error::store)
  }

  // ── Metadata ──────────────────────────────────────────────────────────

  pub async fn last_update_time(&self) -> Result<Option<DateTime<Utc>>> {
    self.store.last_update_time().await.map_err(Error::store)
  }

  pub async fn last_version_tag(&self) -> Result<Option<String>> {
    self.store.last_version_tag().await.map_err(Error::store)
  }

  // ── Live queries ──────────────────────────────────────────────────────

  pub async fn days(&self) -> Result<LiveResults<Vec<Day>>> {
    self
      .live(SCHEDULE, |store| async move { store.days().await })
      .await
  }

  pub async fn tracks(&self, day: &Day) -> Result<LiveResults<Vec<Track>>> {
    let index = day.index;
    self
      .live(SCHEDULE, move |store| async move { store.tracks(index).await })
      .await
  }

  pub async fn events_by_track(
    &self,
    day: &Day,
    track: &Track,
  ) -> Result<LiveResults<Vec<EventItem>>> {
    let (index, track_id) = (day.index, track.id);
    self
      .live(SCHEDULE_AND_BOOKMARKS, move |store| async move {
        store.events_by_track(index, track_id).await
      })
      .await
  }

  /// Events inside `window`. Rejected before any storage access when the
  /// window has no bound.
  pub async fn events_in_window(
    &self,
    window: TimeWindow,
  ) -> Result<LiveResults<Vec<EventItem>>> {
    window.validate()?;
    self
      .live(SCHEDULE_AND_BOOKMARKS, move |store| async move {
        store.events_in_window(window).await
      })
      .await
  }

  pub async fn events_by_person(
    &self,
    person: &Person,
  ) -> Result<LiveResults<Vec<EventItem>>> {
    let person_id = person.id;
    self
      .live(SCHEDULE_AND_BOOKMARKS, move |store| async move {
        store.events_by_person(person_id).await
      })
      .await
  }

  pub async fn bookmarks(
    &self,
    min_start: Option<DateTime<Utc>>,
  ) -> Result<LiveResults<Vec<EventItem>>> {
    self
      .live(SCHEDULE_AND_BOOKMARKS, move |store| async move {
        store.bookmarks(min_start).await
      })
      .await
  }

  pub async fn search(&self, query: &str) -> Result<LiveResults<Vec<EventItem>>> {
    let query = query.to_owned();
    self
      .live(SCHEDULE_AND_BOOKMARKS, move |store| {
        let query = query.clone();
        async move { store.search(query).await }
      })
      .await
  }

  pub async fn persons(&self) -> Result<LiveResults<Vec<Person>>> {
    self
      .live(SCHEDULE, |store| async move { store.persons().await })
      .await
  }

  pub async fn event_persons(&self, event: &Event) -> Result<LiveResults<Vec<Person>>> {
    let event_id = event.id;
    self
      .live(SCHEDULE, move |store| async move {
        store.event_persons(event_id).await
      })
      .await
  }

  pub async fn event_links(&self, event: &Event) -> Result<LiveResults<Vec<Link>>> {
    let event_id = event.id;
    self
      .live(SCHEDULE, move |store| async move { store.event_links(event_id).await })
      .await
  }

  // ── Point-in-time reads ───────────────────────────────────────────────

  pub async fn search_suggestions(
    &self,
    query: &str,
    limit: usize,
  ) -> Result<Vec<SearchSuggestion>> {
    self
      .store
      .search_suggestions(query.to_owned(), limit)
      .await
      .map_err(Error::store)
  }

  pub async fn is_bookmarked(&self, event: &Event) -> Result<bool> {
    self.store.is_bookmarked(event.id).await.map_err(Error::store)
  }

  pub async fn event(&self, event_id: i64) -> Result<Option<EventItem>> {
    self.store.event(event_id).await.map_err(Error::store)
  }
}
