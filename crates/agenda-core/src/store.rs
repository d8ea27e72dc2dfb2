//! The `ScheduleStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `agenda-store-sqlite`).
//! The query layer, bookmark manager and alarm scheduler depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  feed::FeedItem,
  schedule::{Day, EventItem, Link, Person, SearchSuggestion, Track},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`ScheduleStore::events_in_window`].
///
/// All bounds are exclusive: `start > min_start`, `start < max_start`,
/// `end > min_end`. At least one bound must be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
  pub min_start: Option<DateTime<Utc>>,
  pub max_start: Option<DateTime<Utc>>,
  pub min_end:   Option<DateTime<Utc>>,
  pub ascending: bool,
}

impl TimeWindow {
  /// Events currently in progress at `now`.
  pub fn running_at(now: DateTime<Utc>) -> Self {
    Self {
      min_start: None,
      max_start: Some(now),
      min_end:   Some(now),
      ascending: false,
    }
  }

  /// Events starting after `now`.
  pub fn upcoming_after(now: DateTime<Utc>) -> Self {
    Self {
      min_start: Some(now),
      max_start: None,
      min_end:   None,
      ascending: true,
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.min_start.is_none() && self.max_start.is_none() && self.min_end.is_none() {
      return Err(Error::UnboundedWindow);
    }
    Ok(())
  }
}

/// Minimum length of a user search query.
pub const MIN_SEARCH_LENGTH: usize = 3;

/// A search string that passed the caller-side length check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
  pub fn new(text: impl Into<String>) -> Result<Self> {
    let text = text.into().trim().to_owned();
    if text.chars().count() < MIN_SEARCH_LENGTH {
      return Err(Error::QueryTooShort { min: MIN_SEARCH_LENGTH });
    }
    Ok(Self(text))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a schedule store backend.
///
/// A backend owns every table. Schedule data only changes through
/// [`reload_schedule`](Self::reload_schedule); bookmarks only through
/// [`insert_bookmark`](Self::insert_bookmark) and
/// [`delete_bookmarks`](Self::delete_bookmarks) plus the stale purge of a
/// reload.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tokio tasks.
pub trait ScheduleStore: Send + Sync + 'static {
  type Error: std::error::Error + From<Error> + Send + Sync + 'static;

  // ── Reload ────────────────────────────────────────────────────────────

  /// Atomically replace the schedule with the events drained from `events`.
  ///
  /// Returns the number of events imported. `0` means nothing changed,
  /// including bookmarks and update metadata. A feed error or a storage
  /// failure rolls the whole pass back.
  fn reload_schedule<I>(
    &self,
    events: I,
    version_tag: Option<String>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_
  where
    I: IntoIterator<Item = FeedItem> + Send + 'static,
    I::IntoIter: Send + 'static;

  /// Wall-clock time of the last successful reload, `None` if never.
  fn last_update_time(
    &self,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + '_;

  /// The version tag stored by the last successful reload.
  fn last_version_tag(
    &self,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;

  // ── Schedule reads ────────────────────────────────────────────────────

  /// All days, by index.
  fn days(&self) -> impl Future<Output = Result<Vec<Day>, Self::Error>> + Send + '_;

  /// Tracks with at least one event on `day_index`, by name.
  fn tracks(
    &self,
    day_index: u16,
  ) -> impl Future<Output = Result<Vec<Track>, Self::Error>> + Send + '_;

  /// Events of one track on one day, by start time.
  fn events_by_track(
    &self,
    day_index: u16,
    track_id: i64,
  ) -> impl Future<Output = Result<Vec<EventItem>, Self::Error>> + Send + '_;

  /// Events inside a time window. Fails with
  /// [`Error::UnboundedWindow`] before touching storage when no bound is
  /// set.
  fn events_in_window(
    &self,
    window: TimeWindow,
  ) -> impl Future<Output = Result<Vec<EventItem>, Self::Error>> + Send + '_;

  /// Events presented by a person, by start time.
  fn events_by_person(
    &self,
    person_id: i64,
  ) -> impl Future<Output = Result<Vec<EventItem>, Self::Error>> + Send + '_;

  /// Bookmarked events, by start time. With `min_start`, only events that
  /// start strictly after it.
  fn bookmarks(
    &self,
    min_start: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<EventItem>, Self::Error>> + Send + '_;

  /// Union of title/subtitle prefix match, track-name substring match and
  /// person-name prefix match, deduplicated, by start time.
  fn search(
    &self,
    query: String,
  ) -> impl Future<Output = Result<Vec<EventItem>, Self::Error>> + Send + '_;

  /// Same predicate as [`search`](Self::search), trimmed to `limit` rows.
  fn search_suggestions(
    &self,
    query: String,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<SearchSuggestion>, Self::Error>> + Send + '_;

  /// All persons, alphabetical and case-insensitive.
  fn persons(&self) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  /// Presenters of one event.
  fn event_persons(
    &self,
    event_id: i64,
  ) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  /// Links of one event, in feed order.
  fn event_links(
    &self,
    event_id: i64,
  ) -> impl Future<Output = Result<Vec<Link>, Self::Error>> + Send + '_;

  /// A single event by id. Returns `None` if it is not in the schedule.
  fn event(
    &self,
    event_id: i64,
  ) -> impl Future<Output = Result<Option<EventItem>, Self::Error>> + Send + '_;

  // ── Bookmarks ─────────────────────────────────────────────────────────

  fn is_bookmarked(
    &self,
    event_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Insert a bookmark. Returns `false` if it already existed.
  fn insert_bookmark(
    &self,
    event_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete bookmarks in one transaction. Returns `false` if none of the ids
  /// was bookmarked. Fails with [`Error::NoBookmarkIds`] on empty input.
  fn delete_bookmarks(
    &self,
    event_ids: Vec<i64>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn window_without_bounds_is_rejected() {
    let window = TimeWindow {
      min_start: None,
      max_start: None,
      min_end:   None,
      ascending: true,
    };
    assert!(matches!(window.validate(), Err(Error::UnboundedWindow)));
  }

  #[test]
  fn window_with_one_bound_is_accepted() {
    let now = Utc::now();
    assert!(TimeWindow::running_at(now).validate().is_ok());
    assert!(TimeWindow::upcoming_after(now).validate().is_ok());
  }

  #[test]
  fn short_queries_are_rejected() {
    assert!(matches!(
      SearchQuery::new("ru"),
      Err(Error::QueryTooShort { min: 3 })
    ));
    assert!(matches!(
      SearchQuery::new("  ab  "),
      Err(Error::QueryTooShort { .. })
    ));
    assert_eq!(SearchQuery::new(" rust ").unwrap().as_str(), "rust");
  }
}
