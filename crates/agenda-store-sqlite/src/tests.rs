//! Integration tests for `SqliteStore` against an in-memory database.

use std::{sync::Arc, time::Duration};

use agenda_core::{
  bookmarks::BookmarkManager,
  bus::{ChangeBus, ScheduleChange},
  feed::{DetailedEvent, FeedItem, FeedLink},
  queries::ScheduleQueries,
  schedule::{Day, Person, TrackType},
  store::{ScheduleStore, TimeWindow},
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tokio::sync::broadcast;

use crate::{Error, SqliteStore};

async fn store() -> (SqliteStore, ChangeBus) {
  let bus = ChangeBus::default();
  let store = SqliteStore::open_in_memory(bus.clone())
    .await
    .expect("in-memory store");
  (store, bus)
}

fn day(index: u16) -> Day {
  Day {
    index,
    date: NaiveDate::from_ymd_opt(2025, 2, 1 + u32::from(index)).unwrap(),
  }
}

fn at(hour: u32) -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 2, 1, hour, 0, 0).unwrap() }

fn talk(id: i64, track: &str, title: &str, start_hour: Option<u32>) -> DetailedEvent {
  let mut event = DetailedEvent::new(id, day(0), track, TrackType::DevRoom, title);
  event.start_time = start_hour.map(at);
  event.end_time = start_hour.map(|h| at(h + 1));
  event
}

fn person(id: i64, name: &str) -> Person {
  Person {
    id,
    name: name.into(),
  }
}

fn feed(events: Vec<DetailedEvent>) -> Vec<FeedItem> { events.into_iter().map(Ok).collect() }

async fn load(store: &SqliteStore, events: Vec<DetailedEvent>) -> usize {
  store
    .reload_schedule(feed(events), Some("etag-1".into()))
    .await
    .expect("reload")
}

fn drain(rx: &mut broadcast::Receiver<ScheduleChange>) -> Vec<ScheduleChange> {
  let mut changes = vec![];
  while let Ok(change) = rx.try_recv() {
    changes.push(change);
  }
  changes
}

/// Three events over two tracks on one day, with speakers and links.
fn conference() -> Vec<DetailedEvent> {
  let mut keynote = talk(100, "Main", "Welcome to the conference", Some(9));
  keynote.track_type = TrackType::Keynote;
  keynote.persons = vec![person(1, "Ada Lovelace")];

  let mut borrowck = talk(101, "Rust", "Borrow checker deep dive", Some(11));
  borrowck.subtitle = Some("Lifetimes without tears".into());
  borrowck.persons = vec![person(2, "grace Hopper"), person(3, "Alan Turing")];
  borrowck.links = vec![
    FeedLink {
      url:         "https://example.org/slides".into(),
      description: Some("Slides".into()),
    },
    FeedLink {
      url:         "https://example.org/video".into(),
      description: None,
    },
  ];

  let mut tokio = talk(102, "Rust", "Async runtimes", Some(10));
  tokio.persons = vec![person(3, "Alan Turing")];

  vec![keynote, borrowck, tokio]
}

// ─── Reload ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reload_imports_days_tracks_and_events() {
  let (s, bus) = store().await;
  let mut rx = bus.subscribe();

  assert_eq!(load(&s, conference()).await, 3);
  assert_eq!(drain(&mut rx), vec![ScheduleChange::ScheduleRefreshed]);

  let days = s.days().await.unwrap();
  assert_eq!(days, vec![day(0)]);

  let tracks = s.tracks(0).await.unwrap();
  let names: Vec<_> = tracks.iter().map(|t| t.name.as_str()).collect();
  assert_eq!(names, ["Main", "Rust"]);
  assert_eq!(s.count_rows("events").await.unwrap(), 3);
  assert_eq!(s.count_rows("event_titles").await.unwrap(), 3);
}

#[tokio::test]
async fn reload_replaces_previous_schedule() {
  let (s, _bus) = store().await;
  load(&s, conference()).await;

  load(&s, vec![talk(200, "Go", "Goroutines", Some(14))]).await;

  assert!(s.event(100).await.unwrap().is_none());
  assert_eq!(s.count_rows("persons").await.unwrap(), 0);
  assert_eq!(s.count_rows("links").await.unwrap(), 0);
  let tracks = s.tracks(0).await.unwrap();
  assert_eq!(tracks.len(), 1);
  assert_eq!(tracks[0].name, "Go");
  assert_eq!(tracks[0].id, 1);
}

#[tokio::test]
async fn empty_reload_changes_nothing() {
  let (s, bus) = store().await;
  load(&s, conference()).await;
  s.insert_bookmark(101).await.unwrap();
  let updated = s.last_update_time().await.unwrap();
  let mut rx = bus.subscribe();

  let imported = s
    .reload_schedule(Vec::<FeedItem>::new(), Some("etag-2".into()))
    .await
    .unwrap();

  assert_eq!(imported, 0);
  assert!(drain(&mut rx).is_empty());
  assert_eq!(s.days().await.unwrap().len(), 1);
  assert_eq!(s.count_rows("events").await.unwrap(), 3);
  assert!(s.is_bookmarked(101).await.unwrap());
  assert_eq!(s.last_update_time().await.unwrap(), updated);
  assert_eq!(s.last_version_tag().await.unwrap().as_deref(), Some("etag-1"));
}

#[tokio::test]
async fn feed_failure_mid_stream_rolls_back() {
  let (s, bus) = store().await;
  load(&s, conference()).await;
  s.insert_bookmark(100).await.unwrap();
  let updated = s.last_update_time().await.unwrap();
  let mut rx = bus.subscribe();

  let items: Vec<FeedItem> = vec![
    Ok(talk(500, "Zig", "Comptime", Some(9))),
    Ok(talk(501, "Zig", "Allocators", Some(10))),
    Err("connection reset".into()),
    Ok(talk(502, "Zig", "Never reached", Some(11))),
  ];
  let err = s.reload_schedule(items, Some("etag-2".into())).await.unwrap_err();

  assert!(matches!(err, Error::Feed { imported: 2, .. }));
  assert!(drain(&mut rx).is_empty());
  assert_eq!(s.days().await.unwrap(), vec![day(0)]);
  let names: Vec<_> = s.tracks(0).await.unwrap().into_iter().map(|t| t.name).collect();
  assert_eq!(names, ["Main", "Rust"]);
  assert!(s.event(500).await.unwrap().is_none());
  assert_eq!(s.bookmarks(None).await.unwrap().len(), 1);
  assert_eq!(s.last_update_time().await.unwrap(), updated);
  assert_eq!(s.last_version_tag().await.unwrap().as_deref(), Some("etag-1"));
}

#[tokio::test]
async fn storage_failure_mid_import_rolls_back() {
  let (s, _bus) = store().await;
  load(&s, conference()).await;
  s.insert_bookmark(101).await.unwrap();
  let updated = s.last_update_time().await.unwrap();

  s.execute_batch(
    "CREATE TRIGGER fail_insert BEFORE INSERT ON events WHEN NEW.id = 302
     BEGIN SELECT RAISE(ABORT, 'simulated I/O failure'); END;",
  )
  .await
  .unwrap();

  let replacement = vec![
    talk(300, "C", "Undefined behaviour", Some(9)),
    talk(301, "C", "Sanitizers", Some(10)),
    talk(302, "C", "Linkers", Some(11)),
  ];
  let err = s.reload_schedule(feed(replacement), None).await.unwrap_err();

  assert!(matches!(err, Error::Database(_)));
  assert_eq!(s.count_rows("events").await.unwrap(), 3);
  assert_eq!(s.count_rows("event_titles").await.unwrap(), 3);
  assert_eq!(s.count_rows("tracks").await.unwrap(), 2);
  assert_eq!(s.days().await.unwrap(), vec![day(0)]);
  let bookmarks = s.bookmarks(None).await.unwrap();
  assert_eq!(bookmarks.len(), 1);
  assert_eq!(bookmarks[0].id(), 101);
  assert_eq!(s.last_update_time().await.unwrap(), updated);
}

#[tokio::test]
async fn tracks_are_deduplicated_by_name_and_type() {
  let (s, _bus) = store().await;
  let mut main_rust = talk(3, "Rust", "Keynote", Some(12));
  main_rust.track_type = TrackType::MainTrack;

  load(&s, vec![
    talk(1, "Rust", "One", Some(9)),
    talk(2, "Rust", "Two", Some(10)),
    main_rust,
  ])
  .await;

  let tracks = s.tracks(0).await.unwrap();
  assert_eq!(tracks.len(), 2);
  assert_eq!(s.count_rows("tracks").await.unwrap(), 2);

  let dev_room = tracks
    .iter()
    .find(|t| t.track_type == TrackType::DevRoom)
    .unwrap();
  assert_eq!(dev_room.id, 1);
  assert_eq!(s.events_by_track(0, dev_room.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn duplicate_event_ids_are_skipped() {
  let (s, _bus) = store().await;
  let mut first = talk(7, "Rust", "First", Some(9));
  first.persons = vec![person(1, "Ada Lovelace")];
  let mut second = talk(7, "Go", "Second", Some(10));
  second.persons = vec![person(2, "Rob Pike")];
  second.links = vec![FeedLink {
    url:         "https://example.org".into(),
    description: None,
  }];

  assert_eq!(load(&s, vec![first, second, talk(8, "Rust", "Third", None)]).await, 2);

  let event = s.event(7).await.unwrap().unwrap();
  assert_eq!(event.event.title, "First");
  assert_eq!(s.count_rows("persons").await.unwrap(), 1);
  assert_eq!(s.count_rows("links").await.unwrap(), 0);
  // The skipped event's track was never created.
  assert_eq!(s.count_rows("tracks").await.unwrap(), 1);
}

#[tokio::test]
async fn known_persons_keep_their_first_name() {
  let (s, _bus) = store().await;
  let mut a = talk(1, "Rust", "One", Some(9));
  a.persons = vec![person(42, "Ferris")];
  let mut b = talk(2, "Rust", "Two", Some(10));
  b.persons = vec![person(42, "Ferris the Crab")];

  load(&s, vec![a, b]).await;

  assert_eq!(s.persons().await.unwrap(), vec![person(42, "Ferris")]);
  assert_eq!(s.events_by_person(42).await.unwrap().len(), 2);
}

#[tokio::test]
async fn days_are_sorted_by_index() {
  let (s, _bus) = store().await;
  let mut sunday = talk(1, "Rust", "Sunday talk", Some(9));
  sunday.day = day(1);
  let saturday = talk(2, "Rust", "Saturday talk", Some(9));

  load(&s, vec![sunday, saturday]).await;

  assert_eq!(s.days().await.unwrap(), vec![day(0), day(1)]);
  assert_eq!(s.tracks(1).await.unwrap().len(), 1);
  assert!(s.tracks(2).await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_bookmarks_are_purged_below_minimum_id() {
  let (s, _bus) = store().await;
  load(&s, vec![talk(5, "Rust", "Old edition", Some(9))]).await;
  s.insert_bookmark(5).await.unwrap();

  load(&s, vec![talk(10, "Rust", "New", Some(9)), talk(11, "Rust", "Newer", Some(10))]).await;

  assert!(!s.is_bookmarked(5).await.unwrap());
}

#[tokio::test]
async fn bookmarks_at_or_above_minimum_id_survive() {
  let (s, _bus) = store().await;
  load(&s, vec![talk(5, "Rust", "Talk", Some(9))]).await;
  s.insert_bookmark(5).await.unwrap();

  load(&s, vec![talk(3, "Rust", "Earlier id", Some(9))]).await;

  // Kept even though event 5 is no longer in the schedule.
  assert!(s.is_bookmarked(5).await.unwrap());
  assert!(s.bookmarks(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn reload_records_update_time_and_version_tag() {
  let (s, _bus) = store().await;
  assert_eq!(s.last_update_time().await.unwrap(), None);
  assert_eq!(s.last_version_tag().await.unwrap(), None);

  let before = Utc::now();
  load(&s, conference()).await;
  let updated = s.last_update_time().await.unwrap().unwrap();

  assert!(updated >= before);
  assert_eq!(s.last_version_tag().await.unwrap().as_deref(), Some("etag-1"));
}

#[tokio::test]
async fn update_time_is_loaded_lazily_from_storage() {
  let (s, _bus) = store().await;
  load(&s, conference()).await;
  let updated = s.last_update_time().await.unwrap();

  let fresh = s.with_cold_cache();
  let loaded = fresh.last_update_time().await.unwrap();

  // RFC 3339 keeps sub-second precision.
  assert_eq!(loaded, updated);
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn events_by_track_are_ordered_by_start_with_unknown_last() {
  let (s, _bus) = store().await;
  load(&s, vec![
    talk(1, "Rust", "Unscheduled", None),
    talk(2, "Rust", "Afternoon", Some(14)),
    talk(3, "Rust", "Morning", Some(9)),
  ])
  .await;
  s.insert_bookmark(2).await.unwrap();

  let events = s.events_by_track(0, 1).await.unwrap();
  let ids: Vec<_> = events.iter().map(|e| e.id()).collect();
  assert_eq!(ids, [3, 2, 1]);
  assert!(events[1].is_bookmarked);
  assert!(!events[0].is_bookmarked);
  assert_eq!(events[2].event.start_time, None);
}

#[tokio::test]
async fn events_carry_persons_summary() {
  let (s, _bus) = store().await;
  load(&s, conference()).await;

  let event = s.event(101).await.unwrap().unwrap().event;
  // Feed order, not alphabetical.
  assert_eq!(event.persons_summary.as_deref(), Some("grace Hopper, Alan Turing"));
  assert_eq!(event.subtitle.as_deref(), Some("Lifetimes without tears"));
  assert_eq!(event.track.name, "Rust");
  assert_eq!(event.day, day(0));
}

#[tokio::test]
async fn unbounded_window_is_rejected() {
  let (s, _bus) = store().await;
  let window = TimeWindow {
    min_start: None,
    max_start: None,
    min_end:   None,
    ascending: true,
  };

  let err = s.events_in_window(window).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(agenda_core::Error::UnboundedWindow)
  ));
}

#[tokio::test]
async fn window_queries_filter_and_order() {
  let (s, _bus) = store().await;
  load(&s, conference()).await;

  // At 10:30 only the 10:00-11:00 talk is running.
  let now = at(10) + chrono::Duration::minutes(30);
  let running = s.events_in_window(TimeWindow::running_at(now)).await.unwrap();
  let ids: Vec<_> = running.iter().map(|e| e.id()).collect();
  assert_eq!(ids, [102]);

  let upcoming = s
    .events_in_window(TimeWindow::upcoming_after(at(9)))
    .await
    .unwrap();
  let ids: Vec<_> = upcoming.iter().map(|e| e.id()).collect();
  assert_eq!(ids, [102, 101]);

  let descending = s
    .events_in_window(TimeWindow {
      min_start: None,
      max_start: Some(at(12)),
      min_end:   None,
      ascending: false,
    })
    .await
    .unwrap();
  let ids: Vec<_> = descending.iter().map(|e| e.id()).collect();
  assert_eq!(ids, [101, 102, 100]);
}

#[tokio::test]
async fn bookmarks_can_be_limited_to_upcoming() {
  let (s, _bus) = store().await;
  load(&s, conference()).await;
  for id in [100, 101, 102] {
    s.insert_bookmark(id).await.unwrap();
  }

  let all = s.bookmarks(None).await.unwrap();
  let ids: Vec<_> = all.iter().map(|e| e.id()).collect();
  assert_eq!(ids, [100, 102, 101]);
  assert!(all.iter().all(|e| e.is_bookmarked));

  let upcoming = s.bookmarks(Some(at(10))).await.unwrap();
  let ids: Vec<_> = upcoming.iter().map(|e| e.id()).collect();
  assert_eq!(ids, [101]);
}

#[tokio::test]
async fn persons_are_sorted_case_insensitively() {
  let (s, _bus) = store().await;
  load(&s, conference()).await;

  let names: Vec<_> = s.persons().await.unwrap().into_iter().map(|p| p.name).collect();
  assert_eq!(names, ["Ada Lovelace", "Alan Turing", "grace Hopper"]);
}

#[tokio::test]
async fn event_persons_keep_feed_order() {
  let (s, _bus) = store().await;
  let mut panel = talk(1, "Rust", "Panel", Some(9));
  panel.persons = vec![person(7, "Zoe"), person(5, "Ada"), person(6, "mia")];
  load(&s, vec![panel]).await;

  let speakers: Vec<_> = s
    .event_persons(1)
    .await
    .unwrap()
    .into_iter()
    .map(|p| p.id)
    .collect();
  assert_eq!(speakers, [7, 5, 6]);

  let suggestions = s.search_suggestions("panel".into(), 1).await.unwrap();
  assert_eq!(suggestions[0].subtitle_preview.as_deref(), Some("Zoe, Ada, mia"));
}

#[tokio::test]
async fn links_keep_feed_order() {
  let (s, _bus) = store().await;
  load(&s, conference()).await;

  let links = s.event_links(101).await.unwrap();
  let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
  assert_eq!(urls, ["https://example.org/slides", "https://example.org/video"]);
  assert_eq!(links[0].description.as_deref(), Some("Slides"));
  assert!(s.event_links(100).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_event_is_none() {
  let (s, _bus) = store().await;
  load(&s, conference()).await;
  assert!(s.event(999).await.unwrap().is_none());
}

// ─── Search ──────────────────────────────────────────────────────────────────

fn search_fixture() -> Vec<DetailedEvent> {
  let mut a = talk(1, "Embedded", "Blinking LEDs", Some(9));
  a.persons = vec![person(1, "Ferris Crab")];
  let b = talk(2, "Embedded", "Bootloaders", Some(10));
  let mut c = talk(3, "Databases", "Embedded storage engines", Some(11));
  c.subtitle = Some("Writing a B-tree".into());
  let mut d = talk(4, "Web", "Routing", Some(12));
  d.persons = vec![person(2, "Ferris Wheel")];
  vec![a, b, c, d]
}

#[tokio::test]
async fn search_matches_track_names_by_substring() {
  let (s, _bus) = store().await;
  load(&s, search_fixture()).await;

  let ids: Vec<_> = s
    .search("bedd".into())
    .await
    .unwrap()
    .iter()
    .map(|e| e.id())
    .collect();
  // "bedd" is no word prefix, so only the track-name predicate matches.
  assert_eq!(ids, [1, 2]);
}

#[tokio::test]
async fn track_search_ignores_case_beyond_ascii() {
  let (s, _bus) = store().await;
  load(&s, vec![
    talk(1, "Embedded", "Blinking LEDs", Some(9)),
    talk(2, "Übersetzung", "Compilerbau", Some(10)),
  ])
  .await;

  for (query, expected) in [
    ("EMBED", vec![1]),
    ("mBeDd", vec![1]),
    ("ÜBERS", vec![2]),
    ("übers", vec![2]),
    ("ERSETZ", vec![2]),
  ] {
    let ids: Vec<_> = s
      .search(query.into())
      .await
      .unwrap()
      .iter()
      .map(|e| e.id())
      .collect();
    assert_eq!(ids, expected, "query {query:?}");
  }
}

#[tokio::test]
async fn search_matches_person_names_by_prefix() {
  let (s, _bus) = store().await;
  load(&s, search_fixture()).await;

  let ids: Vec<_> = s
    .search("ferr".into())
    .await
    .unwrap()
    .iter()
    .map(|e| e.id())
    .collect();
  assert_eq!(ids, [1, 4]);
}

#[tokio::test]
async fn search_union_has_no_duplicates() {
  let (s, _bus) = store().await;
  load(&s, search_fixture()).await;

  // Event 3 matches by title and event 1/2 by track; 3's track does not.
  let ids: Vec<_> = s
    .search("Embedded".into())
    .await
    .unwrap()
    .iter()
    .map(|e| e.id())
    .collect();
  assert_eq!(ids, [1, 2, 3]);

  let subtitle: Vec<_> = s
    .search("b-tre".into())
    .await
    .unwrap()
    .iter()
    .map(|e| e.id())
    .collect();
  assert_eq!(subtitle, [3]);
}

#[tokio::test]
async fn blank_search_returns_nothing() {
  let (s, _bus) = store().await;
  load(&s, search_fixture()).await;
  assert!(s.search("   ".into()).await.unwrap().is_empty());
}

#[tokio::test]
async fn suggestions_are_limited_and_previewed() {
  let (s, _bus) = store().await;
  load(&s, search_fixture()).await;

  let suggestions = s.search_suggestions("embedded".into(), 2).await.unwrap();
  assert_eq!(suggestions.len(), 2);
  assert_eq!(suggestions[0].event_id, 1);
  assert_eq!(suggestions[0].subtitle_preview.as_deref(), Some("Ferris Crab"));

  let all = s.search_suggestions("embedded".into(), 10).await.unwrap();
  let storage = all.iter().find(|s| s.event_id == 3).unwrap();
  assert_eq!(storage.title, "Embedded storage engines");
  assert_eq!(storage.subtitle_preview.as_deref(), Some("Writing a B-tree"));
}

// ─── Bookmarks ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_bookmarks_requires_ids() {
  let (s, _bus) = store().await;
  let err = s.delete_bookmarks(vec![]).await.unwrap_err();
  assert!(matches!(err, Error::Core(agenda_core::Error::NoBookmarkIds)));
}

#[tokio::test]
async fn delete_bookmarks_reports_whether_anything_was_removed() {
  let (s, _bus) = store().await;
  s.insert_bookmark(1).await.unwrap();
  s.insert_bookmark(2).await.unwrap();

  assert!(!s.delete_bookmarks(vec![9]).await.unwrap());
  assert!(s.delete_bookmarks(vec![1, 2, 9]).await.unwrap());
  assert_eq!(s.count_rows("bookmarks").await.unwrap(), 0);
}

#[tokio::test]
async fn adding_a_bookmark_twice_is_idempotent() {
  let (s, bus) = store().await;
  load(&s, conference()).await;
  let store = Arc::new(s);
  let manager = BookmarkManager::new(store.clone(), bus.clone());
  let event = store.event(101).await.unwrap().unwrap().event;
  let mut rx = bus.subscribe();

  assert!(manager.add(&event).await.unwrap());
  assert!(!manager.add(&event).await.unwrap());

  assert_eq!(store.count_rows("bookmarks").await.unwrap(), 1);
  assert_eq!(drain(&mut rx), vec![ScheduleChange::BookmarkAdded {
    event_id:   101,
    start_time: Some(at(11)),
  }]);
}

#[tokio::test]
async fn removing_bookmarks_publishes_the_requested_ids() {
  let (s, bus) = store().await;
  load(&s, conference()).await;
  let store = Arc::new(s);
  let manager = BookmarkManager::new(store.clone(), bus.clone());
  store.insert_bookmark(100).await.unwrap();
  let mut rx = bus.subscribe();

  assert!(!manager.remove(101).await.unwrap());
  assert!(drain(&mut rx).is_empty());

  assert!(manager.remove_all(vec![100, 101]).await.unwrap());
  assert_eq!(drain(&mut rx), vec![ScheduleChange::BookmarksRemoved {
    event_ids: vec![100, 101],
  }]);

  let err = manager.remove_all(vec![]).await.unwrap_err();
  assert!(err.is_validation());
}

#[tokio::test]
async fn toggle_flips_bookmark_state() {
  let (s, bus) = store().await;
  load(&s, conference()).await;
  let store = Arc::new(s);
  let manager = BookmarkManager::new(store.clone(), bus);
  let event = store.event(100).await.unwrap().unwrap().event;

  assert!(manager.toggle(&event).await.unwrap());
  assert!(store.is_bookmarked(100).await.unwrap());
  assert!(!manager.toggle(&event).await.unwrap());
  assert!(!store.is_bookmarked(100).await.unwrap());
}

// ─── Live queries ────────────────────────────────────────────────────────────

async fn changed<T>(rx: &mut tokio::sync::watch::Receiver<T>) {
  tokio::time::timeout(Duration::from_secs(2), rx.changed())
    .await
    .expect("live result refreshed")
    .expect("live result still running");
}

#[tokio::test]
async fn live_days_refresh_after_reload() {
  let (s, bus) = store().await;
  let queries = ScheduleQueries::new(Arc::new(s.clone()), bus);

  let days = queries.days().await.unwrap();
  assert!(days.current().is_empty());
  let mut rx = days.subscribe();

  load(&s, conference()).await;
  changed(&mut rx).await;

  assert_eq!(days.current(), vec![day(0)]);
}

#[tokio::test]
async fn live_window_query_validates_before_reading() {
  let (s, bus) = store().await;
  let queries = ScheduleQueries::new(Arc::new(s), bus.clone());

  let result = queries
    .events_in_window(TimeWindow {
      min_start: None,
      max_start: None,
      min_end:   None,
      ascending: true,
    })
    .await;

  assert!(matches!(result, Err(agenda_core::Error::UnboundedWindow)));
  assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test]
async fn end_to_end_bookmark_flow() {
  let (s, bus) = store().await;
  let store = Arc::new(s);
  let queries = ScheduleQueries::new(store.clone(), bus.clone());
  let manager = BookmarkManager::new(store.clone(), bus.clone());
  let mut changes = bus.subscribe();

  assert_eq!(load(&store, conference()).await, 3);
  let days = queries.days().await.unwrap().current();
  assert_eq!(days.len(), 1);
  assert_eq!(queries.tracks(&days[0]).await.unwrap().current().len(), 2);

  let bookmarks = queries.bookmarks(None).await.unwrap();
  let mut rx = bookmarks.subscribe();
  assert!(bookmarks.current().is_empty());

  let event = queries.event(101).await.unwrap().unwrap().event;
  assert!(manager.add(&event).await.unwrap());
  changed(&mut rx).await;
  let ids: Vec<_> = bookmarks.current().iter().map(|e| e.id()).collect();
  assert_eq!(ids, [101]);
  assert!(queries.is_bookmarked(&event).await.unwrap());

  assert!(manager.remove(101).await.unwrap());
  changed(&mut rx).await;
  assert!(bookmarks.current().is_empty());

  assert_eq!(drain(&mut changes), vec![
    ScheduleChange::ScheduleRefreshed,
    ScheduleChange::BookmarkAdded {
      event_id:   101,
      start_time: Some(at(11)),
    },
    ScheduleChange::BookmarksRemoved {
      event_ids: vec![101],
    },
  ]);
}

// ─── Schema migration ────────────────────────────────────────────────────────

#[tokio::test]
async fn version_one_databases_are_migrated() {
  let path = std::env::temp_dir().join(format!("agenda-v1-{}.db", std::process::id()));
  let _ = std::fs::remove_file(&path);
  {
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn
      .execute_batch(
        "CREATE TABLE tracks (
             id   INTEGER PRIMARY KEY,
             name TEXT NOT NULL,
             type TEXT NOT NULL,
             UNIQUE (name, type)
         );
         INSERT INTO tracks (id, name, type) VALUES (1, 'Embedded', 'dev_room');
         CREATE TABLE events_persons (
             event_id  INTEGER NOT NULL,
             person_id INTEGER NOT NULL,
             PRIMARY KEY (event_id, person_id)
         );
         PRAGMA user_version = 1;",
      )
      .unwrap();
  }

  let s = SqliteStore::open(&path, ChangeBus::default()).await.unwrap();
  let mut translation = talk(1, "Übersetzung", "Compilerbau", Some(9));
  translation.persons = vec![person(2, "Bea"), person(1, "Al")];
  load(&s, vec![translation]).await;

  let ids: Vec<_> = s.search("übers".into()).await.unwrap().iter().map(|e| e.id()).collect();
  assert_eq!(ids, [1]);
  let event = s.event(1).await.unwrap().unwrap().event;
  assert_eq!(event.persons_summary.as_deref(), Some("Bea, Al"));

  drop(s);
  let _ = std::fs::remove_file(&path);
}
