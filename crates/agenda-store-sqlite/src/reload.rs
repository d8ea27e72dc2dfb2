//! The import pass behind [`ScheduleStore::reload_schedule`].
//!
//! Runs entirely on the connection thread inside one transaction. The
//! transaction is only committed after the feed is fully drained and at least
//! one event was imported; every other exit drops it, which rolls back.
//!
//! [`ScheduleStore::reload_schedule`]: agenda_core::store::ScheduleStore::reload_schedule

use std::collections::{BTreeMap, HashMap, HashSet};

use agenda_core::{
  feed::{DetailedEvent, FeedError, FeedItem},
  schedule::TrackType,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, params};

use crate::{
  encode::{encode_date, encode_dt, encode_millis, encode_track_type},
  schema::{CLEAR_SCHEDULE, LAST_UPDATE_KEY, VERSION_TAG_KEY},
};

/// What a reload did.
pub enum ImportOutcome {
  /// The new schedule was committed.
  Committed(ImportSummary),
  /// The feed drained without a single event; nothing was written.
  Empty,
  /// The feed failed part-way; nothing was written.
  FeedFailed { imported: usize, error: FeedError },
}

pub struct ImportSummary {
  pub imported:         usize,
  pub skipped:          usize,
  pub tracks:           usize,
  pub days:             usize,
  pub purged_bookmarks: usize,
  pub committed_at:     DateTime<Utc>,
}

/// In-memory state accumulated over one pass.
#[derive(Default)]
struct ImportPass {
  event_ids:    HashSet<i64>,
  tracks:       HashMap<(String, TrackType), i64>,
  days:         BTreeMap<u16, NaiveDate>,
  min_event_id: Option<i64>,
  imported:     usize,
  skipped:      usize,
}

impl ImportPass {
  /// The synthetic id for this event's track, and whether it was just
  /// assigned.
  fn track_id(&mut self, event: &DetailedEvent) -> (i64, bool) {
    let key = event.track_key();
    if let Some(&id) = self.tracks.get(&key) {
      return (id, false);
    }
    let id = self.tracks.len() as i64 + 1;
    self.tracks.insert(key, id);
    (id, true)
  }

  fn record(&mut self, event: &DetailedEvent) {
    self.days.entry(event.day.index).or_insert(event.day.date);
    self.min_event_id = Some(self.min_event_id.map_or(event.id, |m| m.min(event.id)));
    self.imported += 1;
  }
}

pub fn import<I>(
  conn: &mut Connection,
  events: I,
  version_tag: Option<&str>,
) -> rusqlite::Result<ImportOutcome>
where
  I: Iterator<Item = FeedItem>,
{
  let tx = conn.transaction()?;
  tx.execute_batch(CLEAR_SCHEDULE)?;

  let mut pass = ImportPass::default();
  {
    let mut insert_track =
      tx.prepare_cached("INSERT INTO tracks (id, name, name_folded, type) VALUES (?1, ?2, ?3, ?4)")?;
    let mut insert_event = tx.prepare_cached(
      "INSERT INTO events (
         id, day_index, start_time, end_time, room_name, slug,
         track_id, abstract, description
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    let mut insert_title = tx.prepare_cached(
      "INSERT INTO event_titles (rowid, title, subtitle) VALUES (?1, ?2, ?3)",
    )?;
    let mut insert_person =
      tx.prepare_cached("INSERT OR IGNORE INTO persons (id, name) VALUES (?1, ?2)")?;
    let mut insert_person_name =
      tx.prepare_cached("INSERT INTO person_names (rowid, name) VALUES (?1, ?2)")?;
    let mut insert_event_person = tx.prepare_cached(
      "INSERT OR IGNORE INTO events_persons (event_id, person_id, position)
       VALUES (?1, ?2, ?3)",
    )?;
    let mut insert_link = tx.prepare_cached(
      "INSERT INTO links (event_id, url, description) VALUES (?1, ?2, ?3)",
    )?;

    for item in events {
      let event = match item {
        Ok(event) => event,
        Err(error) => {
          return Ok(ImportOutcome::FeedFailed {
            imported: pass.imported,
            error,
          });
        }
      };

      if !pass.event_ids.insert(event.id) {
        tracing::debug!(event_id = event.id, "skipping duplicate event in feed");
        pass.skipped += 1;
        continue;
      }

      let (track_id, new_track) = pass.track_id(&event);
      if new_track {
        insert_track.execute(params![
          track_id,
          event.track_name,
          event.track_name.to_lowercase(),
          encode_track_type(event.track_type),
        ])?;
      }

      insert_event.execute(params![
        event.id,
        event.day.index,
        event.start_time.map(encode_millis),
        event.end_time.map(encode_millis),
        event.room_name,
        event.slug,
        track_id,
        event.abstract_text,
        event.description,
      ])?;
      insert_title.execute(params![event.id, event.title, event.subtitle])?;

      for (position, person) in event.persons.iter().enumerate() {
        if insert_person.execute(params![person.id, person.name])? > 0 {
          insert_person_name.execute(params![person.id, person.name])?;
        }
        insert_event_person.execute(params![event.id, person.id, position as i64])?;
      }

      for link in &event.links {
        insert_link.execute(params![event.id, link.url, link.description])?;
      }

      pass.record(&event);
    }
  }

  let Some(min_event_id) = pass.min_event_id else {
    return Ok(ImportOutcome::Empty);
  };

  {
    let mut insert_day =
      tx.prepare_cached("INSERT INTO days (day_index, date) VALUES (?1, ?2)")?;
    for (index, date) in &pass.days {
      insert_day.execute(params![index, encode_date(*date)])?;
    }
  }

  let purged_bookmarks =
    tx.execute("DELETE FROM bookmarks WHERE event_id < ?1", params![min_event_id])?;

  let committed_at = Utc::now();
  let mut upsert_meta = tx.prepare_cached(
    "INSERT INTO metadata (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
  )?;
  upsert_meta.execute(params![LAST_UPDATE_KEY, encode_dt(committed_at)])?;
  upsert_meta.execute(params![VERSION_TAG_KEY, version_tag])?;
  drop(upsert_meta);

  tx.commit()?;

  Ok(ImportOutcome::Committed(ImportSummary {
    imported: pass.imported,
    skipped: pass.skipped,
    tracks: pass.tracks.len(),
    days: pass.days.len(),
    purged_bookmarks,
    committed_at,
  }))
}
