//! Encoding and decoding helpers between domain types and the plain
//! representations stored in SQLite columns.
//!
//! Event times are stored as unix milliseconds so they sort and compare
//! natively. Metadata timestamps are RFC 3339 strings. Dates are ISO
//! `YYYY-MM-DD`.

use agenda_core::schedule::{Day, Event, EventItem, Track, TrackType};
use chrono::{DateTime, NaiveDate, Utc};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_millis(dt: DateTime<Utc>) -> i64 { dt.timestamp_millis() }

pub fn decode_millis(ms: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_millis(ms)
    .ok_or_else(|| Error::DateParse(format!("timestamp out of range: {ms}")))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(date: NaiveDate) -> String { date.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── TrackType ───────────────────────────────────────────────────────────────

pub fn encode_track_type(t: TrackType) -> &'static str {
  match t {
    TrackType::Other => "other",
    TrackType::Keynote => "keynote",
    TrackType::MainTrack => "main_track",
    TrackType::DevRoom => "dev_room",
    TrackType::LightningTalk => "lightning_talk",
    TrackType::CertificationExam => "certification_exam",
  }
}

pub fn decode_track_type(s: &str) -> Result<TrackType> {
  match s {
    "other" => Ok(TrackType::Other),
    "keynote" => Ok(TrackType::Keynote),
    "main_track" => Ok(TrackType::MainTrack),
    "dev_room" => Ok(TrackType::DevRoom),
    "lightning_talk" => Ok(TrackType::LightningTalk),
    "certification_exam" => Ok(TrackType::CertificationExam),
    other => Err(Error::UnknownTrackType(other.to_owned())),
  }
}

// ─── Full-text search ────────────────────────────────────────────────────────

/// Turn free user input into an FTS5 expression where every word must match
/// as a prefix. Returns `None` when the input has no usable word.
pub fn fts_prefix_query(input: &str) -> Option<String> {
  let terms: Vec<String> = input
    .split_whitespace()
    .map(|word| word.replace('"', ""))
    .filter(|word| !word.is_empty())
    .map(|word| format!("\"{word}\"*"))
    .collect();
  if terms.is_empty() {
    None
  } else {
    Some(terms.join(" "))
  }
}

/// A `LIKE` pattern matching the lowercased `input` anywhere, with wildcards
/// escaped by `\`. Compare it against a column folded the same way.
pub fn like_substring(input: &str) -> String {
  let mut pattern = String::with_capacity(input.len() + 2);
  pattern.push('%');
  for c in input.trim().to_lowercase().chars() {
    if matches!(c, '%' | '_' | '\\') {
      pattern.push('\\');
    }
    pattern.push(c);
  }
  pattern.push('%');
  pattern
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Columns selected for every event query; pairs with [`RawEvent::from_row`].
pub const EVENT_COLUMNS: &str = "
    e.id, e.day_index, d.date, e.start_time, e.end_time, e.room_name, e.slug,
    t.id, t.name, t.type, e.abstract, e.description, et.title, et.subtitle,
    (SELECT GROUP_CONCAT(p.name, ', ' ORDER BY ep.position)
       FROM events_persons ep
       JOIN persons p ON p.id = ep.person_id
      WHERE ep.event_id = e.id) AS persons_summary,
    b.event_id IS NOT NULL AS is_bookmarked";

/// Joins shared by every event query.
pub const EVENT_JOINS: &str = "
    FROM events e
    JOIN event_titles et ON et.rowid = e.id
    JOIN days d          ON d.day_index = e.day_index
    JOIN tracks t        ON t.id = e.track_id
    LEFT JOIN bookmarks b ON b.event_id = e.id";

/// Start-time ordering with unknown start times last.
pub const ORDER_BY_START: &str = "ORDER BY e.start_time IS NULL, e.start_time ASC, e.id ASC";

/// Raw values read from an event row.
pub struct RawEvent {
  pub id:              i64,
  pub day_index:       u16,
  pub date:            String,
  pub start_time:      Option<i64>,
  pub end_time:        Option<i64>,
  pub room_name:       Option<String>,
  pub slug:            Option<String>,
  pub track_id:        i64,
  pub track_name:      String,
  pub track_type:      String,
  pub abstract_text:   Option<String>,
  pub description:     Option<String>,
  pub title:           String,
  pub subtitle:        Option<String>,
  pub persons_summary: Option<String>,
  pub is_bookmarked:   bool,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      day_index:       row.get(1)?,
      date:            row.get(2)?,
      start_time:      row.get(3)?,
      end_time:        row.get(4)?,
      room_name:       row.get(5)?,
      slug:            row.get(6)?,
      track_id:        row.get(7)?,
      track_name:      row.get(8)?,
      track_type:      row.get(9)?,
      abstract_text:   row.get(10)?,
      description:     row.get(11)?,
      title:           row.get(12)?,
      subtitle:        row.get(13)?,
      persons_summary: row.get(14)?,
      is_bookmarked:   row.get(15)?,
    })
  }

  pub fn into_item(self) -> Result<EventItem> {
    let event = Event {
      id:              self.id,
      day:             Day {
        index: self.day_index,
        date:  decode_date(&self.date)?,
      },
      start_time:      self.start_time.map(decode_millis).transpose()?,
      end_time:        self.end_time.map(decode_millis).transpose()?,
      room_name:       self.room_name,
      slug:            self.slug,
      track:           Track {
        id:         self.track_id,
        name:       self.track_name,
        track_type: decode_track_type(&self.track_type)?,
      },
      abstract_text:   self.abstract_text,
      description:     self.description,
      title:           self.title,
      subtitle:        self.subtitle,
      persons_summary: self.persons_summary,
    };
    Ok(EventItem {
      event,
      is_bookmarked: self.is_bookmarked,
    })
  }
}

/// Raw values read from a `tracks` row.
pub struct RawTrack {
  pub id:         i64,
  pub name:       String,
  pub track_type: String,
}

impl RawTrack {
  pub fn into_track(self) -> Result<Track> {
    Ok(Track {
      id:         self.id,
      name:       self.name,
      track_type: decode_track_type(&self.track_type)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn prefix_query_quotes_every_word() {
    assert_eq!(
      fts_prefix_query("  async rust ").as_deref(),
      Some("\"async\"* \"rust\"*")
    );
  }

  #[test]
  fn prefix_query_strips_quotes() {
    assert_eq!(fts_prefix_query("\"tok\"io").as_deref(), Some("\"tokio\"*"));
    assert_eq!(fts_prefix_query(" \"\" "), None);
  }

  #[test]
  fn like_pattern_escapes_wildcards() {
    assert_eq!(like_substring("50%_off"), "%50\\%\\_off%");
    assert_eq!(like_substring(" go "), "%go%");
    assert_eq!(like_substring("ÜBERs"), "%übers%");
  }

  #[test]
  fn track_types_roundtrip_through_their_column_text() {
    for t in [
      TrackType::Other,
      TrackType::Keynote,
      TrackType::MainTrack,
      TrackType::DevRoom,
      TrackType::LightningTalk,
      TrackType::CertificationExam,
    ] {
      assert_eq!(decode_track_type(encode_track_type(t)).unwrap(), t);
    }
    assert!(matches!(
      decode_track_type("workshop"),
      Err(Error::UnknownTrackType(_))
    ));
  }

  #[test]
  fn millis_keep_subsecond_precision() {
    let dt = decode_millis(1_738_400_000_123).unwrap();
    assert_eq!(encode_millis(dt), 1_738_400_000_123);
  }
}
