//! Schedule entities: the records a reload writes and the query layer reads.
//!
//! Everything here except bookmarks is replaced wholesale on every reload.
//! Event ids and person ids come from the feed and are stable; track ids are
//! synthetic and reassigned on each import.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ─── Day ─────────────────────────────────────────────────────────────────────

/// One conference day. Derived from the events of an import.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Day {
  /// 0-based position of the day within the conference.
  pub index: u16,
  pub date:  NaiveDate,
}

// ─── Track ───────────────────────────────────────────────────────────────────

/// Category of a track, used by clients for colouring.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
  #[default]
  Other,
  Keynote,
  MainTrack,
  DevRoom,
  LightningTalk,
  CertificationExam,
}

/// A track as stored after import.
///
/// Two tracks are the same track when their `(name, track_type)` pair is
/// equal; `id` is only meaningful within one import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
  pub id:         i64,
  pub name:       String,
  pub track_type: TrackType,
}

// ─── Person ──────────────────────────────────────────────────────────────────

/// A speaker. The id is provided by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
  pub id:   i64,
  pub name: String,
}

// ─── Link ────────────────────────────────────────────────────────────────────

/// An outbound link attached to an event (slides, video, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
  pub event_id:    i64,
  pub url:         String,
  pub description: Option<String>,
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A scheduled talk, joined with its day and track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
  pub id:              i64,
  pub day:             Day,
  pub start_time:      Option<DateTime<Utc>>,
  pub end_time:        Option<DateTime<Utc>>,
  pub room_name:       Option<String>,
  pub slug:            Option<String>,
  pub track:           Track,
  pub abstract_text:   Option<String>,
  pub description:     Option<String>,
  pub title:           String,
  pub subtitle:        Option<String>,
  /// Presenter names joined with `", "`; computed at query time.
  pub persons_summary: Option<String>,
}

impl Event {
  /// Length of the event, when both ends are known.
  pub fn duration(&self) -> Option<chrono::Duration> {
    match (self.start_time, self.end_time) {
      (Some(start), Some(end)) => Some(end - start),
      _ => None,
    }
  }
}

/// An event annotated with the user's bookmark status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventItem {
  pub event:         Event,
  pub is_bookmarked: bool,
}

impl EventItem {
  pub fn id(&self) -> i64 { self.event.id }
}

/// A lightweight row for incremental-search UIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSuggestion {
  pub event_id:         i64,
  pub title:            String,
  /// The subtitle when present, otherwise the presenter names.
  pub subtitle_preview: Option<String>,
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn event(start: Option<i64>, end: Option<i64>) -> Event {
    Event {
      id:              1,
      day:             Day {
        index: 0,
        date:  NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
      },
      start_time:      start.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
      end_time:        end.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
      room_name:       None,
      slug:            None,
      track:           Track {
        id:         1,
        name:       "Rust".into(),
        track_type: TrackType::DevRoom,
      },
      abstract_text:   None,
      description:     None,
      title:           "Ownership".into(),
      subtitle:        None,
      persons_summary: None,
    }
  }

  #[test]
  fn duration_needs_both_ends() {
    assert_eq!(
      event(Some(0), Some(1800)).duration(),
      Some(chrono::Duration::minutes(30))
    );
    assert_eq!(event(Some(0), None).duration(), None);
    assert_eq!(event(None, Some(10)).duration(), None);
  }

  #[test]
  fn days_order_by_index_first() {
    let later = Day {
      index: 1,
      date:  NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
    };
    let earlier = Day {
      index: 0,
      date:  NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
    };
    assert!(earlier < later);
  }
}
