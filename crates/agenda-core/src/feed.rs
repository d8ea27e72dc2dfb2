//! Input records produced by the upstream feed parser.
//!
//! A feed is consumed as a pull-based sequence of [`FeedItem`]s. The parser
//! has already resolved each event's day, track, persons and links; the store
//! only deduplicates and persists them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::{Day, Person, TrackType};

/// Error reported by the feed while the store is draining it.
pub type FeedError = Box<dyn std::error::Error + Send + Sync>;

/// One element of a feed sequence.
pub type FeedItem = std::result::Result<DetailedEvent, FeedError>;

/// A link as it appears in the feed, before it is attached to a stored event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedLink {
  pub url:         String,
  pub description: Option<String>,
}

/// A fully detailed event as delivered by the feed.
///
/// Deserializable so a feed dumped as JSON can be imported directly; absent
/// optional fields and lists read as empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedEvent {
  pub id:            i64,
  pub day:           Day,
  pub start_time:    Option<DateTime<Utc>>,
  pub end_time:      Option<DateTime<Utc>>,
  pub room_name:     Option<String>,
  pub slug:          Option<String>,
  pub track_name:    String,
  #[serde(default)]
  pub track_type:    TrackType,
  #[serde(rename = "abstract")]
  pub abstract_text: Option<String>,
  pub description:   Option<String>,
  pub title:         String,
  pub subtitle:      Option<String>,
  /// Presenters in feed order.
  #[serde(default)]
  pub persons:       Vec<Person>,
  /// Links in feed order.
  #[serde(default)]
  pub links:         Vec<FeedLink>,
}

impl DetailedEvent {
  /// Convenience constructor with all optional fields empty.
  pub fn new(
    id: i64,
    day: Day,
    track_name: impl Into<String>,
    track_type: TrackType,
    title: impl Into<String>,
  ) -> Self {
    Self {
      id,
      day,
      start_time: None,
      end_time: None,
      room_name: None,
      slug: None,
      track_name: track_name.into(),
      track_type,
      abstract_text: None,
      description: None,
      title: title.into(),
      subtitle: None,
      persons: Vec::new(),
      links: Vec::new(),
    }
  }

  /// The deduplication key of this event's track.
  pub fn track_key(&self) -> (String, TrackType) {
    (self.track_name.clone(), self.track_type)
  }
}
