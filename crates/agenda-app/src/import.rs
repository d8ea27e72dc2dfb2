//! JSON feed input: an array of detailed events.

use agenda_core::feed::{DetailedEvent, FeedItem};

pub fn parse_feed(json: &str) -> serde_json::Result<Vec<FeedItem>> {
  let events: Vec<DetailedEvent> = serde_json::from_str(json)?;
  Ok(events.into_iter().map(Ok).collect())
}
