//! Error type for `agenda-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] agenda_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// The feed failed while being drained; the reload was rolled back.
  #[error("feed error after {imported} events: {source}")]
  Feed {
    imported: usize,
    #[source]
    source:   agenda_core::feed::FeedError,
  },

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown track type: {0:?}")]
  UnknownTrackType(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
