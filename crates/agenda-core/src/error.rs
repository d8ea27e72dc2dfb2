//! Error types for `agenda-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("removing bookmarks requires at least one event id")]
  NoBookmarkIds,

  #[error("a time window needs at least one bound")]
  UnboundedWindow,

  #[error("search query must be at least {min} characters long")]
  QueryTooShort { min: usize },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }

  /// `true` for caller-misuse errors that never reached storage.
  pub fn is_validation(&self) -> bool { !matches!(self, Self::Store(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
