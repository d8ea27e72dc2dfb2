//! SQLite backend for the Agenda schedule store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! connection thread without blocking the async runtime. Because that thread
//! owns the only connection, every reload and bookmark mutation is serialized
//! and readers never observe an uncommitted transaction.

mod encode;
mod reload;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
