//! Core types and trait definitions for the Agenda schedule store.
//!
//! This crate is deliberately free of database dependencies. Storage
//! backends implement [`store::ScheduleStore`]; the query layer, bookmark
//! manager and change bus in this crate are written against that trait.

pub mod bookmarks;
pub mod bus;
pub mod error;
pub mod feed;
pub mod live;
pub mod queries;
pub mod schedule;
pub mod store;

pub use error::{Error, Result};
