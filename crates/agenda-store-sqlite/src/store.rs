//! [`SqliteStore`], the SQLite implementation of [`ScheduleStore`].

use std::{path::Path, sync::Arc};

use agenda_core::{
  bus::{ChangeBus, ScheduleChange},
  feed::FeedItem,
  schedule::{Day, EventItem, Link, Person, SearchSuggestion, Track},
  store::{ScheduleStore, TimeWindow},
};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, types::Value};
use tokio::sync::RwLock;

use crate::{
  Error, Result,
  encode::{
    EVENT_COLUMNS, EVENT_JOINS, ORDER_BY_START, RawEvent, RawTrack, decode_date,
    decode_dt, encode_millis, fts_prefix_query, like_substring,
  },
  reload::{self, ImportOutcome},
  schema::{LAST_UPDATE_KEY, MIGRATE_V1_TO_V2, SCHEMA, SCHEMA_VERSION, VERSION_TAG_KEY},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Last-update time as seen by this process.
#[derive(Clone, Copy)]
enum CachedUpdate {
  Unloaded,
  Loaded(Option<DateTime<Utc>>),
}

/// A schedule store backed by a single SQLite file.
///
/// Cloning is cheap; the connection, the bus and the metadata cache are
/// shared.
#[derive(Clone)]
pub struct SqliteStore {
  conn:        tokio_rusqlite::Connection,
  bus:         ChangeBus,
  last_update: Arc<RwLock<CachedUpdate>>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  /// Successful reloads are announced on `bus`.
  pub async fn open(path: impl AsRef<Path>, bus: ChangeBus) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, bus).await
  }

  /// Open an in-memory store. Useful for testing.
  pub async fn open_in_memory(bus: ChangeBus) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, bus).await
  }

  async fn init(conn: tokio_rusqlite::Connection, bus: ChangeBus) -> Result<Self> {
    conn
      .call(|conn| {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version == 1 {
          tracing::info!(from = version, to = SCHEMA_VERSION, "migrating schedule schema");
          conn.execute_batch(MIGRATE_V1_TO_V2)?;
        }
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self {
      conn,
      bus,
      last_update: Arc::new(RwLock::new(CachedUpdate::Unloaded)),
    })
  }

  async fn metadata(&self, key: &'static str) -> Result<Option<String>> {
    let value = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM metadata WHERE key = ?1",
              rusqlite::params![key],
              |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten(),
        )
      })
      .await?;
    Ok(value)
  }

  /// Run an event query. `filter` is everything after the shared joins.
  async fn event_items(&self, filter: String, params: Vec<Value>) -> Result<Vec<EventItem>> {
    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {EVENT_COLUMNS} {EVENT_JOINS} {filter}");
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_item).collect()
  }

  async fn persons_where(&self, sql: &'static str, params: Vec<Value>) -> Result<Vec<Person>> {
    let persons = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            Ok(Person {
              id:   row.get(0)?,
              name: row.get(1)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(persons)
  }

  /// A handle over the same connection whose metadata cache is empty.
  #[cfg(test)]
  pub(crate) fn with_cold_cache(&self) -> Self {
    Self {
      conn:        self.conn.clone(),
      bus:         self.bus.clone(),
      last_update: Arc::new(RwLock::new(CachedUpdate::Unloaded)),
    }
  }

  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) async fn count_rows(&self, table: &'static str) -> Result<i64> {
    let count = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
          row.get(0)
        })?)
      })
      .await?;
    Ok(count)
  }
}

/// The `e.id IN (...)` predicate shared by search and suggestions, with its
/// parameters numbered from 1.
fn search_predicate(query: &str) -> (String, Vec<Value>) {
  let mut branches = Vec::new();
  let mut params = Vec::new();

  if let Some(expr) = fts_prefix_query(query) {
    params.push(Value::Text(expr));
    let n = params.len();
    branches.push(format!(
      "SELECT rowid FROM event_titles WHERE event_titles MATCH ?{n}"
    ));
    branches.push(format!(
      "SELECT ep.event_id FROM events_persons ep
        WHERE ep.person_id IN (
          SELECT rowid FROM person_names WHERE person_names MATCH ?{n})"
    ));
  }

  params.push(Value::Text(like_substring(query)));
  let n = params.len();
  branches.push(format!(
    "SELECT te.id FROM events te
       JOIN tracks tt ON tt.id = te.track_id
      WHERE tt.name_folded LIKE ?{n} ESCAPE '\\'"
  ));

  (format!("e.id IN ({})", branches.join(" UNION ")), params)
}

// ─── ScheduleStore impl ──────────────────────────────────────────────────────

impl ScheduleStore for SqliteStore {
  type Error = Error;

  // ── Reload ────────────────────────────────────────────────────────────────

  async fn reload_schedule<I>(&self, events: I, version_tag: Option<String>) -> Result<usize>
  where
    I: IntoIterator<Item = FeedItem> + Send + 'static,
    I::IntoIter: Send + 'static,
  {
    let events = events.into_iter();

    let outcome = self
      .conn
      .call(move |conn| Ok(reload::import(conn, events, version_tag.as_deref())?))
      .await?;

    match outcome {
      ImportOutcome::Empty => {
        tracing::info!("feed contained no events, keeping the current schedule");
        Ok(0)
      }
      ImportOutcome::FeedFailed { imported, error } => {
        tracing::warn!(imported, error = %error, "feed failed during reload, rolled back");
        Err(Error::Feed {
          imported,
          source: error,
        })
      }
      ImportOutcome::Committed(summary) => {
        *self.last_update.write().await = CachedUpdate::Loaded(Some(summary.committed_at));
        tracing::info!(
          imported = summary.imported,
          skipped = summary.skipped,
          tracks = summary.tracks,
          days = summary.days,
          purged_bookmarks = summary.purged_bookmarks,
          "schedule reloaded"
        );
        self.bus.publish(ScheduleChange::ScheduleRefreshed);
        Ok(summary.imported)
      }
    }
  }

  async fn last_update_time(&self) -> Result<Option<DateTime<Utc>>> {
    if let CachedUpdate::Loaded(at) = *self.last_update.read().await {
      return Ok(at);
    }

    // Hold the write lock across the read so a concurrent reload cannot be
    // overwritten by the older persisted value.
    let mut cached = self.last_update.write().await;
    if let CachedUpdate::Loaded(at) = *cached {
      return Ok(at);
    }
    let at = self
      .metadata(LAST_UPDATE_KEY)
      .await?
      .as_deref()
      .map(decode_dt)
      .transpose()?;
    *cached = CachedUpdate::Loaded(at);
    Ok(at)
  }

  async fn last_version_tag(&self) -> Result<Option<String>> {
    self.metadata(VERSION_TAG_KEY).await
  }

  // ── Schedule reads ────────────────────────────────────────────────────────

  async fn days(&self) -> Result<Vec<Day>> {
    let raws: Vec<(u16, String)> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare_cached("SELECT day_index, date FROM days ORDER BY day_index ASC")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(index, date)| {
        Ok(Day {
          index,
          date: decode_date(&date)?,
        })
      })
      .collect()
  }

  async fn tracks(&self, day_index: u16) -> Result<Vec<Track>> {
    let raws: Vec<RawTrack> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT DISTINCT t.id, t.name, t.type
             FROM tracks t
             JOIN events e ON e.track_id = t.id
            WHERE e.day_index = ?1
            ORDER BY t.name ASC, t.type ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![day_index], |row| {
            Ok(RawTrack {
              id:         row.get(0)?,
              name:       row.get(1)?,
              track_type: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTrack::into_track).collect()
  }

  async fn events_by_track(&self, day_index: u16, track_id: i64) -> Result<Vec<EventItem>> {
    self
      .event_items(
        format!("WHERE e.day_index = ?1 AND e.track_id = ?2 {ORDER_BY_START}"),
        vec![Value::Integer(day_index.into()), Value::Integer(track_id)],
      )
      .await
  }

  async fn events_in_window(&self, window: TimeWindow) -> Result<Vec<EventItem>> {
    window.validate()?;

    let mut conds: Vec<String> = vec![];
    let mut params: Vec<Value> = vec![];
    let bounds = [
      (window.min_start, "e.start_time >"),
      (window.max_start, "e.start_time <"),
      (window.min_end, "e.end_time >"),
    ];
    for (bound, cond) in bounds {
      if let Some(at) = bound {
        params.push(Value::Integer(encode_millis(at)));
        conds.push(format!("{cond} ?{}", params.len()));
      }
    }

    let direction = if window.ascending { "ASC" } else { "DESC" };
    self
      .event_items(
        format!(
          "WHERE {} ORDER BY e.start_time IS NULL, e.start_time {direction}, e.id {direction}",
          conds.join(" AND ")
        ),
        params,
      )
      .await
  }

  async fn events_by_person(&self, person_id: i64) -> Result<Vec<EventItem>> {
    self
      .event_items(
        format!(
          "WHERE e.id IN (SELECT event_id FROM events_persons WHERE person_id = ?1)
           {ORDER_BY_START}"
        ),
        vec![Value::Integer(person_id)],
      )
      .await
  }

  async fn bookmarks(&self, min_start: Option<DateTime<Utc>>) -> Result<Vec<EventItem>> {
    let (filter, params) = match min_start {
      Some(at) => (
        format!("WHERE b.event_id IS NOT NULL AND e.start_time > ?1 {ORDER_BY_START}"),
        vec![Value::Integer(encode_millis(at))],
      ),
      None => (format!("WHERE b.event_id IS NOT NULL {ORDER_BY_START}"), vec![]),
    };
    self.event_items(filter, params).await
  }

  async fn search(&self, query: String) -> Result<Vec<EventItem>> {
    if query.trim().is_empty() {
      return Ok(vec![]);
    }
    let (predicate, params) = search_predicate(&query);
    self
      .event_items(format!("WHERE {predicate} {ORDER_BY_START}"), params)
      .await
  }

  async fn search_suggestions(
    &self,
    query: String,
    limit: usize,
  ) -> Result<Vec<SearchSuggestion>> {
    if query.trim().is_empty() || limit == 0 {
      return Ok(vec![]);
    }
    let (predicate, mut params) = search_predicate(&query);
    params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    let limit_param = params.len();

    let suggestions = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT e.id, et.title,
                  COALESCE(NULLIF(et.subtitle, ''),
                           (SELECT GROUP_CONCAT(p.name, ', ' ORDER BY ep.position)
                              FROM events_persons ep
                              JOIN persons p ON p.id = ep.person_id
                             WHERE ep.event_id = e.id))
             FROM events e
             JOIN event_titles et ON et.rowid = e.id
            WHERE {predicate}
            {ORDER_BY_START}
            LIMIT ?{limit_param}"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            Ok(SearchSuggestion {
              event_id:         row.get(0)?,
              title:            row.get(1)?,
              subtitle_preview: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(suggestions)
  }

  async fn persons(&self) -> Result<Vec<Person>> {
    self
      .persons_where(
        "SELECT id, name FROM persons ORDER BY name COLLATE NOCASE ASC, id ASC",
        vec![],
      )
      .await
  }

  async fn event_persons(&self, event_id: i64) -> Result<Vec<Person>> {
    self
      .persons_where(
        "SELECT p.id, p.name
           FROM persons p
           JOIN events_persons ep ON ep.person_id = p.id
          WHERE ep.event_id = ?1
          ORDER BY ep.position ASC, p.id ASC",
        vec![Value::Integer(event_id)],
      )
      .await
  }

  async fn event_links(&self, event_id: i64) -> Result<Vec<Link>> {
    let links = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT event_id, url, description FROM links WHERE event_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![event_id], |row| {
            Ok(Link {
              event_id:    row.get(0)?,
              url:         row.get(1)?,
              description: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(links)
  }

  async fn event(&self, event_id: i64) -> Result<Option<EventItem>> {
    let mut items = self
      .event_items("WHERE e.id = ?1".to_owned(), vec![Value::Integer(event_id)])
      .await?;
    Ok(items.pop())
  }

  // ── Bookmarks ─────────────────────────────────────────────────────────────

  async fn is_bookmarked(&self, event_id: i64) -> Result<bool> {
    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM bookmarks WHERE event_id = ?1",
              rusqlite::params![event_id],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }

  async fn insert_bookmark(&self, event_id: i64) -> Result<bool> {
    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO bookmarks (event_id) VALUES (?1)",
          rusqlite::params![event_id],
        )?)
      })
      .await?;
    Ok(inserted > 0)
  }

  async fn delete_bookmarks(&self, event_ids: Vec<i64>) -> Result<bool> {
    if event_ids.is_empty() {
      return Err(agenda_core::Error::NoBookmarkIds.into());
    }

    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
          let mut stmt = tx.prepare_cached("DELETE FROM bookmarks WHERE event_id = ?1")?;
          for id in &event_ids {
            removed += stmt.execute(rusqlite::params![id])?;
          }
        }
        tx.commit()?;
        Ok(removed)
      })
      .await?;
    Ok(removed > 0)
  }
}
