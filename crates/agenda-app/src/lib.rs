//! Composition root for Agenda.
//!
//! [`App::open`] wires one change bus, the SQLite store, the query layer, the
//! bookmark manager and the alarm scheduler together, starts the alarm
//! reactor and re-derives every alarm once at boot.

pub mod config;
pub mod import;
pub mod timers;

use std::{path::Path, sync::Arc};

use agenda_alarms::{AlarmScheduler, Notifier, TimerPort};
use agenda_core::{
  bookmarks::BookmarkManager, bus::ChangeBus, queries::ScheduleQueries, store::ScheduleStore,
};
use agenda_store_sqlite::SqliteStore;
use anyhow::Context as _;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// `info` level.
pub fn init_tracing() {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();
}

// ─── App ─────────────────────────────────────────────────────────────────────

pub struct App {
  pub bus:       ChangeBus,
  pub store:     Arc<SqliteStore>,
  pub queries:   ScheduleQueries<SqliteStore>,
  pub bookmarks: Arc<BookmarkManager<SqliteStore>>,
  pub alarms:    Arc<AlarmScheduler<SqliteStore>>,
  reactor:       JoinHandle<()>,
}

impl App {
  pub async fn open(
    config: &AppConfig,
    timers: Arc<dyn TimerPort>,
    notifier: Arc<dyn Notifier>,
  ) -> anyhow::Result<Self> {
    let bus = ChangeBus::new(config.bus_capacity);

    let store = if config.is_in_memory() {
      SqliteStore::open_in_memory(bus.clone())
        .await
        .context("failed to open in-memory store")?
    } else {
      let path = config.resolved_store_path();
      if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
          .await
          .with_context(|| format!("failed to create {parent:?}"))?;
      }
      SqliteStore::open(&path, bus.clone())
        .await
        .with_context(|| format!("failed to open store at {path:?}"))?
    };
    let store = Arc::new(store);

    let alarms = Arc::new(AlarmScheduler::new(
      store.clone(),
      timers,
      notifier,
      config.notifications.alarm_settings(),
    ));
    let reactor = alarms.clone().spawn(&bus);

    let has_future = alarms
      .reconcile_all()
      .await
      .context("failed to reconcile alarms at startup")?;
    tracing::info!(has_future, "agenda store ready");

    Ok(Self {
      queries: ScheduleQueries::new(store.clone(), bus.clone()),
      bookmarks: Arc::new(BookmarkManager::new(store.clone(), bus.clone())),
      bus,
      store,
      alarms,
      reactor,
    })
  }

  /// Replace the schedule with the JSON feed at `path`. Returns the number of
  /// imported events; `0` means the feed was empty and nothing changed.
  pub async fn import_file(&self, path: &Path, version_tag: Option<String>) -> anyhow::Result<usize> {
    let json = tokio::fs::read_to_string(path)
      .await
      .with_context(|| format!("failed to read feed {path:?}"))?;
    let feed = import::parse_feed(&json).with_context(|| format!("invalid feed {path:?}"))?;
    let imported = self
      .store
      .reload_schedule(feed, version_tag)
      .await
      .context("failed to reload schedule")?;
    Ok(imported)
  }

  /// Forward elapsed timers to [`AlarmScheduler::fire`] until `fired`
  /// closes.
  pub fn drive_alarms(&self, mut fired: mpsc::UnboundedReceiver<i64>) -> JoinHandle<()> {
    let alarms = self.alarms.clone();
    tokio::spawn(async move {
      while let Some(event_id) = fired.recv().await {
        if let Err(err) = alarms.fire(event_id).await {
          tracing::warn!(event_id, error = %err, "failed to deliver reminder");
        }
      }
    })
  }
}

impl Drop for App {
  fn drop(&mut self) { self.reactor.abort(); }
}
