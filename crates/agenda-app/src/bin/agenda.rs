//! agenda command-line client.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the local
//! schedule store and runs one command. `agenda import` loads a JSON feed
//! (an array of detailed events). `agenda watch` keeps running and logs
//! a reminder for every bookmarked event as its alarm fires.

use std::{path::PathBuf, sync::Arc};

use agenda_app::{
  App,
  config::AppConfig,
  timers::{LogNotifier, TokioTimers},
};
use agenda_core::{
  schedule::EventItem,
  store::{SearchQuery, TimeWindow},
};
use anyhow::Context as _;
use chrono::Utc;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about = "Local conference schedule")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Replace the schedule with a JSON feed file.
  Import {
    path: PathBuf,
    /// Opaque version tag recorded with the import.
    #[arg(long)]
    version_tag: Option<String>,
  },
  /// Show when the schedule was last loaded and what it contains.
  Status,
  /// Search titles, tracks and speakers.
  Search { query: String },
  /// List events running right now.
  Now,
  /// List bookmarked events.
  Bookmarks {
    /// Only events that have not started yet.
    #[arg(long)]
    upcoming: bool,
  },
  /// Bookmark an event.
  Add { event_id: i64 },
  /// Remove bookmarks.
  Remove {
    #[arg(required = true)]
    event_ids: Vec<i64>,
  },
  /// Stay in the foreground and log reminders as they fire.
  Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  agenda_app::init_tracing();

  let cli = Cli::parse();

  let config = AppConfig::load(Some(&cli.config)).context("failed to read configuration")?;

  let (timers, fired) = TokioTimers::new();
  let timers = Arc::new(timers);
  let app = App::open(&config, timers.clone(), Arc::new(LogNotifier)).await?;

  match cli.command {
    Command::Import { path, version_tag } => {
      match app.import_file(&path, version_tag).await? {
        0 => println!("feed was empty; schedule unchanged"),
        n => println!("imported {n} events"),
      }
    }
    Command::Status => {
      let last_update = app.queries.last_update_time().await?;
      let version_tag = app.queries.last_version_tag().await?;
      let days = app.queries.days().await?.current();
      let bookmarks = app.queries.bookmarks(None).await?.current();
      match last_update {
        Some(at) => println!("last update: {at}"),
        None => println!("last update: never"),
      }
      println!("version tag: {}", version_tag.as_deref().unwrap_or("-"));
      println!("days:        {}", days.len());
      println!("bookmarks:   {}", bookmarks.len());
    }
    Command::Search { query } => {
      let query = SearchQuery::new(query)?;
      print_events(&app.queries.search(query.as_str()).await?.current());
    }
    Command::Now => {
      let window = TimeWindow::running_at(Utc::now());
      print_events(&app.queries.events_in_window(window).await?.current());
    }
    Command::Bookmarks { upcoming } => {
      let min_start = upcoming.then(Utc::now);
      print_events(&app.queries.bookmarks(min_start).await?.current());
    }
    Command::Add { event_id } => {
      let item = app
        .queries
        .event(event_id)
        .await?
        .with_context(|| format!("no event with id {event_id}"))?;
      if app.bookmarks.add(&item.event).await? {
        println!("bookmarked {}", item.event.title);
      } else {
        println!("already bookmarked");
      }
    }
    Command::Remove { event_ids } => {
      if app.bookmarks.remove_all(event_ids).await? {
        println!("removed");
      } else {
        println!("nothing to remove");
      }
    }
    Command::Watch => {
      let delivery = app.drive_alarms(fired);
      tracing::info!(armed = timers.armed_count(), "watching for reminders");
      tokio::signal::ctrl_c().await.context("failed to wait for ctrl-c")?;
      delivery.abort();
    }
  }

  Ok(())
}

fn print_events(items: &[EventItem]) {
  for item in items {
    let event = &item.event;
    let start = event
      .start_time
      .map(|t| t.format("%a %H:%M").to_string())
      .unwrap_or_else(|| "--:--".into());
    let length = event
      .duration()
      .map(|d| format!("{}m", d.num_minutes()))
      .unwrap_or_else(|| "-".into());
    let mark = if item.is_bookmarked { '*' } else { ' ' };
    println!(
      "{mark} {:>6}  {start}  {length:>4}  {:<24}  {}",
      event.id, event.track.name, event.title
    );
  }
}
