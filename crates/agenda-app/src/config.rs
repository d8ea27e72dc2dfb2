//! Runtime configuration, read from an optional TOML file and `AGENDA_*`
//! environment variables.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `AGENDA_NOTIFICATIONS__DELAY_MINUTES=10`.

use std::path::{Path, PathBuf};

use agenda_alarms::AlarmSettings;
use agenda_core::bus::DEFAULT_CAPACITY;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

/// Store path that opens a throwaway in-memory database.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  pub store_path:    PathBuf,
  pub bus_capacity:  usize,
  pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
  pub enabled:       bool,
  /// Minutes before an event's start at which its reminder fires.
  pub delay_minutes: u32,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      store_path:    PathBuf::from("~/.local/share/agenda/schedule.db"),
      bus_capacity:  DEFAULT_CAPACITY,
      notifications: NotificationConfig::default(),
    }
  }
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      enabled:       true,
      delay_minutes: 0,
    }
  }
}

impl NotificationConfig {
  pub fn alarm_settings(&self) -> AlarmSettings {
    AlarmSettings {
      enabled: self.enabled,
      delay:   chrono::Duration::minutes(i64::from(self.delay_minutes)),
    }
  }
}

impl AppConfig {
  /// Load from `path` (if it exists) overlaid with the process environment.
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
      builder = builder.add_source(File::from(path).required(false));
    }
    builder
      .add_source(environment())
      .build()?
      .try_deserialize()
  }

  /// Parse a TOML document, without consulting the environment.
  pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()?
      .try_deserialize()
  }

  pub fn is_in_memory(&self) -> bool { self.store_path.as_os_str() == IN_MEMORY }

  /// The store path with a leading `~` expanded.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

pub(crate) fn environment() -> Environment {
  Environment::with_prefix("AGENDA")
    .prefix_separator("_")
    .separator("__")
    .try_parsing(true)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Some(home) = std::env::var_os("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
