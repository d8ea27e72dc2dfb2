//! SQL schema for the Agenda SQLite store.
//!
//! Executed once at connection startup. The version is recorded in
//! `PRAGMA user_version`; databases created at an older version are brought
//! forward with the `MIGRATE_*` batches before the schema runs.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS days (
    day_index INTEGER PRIMARY KEY,
    date      TEXT NOT NULL            -- YYYY-MM-DD
);

-- Ids are reassigned on every reload; (name, type) is the identity.
-- name_folded is the Unicode lowercase of name; SQLite's LIKE only folds
-- ASCII.
CREATE TABLE IF NOT EXISTS tracks (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    name_folded TEXT NOT NULL,
    type        TEXT NOT NULL,
    UNIQUE (name, type)
);

-- Days are written after the event loop of a reload, so the day reference
-- is only checked at commit.
CREATE TABLE IF NOT EXISTS events (
    id          INTEGER PRIMARY KEY,
    day_index   INTEGER NOT NULL
                REFERENCES days(day_index) DEFERRABLE INITIALLY DEFERRED,
    start_time  INTEGER,               -- unix millis
    end_time    INTEGER,               -- unix millis
    room_name   TEXT,
    slug        TEXT,
    track_id    INTEGER NOT NULL
                REFERENCES tracks(id) DEFERRABLE INITIALLY DEFERRED,
    abstract    TEXT,
    description TEXT
);

-- rowid = events.id; always written and cleared together with events.
CREATE VIRTUAL TABLE IF NOT EXISTS event_titles USING fts5(
    title,
    subtitle,
    tokenize = 'unicode61 remove_diacritics 2'
);

CREATE TABLE IF NOT EXISTS persons (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

-- rowid = persons.id
CREATE VIRTUAL TABLE IF NOT EXISTS person_names USING fts5(
    name,
    tokenize = 'unicode61 remove_diacritics 2'
);

-- position is the person's index in the feed's list for the event.
CREATE TABLE IF NOT EXISTS events_persons (
    event_id  INTEGER NOT NULL
              REFERENCES events(id) DEFERRABLE INITIALLY DEFERRED,
    person_id INTEGER NOT NULL
              REFERENCES persons(id) DEFERRABLE INITIALLY DEFERRED,
    position  INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (event_id, person_id)
);

-- Links keep feed order through their rowid.
CREATE TABLE IF NOT EXISTS links (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id    INTEGER NOT NULL
                REFERENCES events(id) DEFERRABLE INITIALLY DEFERRED,
    url         TEXT NOT NULL,
    description TEXT
);

-- No foreign key: bookmarks outlive the events they point at until the
-- stale purge of a later reload.
CREATE TABLE IF NOT EXISTS bookmarks (
    event_id INTEGER PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS metadata (
    key   TEXT PRIMARY KEY,
    value TEXT
);

CREATE INDEX IF NOT EXISTS events_day_track_idx ON events(day_index, track_id);
CREATE INDEX IF NOT EXISTS events_start_idx     ON events(start_time);
CREATE INDEX IF NOT EXISTS events_end_idx       ON events(end_time);
CREATE INDEX IF NOT EXISTS events_persons_person_idx ON events_persons(person_id);
CREATE INDEX IF NOT EXISTS links_event_idx      ON links(event_id);

PRAGMA user_version = 2;
";

/// Version written by [`SCHEMA`].
pub const SCHEMA_VERSION: i64 = 2;

/// Brings a version 1 database to version 2. Rows kept from version 1 get an
/// ASCII-only fold and position 0 until the next reload rewrites them.
pub const MIGRATE_V1_TO_V2: &str = "
ALTER TABLE tracks ADD COLUMN name_folded TEXT NOT NULL DEFAULT '';
UPDATE tracks SET name_folded = lower(name);
ALTER TABLE events_persons ADD COLUMN position INTEGER NOT NULL DEFAULT 0;
";

/// Metadata key holding the RFC 3339 time of the last successful reload.
pub const LAST_UPDATE_KEY: &str = "last_update";

/// Metadata key holding the feed's version tag of the last successful reload.
pub const VERSION_TAG_KEY: &str = "version_tag";

/// Statements that empty every schedule table, children first.
pub const CLEAR_SCHEDULE: &str = "
DELETE FROM links;
DELETE FROM events_persons;
DELETE FROM person_names;
DELETE FROM persons;
DELETE FROM event_titles;
DELETE FROM events;
DELETE FROM tracks;
DELETE FROM days;
";
