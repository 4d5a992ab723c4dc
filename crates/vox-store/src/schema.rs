//! SQL DDL for the presence database.

/// Current schema version, recorded in `schema_version`.
pub const SCHEMA_VERSION: u32 = 1;

/// Applied on every open.
pub const PRAGMAS: &str = r"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA busy_timeout = 5000;
";

/// One row per join. `id` preserves insertion order.
pub const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS presence (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    joined_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER))
);

CREATE INDEX IF NOT EXISTS idx_presence_username ON presence(username, id);
";
