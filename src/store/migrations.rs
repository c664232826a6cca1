//! Forward-only, numbered schema migrations (§4.2).

use rusqlite::Connection;

use crate::error::{Result, SyncError};

pub const LATEST_VERSION: u32 = 1;

/// SQL for each migration, in order. Index `i` is migration version `i + 1`.
const MIGRATIONS: &[&str] = &[MIGRATION_1];

const MIGRATION_1: &str = r"
CREATE TABLE settings (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE targets (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    kind         TEXT NOT NULL CHECK (kind IN ('repo', 'service')),
    display_name TEXT NOT NULL,
    local_path   TEXT NOT NULL UNIQUE,
    store_path   TEXT NOT NULL UNIQUE,
    status       TEXT NOT NULL CHECK (status IN ('active', 'paused', 'error')),
    is_favourite INTEGER NOT NULL DEFAULT 0,
    service_type TEXT,
    icon         TEXT
);

CREATE TABLE tracked_files (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    target_id       INTEGER NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
    relative_path   TEXT NOT NULL,
    kind            TEXT NOT NULL CHECK (kind IN ('file', 'symlink')),
    store_checksum  TEXT,
    target_checksum TEXT,
    store_mtime     INTEGER,
    target_mtime    INTEGER,
    sync_status     TEXT NOT NULL,
    last_synced_at  INTEGER,
    last_error      TEXT,
    UNIQUE (target_id, relative_path)
);

CREATE TABLE conflicts (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    tracked_file_id  INTEGER NOT NULL REFERENCES tracked_files(id) ON DELETE CASCADE,
    store_content     BLOB,
    target_content    BLOB,
    base_content      BLOB,
    merged_content    BLOB,
    store_checksum    TEXT,
    target_checksum   TEXT,
    status            TEXT NOT NULL,
    resolved_at       INTEGER
);

CREATE INDEX idx_conflicts_tracked_file ON conflicts(tracked_file_id);

CREATE TABLE pattern_global (
    pattern TEXT NOT NULL,
    kind    TEXT NOT NULL CHECK (kind IN ('include', 'ignore')),
    enabled INTEGER NOT NULL DEFAULT 1,
    source  TEXT NOT NULL CHECK (source IN ('default', 'user')),
    PRIMARY KEY (pattern, kind)
);

CREATE TABLE pattern_override (
    target_id INTEGER NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
    pattern   TEXT NOT NULL,
    kind      TEXT NOT NULL CHECK (kind IN ('include', 'ignore')),
    enabled   INTEGER NOT NULL,
    PRIMARY KEY (target_id, pattern, kind)
);

CREATE TABLE pattern_local (
    target_id INTEGER NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
    pattern   TEXT NOT NULL,
    kind      TEXT NOT NULL CHECK (kind IN ('include', 'ignore')),
    enabled   INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (target_id, pattern, kind)
);

CREATE TABLE sync_log (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    at        INTEGER NOT NULL,
    target_id INTEGER NOT NULL,
    kind      TEXT NOT NULL,
    detail    TEXT NOT NULL
);

CREATE INDEX idx_sync_log_target ON sync_log(target_id, at);
";

/// Apply any migrations beyond the currently recorded version. Failure is
/// fatal per §7 — the caller should refuse to start the engine.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let current = current_version(conn)?;
    let tx = conn.transaction()?;
    for (i, sql) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as u32;
        if version <= current {
            continue;
        }
        tx.execute_batch(sql).map_err(|e| SyncError::Migration {
            version,
            detail: e.to_string(),
        })?;
    }
    tx.execute(
        "INSERT INTO settings (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![LATEST_VERSION.to_string()],
    )?;
    tx.commit()?;
    Ok(())
}

fn current_version(conn: &Connection) -> Result<u32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'settings'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count > 0)?;
    if !table_exists {
        return Ok(0);
    }
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .ok();
    Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
}
