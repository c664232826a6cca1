//! Metadata store (§4.2) — durable storage for repos, services, tracked
//! files, conflicts, settings, overrides, and the sync log.
//!
//! Backed by SQLite (`rusqlite`, bundled). Schema evolution is a numbered,
//! forward-only migration list; the latest applied version is persisted in
//! a row of the `settings` table. Foreign keys cascade on target deletion.
//! Reads may proceed concurrently; writes are serialised through a single
//! `Mutex<Connection>` gatekeeper (§5, §9 "async I/O plus a synchronous
//! database").

mod migrations;
mod queries;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use crate::error::{Result, SyncError};

pub use queries::*;

/// The durable relational store. One instance per engine process, opened
/// against `<store>/.db/<dbfile>` (§6).
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if absent) the metadata store at `path`, applying any
    /// pending migrations. A migration failure is fatal (§7): the engine
    /// refuses to start.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migrations::migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory store. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` with exclusive access to the underlying connection. Callers
    /// must not hold this lock across an I/O suspension point (§5 locking
    /// discipline) — acquire, mutate, release.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| SyncError::Store(rusqlite::Error::ExecuteReturnedResults))?;
        f(&conn).map_err(SyncError::from)
    }
}
