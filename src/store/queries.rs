//! CRUD operations exposed to the sync engine (§4.2).

use rusqlite::{params, OptionalExtension, Row};

use crate::error::Result;
use crate::model::conflict::{Conflict, ConflictId, ConflictStatus};
use crate::model::log::{LogEntry, LogKind};
use crate::model::pattern::{PatternEntry, PatternKind, PatternSource};
use crate::model::settings::{GlobalSettings, DEFAULT_SIZE_BLOCK_BYTES};
use crate::model::target::{SyncTarget, TargetId, TargetKind, TargetStatus};
use crate::model::tracked_file::{FileKind, SyncStatus, TrackedFile, TrackedFileId};

use super::Store;

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

impl Store {
    pub fn schema_version(&self) -> Result<u32> {
        self.with_conn(|conn| {
            let value: Option<String> = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = 'schema_version'",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
        })
    }

    pub fn insert_target(&self, target: &SyncTarget) -> Result<TargetId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO targets
                 (kind, display_name, local_path, store_path, status, is_favourite, service_type, icon)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    target.kind.as_str(),
                    target.display_name,
                    target.local_path.to_string_lossy(),
                    target.store_path,
                    target.status.as_str(),
                    i64::from(target.is_favourite),
                    target.service_type,
                    target.icon,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_target(&self, id: TargetId) -> Result<Option<SyncTarget>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, kind, display_name, local_path, store_path, status,
                        is_favourite, service_type, icon
                 FROM targets WHERE id = ?1",
                params![id],
                row_to_target,
            )
            .optional()
        })
    }

    pub fn get_target_by_store_path(&self, store_path: &str) -> Result<Option<SyncTarget>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, kind, display_name, local_path, store_path, status,
                        is_favourite, service_type, icon
                 FROM targets WHERE store_path = ?1",
                params![store_path],
                row_to_target,
            )
            .optional()
        })
    }

    pub fn list_targets(&self) -> Result<Vec<SyncTarget>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, kind, display_name, local_path, store_path, status,
                        is_favourite, service_type, icon
                 FROM targets ORDER BY id",
            )?;
            let rows = stmt.query_map([], row_to_target)?;
            rows.collect()
        })
    }

    pub fn update_target_status(&self, id: TargetId, status: TargetStatus) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE targets SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )?;
            Ok(())
        })
    }

    pub fn delete_target(&self, id: TargetId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM targets WHERE id = ?1", params![id])?;
            Ok(())
        })
    }
}

fn row_to_target(row: &Row<'_>) -> rusqlite::Result<SyncTarget> {
    let kind: String = row.get(1)?;
    let status: String = row.get(5)?;
    Ok(SyncTarget {
        id: row.get(0)?,
        kind: parse_target_kind(&kind),
        display_name: row.get(2)?,
        local_path: row.get::<_, String>(3)?.into(),
        store_path: row.get(4)?,
        status: parse_target_status(&status),
        is_favourite: row.get::<_, i64>(6)? != 0,
        service_type: row.get(7)?,
        icon: row.get(8)?,
    })
}

fn parse_target_kind(s: &str) -> TargetKind {
    match s {
        "service" => TargetKind::Service,
        _ => TargetKind::Repo,
    }
}

fn parse_target_status(s: &str) -> TargetStatus {
    match s {
        "paused" => TargetStatus::Paused,
        "error" => TargetStatus::Error,
        _ => TargetStatus::Active,
    }
}

// ---------------------------------------------------------------------------
// Tracked files
// ---------------------------------------------------------------------------

impl Store {
    /// Atomic read by `(target_id, relative_path)` (§4.2).
    pub fn get_tracked_file(
        &self,
        target_id: TargetId,
        relative_path: &str,
    ) -> Result<Option<TrackedFile>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, target_id, relative_path, kind, store_checksum, target_checksum,
                        store_mtime, target_mtime, sync_status, last_synced_at, last_error
                 FROM tracked_files WHERE target_id = ?1 AND relative_path = ?2",
                params![target_id, relative_path],
                row_to_tracked_file,
            )
            .optional()
        })
    }

    pub fn get_tracked_file_by_id(&self, id: TrackedFileId) -> Result<Option<TrackedFile>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, target_id, relative_path, kind, store_checksum, target_checksum,
                        store_mtime, target_mtime, sync_status, last_synced_at, last_error
                 FROM tracked_files WHERE id = ?1",
                params![id],
                row_to_tracked_file,
            )
            .optional()
        })
    }

    pub fn list_tracked_files(&self, target_id: TargetId) -> Result<Vec<TrackedFile>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, target_id, relative_path, kind, store_checksum, target_checksum,
                        store_mtime, target_mtime, sync_status, last_synced_at, last_error
                 FROM tracked_files WHERE target_id = ?1 ORDER BY relative_path",
            )?;
            let rows = stmt.query_map(params![target_id], row_to_tracked_file)?;
            rows.collect()
        })
    }

    /// Atomic upsert keyed by `(target_id, relative_path)` — used for both
    /// the initial insert and in-place updates (§4.2).
    pub fn upsert_tracked_file(&self, file: &TrackedFile) -> Result<TrackedFileId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tracked_files
                 (target_id, relative_path, kind, store_checksum, target_checksum,
                  store_mtime, target_mtime, sync_status, last_synced_at, last_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(target_id, relative_path) DO UPDATE SET
                    kind = excluded.kind,
                    store_checksum = excluded.store_checksum,
                    target_checksum = excluded.target_checksum,
                    store_mtime = excluded.store_mtime,
                    target_mtime = excluded.target_mtime,
                    sync_status = excluded.sync_status,
                    last_synced_at = excluded.last_synced_at,
                    last_error = excluded.last_error",
                params![
                    file.target_id,
                    file.relative_path,
                    kind_str(file.kind),
                    file.store_checksum,
                    file.target_checksum,
                    file.store_mtime,
                    file.target_mtime,
                    file.sync_status.as_str(),
                    file.last_synced_at,
                    file.last_error,
                ],
            )?;
            conn.query_row(
                "SELECT id FROM tracked_files WHERE target_id = ?1 AND relative_path = ?2",
                params![file.target_id, file.relative_path],
                |row| row.get(0),
            )
        })
    }

    /// Delete a tracked file record (both sides gone, §4.8 step 2).
    pub fn delete_tracked_file(&self, id: TrackedFileId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM tracked_files WHERE id = ?1", params![id])?;
            Ok(())
        })
    }
}

fn kind_str(kind: FileKind) -> &'static str {
    match kind {
        FileKind::File => "file",
        FileKind::Symlink => "symlink",
    }
}

fn row_to_tracked_file(row: &Row<'_>) -> rusqlite::Result<TrackedFile> {
    let kind: String = row.get(3)?;
    let status: String = row.get(8)?;
    Ok(TrackedFile {
        id: row.get(0)?,
        target_id: row.get(1)?,
        relative_path: row.get(2)?,
        kind: if kind == "symlink" {
            FileKind::Symlink
        } else {
            FileKind::File
        },
        store_checksum: row.get(4)?,
        target_checksum: row.get(5)?,
        store_mtime: row.get(6)?,
        target_mtime: row.get(7)?,
        sync_status: parse_sync_status(&status),
        last_synced_at: row.get(9)?,
        last_error: row.get(10)?,
    })
}

fn parse_sync_status(s: &str) -> SyncStatus {
    match s {
        "pending_to_target" => SyncStatus::PendingToTarget,
        "pending_to_store" => SyncStatus::PendingToStore,
        "conflict" => SyncStatus::Conflict,
        "missing_in_target" => SyncStatus::MissingInTarget,
        "missing_in_store" => SyncStatus::MissingInStore,
        "error" => SyncStatus::Error,
        _ => SyncStatus::Synced,
    }
}

// ---------------------------------------------------------------------------
// Conflicts
// ---------------------------------------------------------------------------

impl Store {
    /// Current pending conflict for a tracked file, if any (§3 invariant:
    /// at most one).
    pub fn pending_conflict_for(&self, tracked_file_id: TrackedFileId) -> Result<Option<Conflict>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, tracked_file_id, store_content, target_content, base_content,
                        merged_content, store_checksum, target_checksum, status, resolved_at
                 FROM conflicts WHERE tracked_file_id = ?1 AND status = 'pending'",
                params![tracked_file_id],
                row_to_conflict,
            )
            .optional()
        })
    }

    pub fn get_conflict(&self, id: ConflictId) -> Result<Option<Conflict>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, tracked_file_id, store_content, target_content, base_content,
                        merged_content, store_checksum, target_checksum, status, resolved_at
                 FROM conflicts WHERE id = ?1",
                params![id],
                row_to_conflict,
            )
            .optional()
        })
    }

    pub fn list_pending_conflicts(&self, target_id: TargetId) -> Result<Vec<Conflict>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.tracked_file_id, c.store_content, c.target_content, c.base_content,
                        c.merged_content, c.store_checksum, c.target_checksum, c.status, c.resolved_at
                 FROM conflicts c
                 JOIN tracked_files tf ON tf.id = c.tracked_file_id
                 WHERE tf.target_id = ?1 AND c.status = 'pending'
                 ORDER BY c.id",
            )?;
            let rows = stmt.query_map(params![target_id], row_to_conflict)?;
            rows.collect()
        })
    }

    /// Insert (or refresh) the pending conflict for a tracked file and
    /// update the linked file's `sync_status` to `conflict`, as a single
    /// transaction (§4.2). Re-detection updates the existing row's
    /// contents rather than inserting a duplicate (§3, §4.8).
    pub fn open_or_update_conflict(
        &self,
        tracked_file_id: TrackedFileId,
        store_content: Option<&[u8]>,
        target_content: Option<&[u8]>,
        base_content: Option<&[u8]>,
        merged_content: Option<&[u8]>,
        store_checksum: Option<&str>,
        target_checksum: Option<&str>,
        new_file_status: SyncStatus,
    ) -> Result<ConflictId> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let existing: Option<ConflictId> = tx
                .query_row(
                    "SELECT id FROM conflicts WHERE tracked_file_id = ?1 AND status = 'pending'",
                    params![tracked_file_id],
                    |row| row.get(0),
                )
                .optional()?;

            let id = if let Some(id) = existing {
                tx.execute(
                    "UPDATE conflicts SET store_content = ?1, target_content = ?2,
                        base_content = ?3, merged_content = ?4, store_checksum = ?5,
                        target_checksum = ?6
                     WHERE id = ?7",
                    params![
                        store_content,
                        target_content,
                        base_content,
                        merged_content,
                        store_checksum,
                        target_checksum,
                        id
                    ],
                )?;
                id
            } else {
                tx.execute(
                    "INSERT INTO conflicts
                     (tracked_file_id, store_content, target_content, base_content,
                      merged_content, store_checksum, target_checksum, status, resolved_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', NULL)",
                    params![
                        tracked_file_id,
                        store_content,
                        target_content,
                        base_content,
                        merged_content,
                        store_checksum,
                        target_checksum,
                    ],
                )?;
                tx.last_insert_rowid()
            };

            tx.execute(
                "UPDATE tracked_files SET sync_status = ?1 WHERE id = ?2",
                params![new_file_status.as_str(), tracked_file_id],
            )?;
            tx.commit()?;
            Ok(id)
        })
    }

    /// Resolve a conflict to a terminal status and (when the file is now
    /// `synced`) clear it off the tracked file too, in one transaction.
    pub fn resolve_conflict(
        &self,
        id: ConflictId,
        status: ConflictStatus,
        resolved_at: i64,
    ) -> Result<()> {
        debug_assert!(!status.is_pending());
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE conflicts SET status = ?1, resolved_at = ?2 WHERE id = ?3",
                params![status.as_str(), resolved_at, id],
            )?;
            Ok(())
        })
    }
}

fn row_to_conflict(row: &Row<'_>) -> rusqlite::Result<Conflict> {
    let status: String = row.get(8)?;
    Ok(Conflict {
        id: row.get(0)?,
        tracked_file_id: row.get(1)?,
        store_content: row.get(2)?,
        target_content: row.get(3)?,
        base_content: row.get(4)?,
        merged_content: row.get(5)?,
        store_checksum: row.get(6)?,
        target_checksum: row.get(7)?,
        status: parse_conflict_status(&status),
        resolved_at: row.get(9)?,
    })
}

fn parse_conflict_status(s: &str) -> ConflictStatus {
    match s {
        "resolved_store" => ConflictStatus::ResolvedStore,
        "resolved_target" => ConflictStatus::ResolvedTarget,
        "resolved_manual" => ConflictStatus::ResolvedManual,
        "resolved_delete" => ConflictStatus::ResolvedDelete,
        "resolved_auto" => ConflictStatus::ResolvedAuto,
        _ => ConflictStatus::Pending,
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

impl Store {
    pub fn seed_default_patterns(&self, include: &[&str], ignore: &[&str]) -> Result<()> {
        self.with_conn(|conn| {
            for pattern in include {
                conn.execute(
                    "INSERT OR IGNORE INTO pattern_global (pattern, kind, enabled, source)
                     VALUES (?1, 'include', 1, 'default')",
                    params![pattern],
                )?;
            }
            for pattern in ignore {
                conn.execute(
                    "INSERT OR IGNORE INTO pattern_global (pattern, kind, enabled, source)
                     VALUES (?1, 'ignore', 1, 'default')",
                    params![pattern],
                )?;
            }
            Ok(())
        })
    }

    /// Effective pattern set for `target_id` and `kind`: local patterns
    /// first, then globals with the per-target `enabled` override applied
    /// (§4.2, §4.3).
    pub fn effective_patterns(
        &self,
        target_id: TargetId,
        kind: PatternKind,
    ) -> Result<Vec<PatternEntry>> {
        let kind_str = pattern_kind_str(kind);
        self.with_conn(|conn| {
            let mut out = Vec::new();

            let mut local_stmt = conn.prepare(
                "SELECT pattern, enabled FROM pattern_local
                 WHERE target_id = ?1 AND kind = ?2 ORDER BY pattern",
            )?;
            let locals = local_stmt.query_map(params![target_id, kind_str], |row| {
                Ok(PatternEntry {
                    pattern: row.get(0)?,
                    enabled: row.get::<_, i64>(1)? != 0,
                    source: PatternSource::Local,
                })
            })?;
            for entry in locals {
                out.push(entry?);
            }

            let mut global_stmt = conn.prepare(
                "SELECT g.pattern, g.source, COALESCE(o.enabled, g.enabled) AS effective_enabled
                 FROM pattern_global g
                 LEFT JOIN pattern_override o
                   ON o.target_id = ?1 AND o.pattern = g.pattern AND o.kind = g.kind
                 WHERE g.kind = ?2
                 ORDER BY g.pattern",
            )?;
            let globals = global_stmt.query_map(params![target_id, kind_str], |row| {
                let source: String = row.get(1)?;
                Ok(PatternEntry {
                    pattern: row.get(0)?,
                    enabled: row.get::<_, i64>(2)? != 0,
                    source: if source == "user" {
                        PatternSource::User
                    } else {
                        PatternSource::Default
                    },
                })
            })?;
            for entry in globals {
                out.push(entry?);
            }

            Ok(out)
        })
    }

    pub fn set_pattern_override(
        &self,
        target_id: TargetId,
        kind: PatternKind,
        pattern: &str,
        enabled: bool,
    ) -> Result<()> {
        let kind_str = pattern_kind_str(kind);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pattern_override (target_id, pattern, kind, enabled)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(target_id, pattern, kind) DO UPDATE SET enabled = excluded.enabled",
                params![target_id, pattern, kind_str, i64::from(enabled)],
            )?;
            Ok(())
        })
    }

    /// The raw global pattern set for `kind`, unadjusted by any per-target
    /// override (§4.10 export).
    pub fn list_global_patterns(&self, kind: PatternKind) -> Result<Vec<PatternEntry>> {
        let kind_str = pattern_kind_str(kind);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT pattern, source, enabled FROM pattern_global
                 WHERE kind = ?1 ORDER BY pattern",
            )?;
            let rows = stmt.query_map(params![kind_str], |row| {
                let source: String = row.get(1)?;
                Ok(PatternEntry {
                    pattern: row.get(0)?,
                    enabled: row.get::<_, i64>(2)? != 0,
                    source: if source == "user" {
                        PatternSource::User
                    } else {
                        PatternSource::Default
                    },
                })
            })?;
            rows.collect()
        })
    }

    /// Raw `pattern_override` rows for `target_id`, both kinds, unmerged
    /// with the global default (§4.10 export).
    pub fn list_overrides(&self, target_id: TargetId) -> Result<Vec<(PatternKind, String, bool)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT kind, pattern, enabled FROM pattern_override
                 WHERE target_id = ?1 ORDER BY kind, pattern",
            )?;
            let rows = stmt.query_map(params![target_id], |row| {
                let kind: String = row.get(0)?;
                let pattern: String = row.get(1)?;
                let enabled: i64 = row.get(2)?;
                Ok((kind, pattern, enabled != 0))
            })?;
            rows.map(|r| {
                r.map(|(kind, pattern, enabled)| {
                    let kind = if kind == "ignore" { PatternKind::Ignore } else { PatternKind::Include };
                    (kind, pattern, enabled)
                })
            })
            .collect()
        })
    }

    /// Raw `pattern_local` rows for `target_id`, both kinds (§4.10 export).
    pub fn list_local_patterns(&self, target_id: TargetId) -> Result<Vec<(PatternKind, String, bool)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT kind, pattern, enabled FROM pattern_local
                 WHERE target_id = ?1 ORDER BY kind, pattern",
            )?;
            let rows = stmt.query_map(params![target_id], |row| {
                let kind: String = row.get(0)?;
                let pattern: String = row.get(1)?;
                let enabled: i64 = row.get(2)?;
                Ok((kind, pattern, enabled != 0))
            })?;
            rows.map(|r| {
                r.map(|(kind, pattern, enabled)| {
                    let kind = if kind == "ignore" { PatternKind::Ignore } else { PatternKind::Include };
                    (kind, pattern, enabled)
                })
            })
            .collect()
        })
    }

    pub fn add_local_pattern(
        &self,
        target_id: TargetId,
        kind: PatternKind,
        pattern: &str,
        enabled: bool,
    ) -> Result<()> {
        let kind_str = pattern_kind_str(kind);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pattern_local (target_id, pattern, kind, enabled)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(target_id, pattern, kind) DO UPDATE SET enabled = excluded.enabled",
                params![target_id, pattern, kind_str, i64::from(enabled)],
            )?;
            Ok(())
        })
    }
}

fn pattern_kind_str(kind: PatternKind) -> &'static str {
    match kind {
        PatternKind::Include => "include",
        PatternKind::Ignore => "ignore",
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

impl Store {
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
    }

    /// Size-threshold lookup: safe default if absent, zero, negative, or
    /// non-numeric (§4.2).
    pub fn size_block_bytes(&self) -> Result<u64> {
        let raw = self.get_setting("size_block_bytes")?;
        Ok(raw
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .map_or(DEFAULT_SIZE_BLOCK_BYTES, |v| v as u64))
    }

    pub fn global_settings(&self) -> Result<GlobalSettings> {
        let mut settings = GlobalSettings::default();
        settings.size_block_bytes = self.size_block_bytes()?;
        if let Some(v) = self.get_setting("debounce_ms")?.and_then(|v| v.parse().ok()) {
            settings.debounce_ms = v;
        }
        if let Some(v) = self
            .get_setting("self_change_ttl_ms")?
            .and_then(|v| v.parse().ok())
        {
            settings.self_change_ttl_ms = v;
        }
        Ok(settings)
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

impl Store {
    pub fn append_log(&self, target_id: TargetId, kind: LogKind, detail: &str, at: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sync_log (at, target_id, kind, detail) VALUES (?1, ?2, ?3, ?4)",
                params![at, target_id, kind.as_str(), detail],
            )?;
            Ok(())
        })
    }

    pub fn recent_log(&self, target_id: TargetId, limit: u32) -> Result<Vec<LogEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, at, target_id, kind, detail FROM sync_log
                 WHERE target_id = ?1 ORDER BY at DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![target_id, limit], |row| {
                let kind: String = row.get(3)?;
                Ok(LogEntry {
                    id: row.get(0)?,
                    at: row.get(1)?,
                    target_id: row.get(2)?,
                    kind: parse_log_kind(&kind),
                    detail: row.get(4)?,
                })
            })?;
            rows.collect()
        })
    }
}

fn parse_log_kind(s: &str) -> LogKind {
    match s {
        "conflict_opened" => LogKind::ConflictOpened,
        "conflict_resolved" => LogKind::ConflictResolved,
        "sync_blocked" => LogKind::SyncBlocked,
        "error" => LogKind::Error,
        _ => LogKind::AutoMerged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::target::{TargetKind, TargetStatus};

    fn sample_target() -> SyncTarget {
        SyncTarget {
            id: 0,
            kind: TargetKind::Repo,
            display_name: "App".into(),
            local_path: "/home/dev/app".into(),
            store_path: "repos/app".into(),
            status: TargetStatus::Active,
            is_favourite: false,
            service_type: None,
            icon: None,
        }
    }

    #[test]
    fn insert_and_get_target() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_target(&sample_target()).unwrap();
        let fetched = store.get_target(id).unwrap().unwrap();
        assert_eq!(fetched.store_path, "repos/app");
    }

    #[test]
    fn size_block_bytes_default_when_absent() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.size_block_bytes().unwrap(), DEFAULT_SIZE_BLOCK_BYTES);
    }

    #[test]
    fn size_block_bytes_default_when_non_numeric() {
        let store = Store::open_in_memory().unwrap();
        store.set_setting("size_block_bytes", "not-a-number").unwrap();
        assert_eq!(store.size_block_bytes().unwrap(), DEFAULT_SIZE_BLOCK_BYTES);
    }

    #[test]
    fn size_block_bytes_default_when_negative_or_zero() {
        let store = Store::open_in_memory().unwrap();
        store.set_setting("size_block_bytes", "-5").unwrap();
        assert_eq!(store.size_block_bytes().unwrap(), DEFAULT_SIZE_BLOCK_BYTES);
        store.set_setting("size_block_bytes", "0").unwrap();
        assert_eq!(store.size_block_bytes().unwrap(), DEFAULT_SIZE_BLOCK_BYTES);
    }

    #[test]
    fn size_block_bytes_respects_configured_value() {
        let store = Store::open_in_memory().unwrap();
        store.set_setting("size_block_bytes", "1024").unwrap();
        assert_eq!(store.size_block_bytes().unwrap(), 1024);
    }

    #[test]
    fn at_most_one_pending_conflict_per_tracked_file() {
        let store = Store::open_in_memory().unwrap();
        let target_id = store.insert_target(&sample_target()).unwrap();
        let file = TrackedFile {
            id: 0,
            target_id,
            relative_path: "AGENTS.md".into(),
            kind: FileKind::File,
            store_checksum: Some("a".into()),
            target_checksum: Some("b".into()),
            store_mtime: None,
            target_mtime: None,
            sync_status: SyncStatus::Conflict,
            last_synced_at: None,
            last_error: None,
        };
        let file_id = store.upsert_tracked_file(&file).unwrap();

        let c1 = store
            .open_or_update_conflict(
                file_id,
                Some(b"store v1"),
                Some(b"target v1"),
                None,
                None,
                Some("a"),
                Some("b"),
                SyncStatus::Conflict,
            )
            .unwrap();
        let c2 = store
            .open_or_update_conflict(
                file_id,
                Some(b"store v2"),
                Some(b"target v2"),
                None,
                None,
                Some("a2"),
                Some("b2"),
                SyncStatus::Conflict,
            )
            .unwrap();
        assert_eq!(c1, c2, "re-detection must update the existing row");

        let pending = store.list_pending_conflicts(target_id).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].store_content, Some(b"store v2".to_vec()));
    }

    #[test]
    fn effective_patterns_local_first_then_global_with_override() {
        let store = Store::open_in_memory().unwrap();
        let target_id = store.insert_target(&sample_target()).unwrap();
        store
            .seed_default_patterns(&["**/*.md"], &["**/node_modules/**"])
            .unwrap();
        store
            .add_local_pattern(target_id, PatternKind::Include, "**/only-here.md", true)
            .unwrap();
        store
            .set_pattern_override(target_id, PatternKind::Include, "**/*.md", false)
            .unwrap();

        let entries = store
            .effective_patterns(target_id, PatternKind::Include)
            .unwrap();
        assert_eq!(entries[0].pattern, "**/only-here.md");
        assert_eq!(entries[0].source, PatternSource::Local);
        assert_eq!(entries[1].pattern, "**/*.md");
        assert!(!entries[1].enabled);
        assert_eq!(entries[1].source, PatternSource::Default);
    }
}
