//! Per-file reconciliation decision procedure (§4.8).

use std::path::Path;

use crate::checksum::{content_checksum, symlink_checksum};
use crate::error::Result;
use crate::model::conflict::{ConflictId, ConflictResolution, ConflictStatus};
use crate::model::log::LogKind;
use crate::model::target::SyncTarget;
use crate::model::tracked_file::{FileKind, SyncStatus, TrackedFile};
use crate::path_safety::validate_symlink_target;

use super::events::SyncEvent;
use super::SyncEngine;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub synced: u32,
    pub conflicts: u32,
    pub errors: u32,
}

/// Snapshot of one side of a tracked file as read from disk.
enum Side {
    Absent,
    File(Vec<u8>),
    Symlink(String),
}

fn read_side(path: &Path) -> Result<Side> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let target = std::fs::read_link(path)?;
            Ok(Side::Symlink(target.to_string_lossy().into_owned()))
        }
        Ok(_) => Ok(Side::File(std::fs::read(path)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Side::Absent),
        Err(e) => Err(e.into()),
    }
}

impl Side {
    fn checksum(&self) -> Option<String> {
        match self {
            Self::Absent => None,
            Self::File(bytes) => Some(content_checksum(bytes)),
            Self::Symlink(target) => Some(symlink_checksum(target)),
        }
    }

    fn bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Absent => None,
            Self::File(bytes) => Some(bytes.clone()),
            Self::Symlink(target) => Some(target.clone().into_bytes()),
        }
    }

    const fn kind(&self) -> FileKind {
        match self {
            Self::Symlink(_) => FileKind::Symlink,
            Self::File(_) | Self::Absent => FileKind::File,
        }
    }
}

pub fn reconcile_one(
    engine: &SyncEngine,
    target: &SyncTarget,
    relative_path: &str,
    events: &mut Vec<SyncEvent>,
    stats: &mut ReconcileStats,
) -> Result<()> {
    let store_path = engine.safe_store_path(target, relative_path)?;
    let target_path = engine.safe_target_path(target, relative_path)?;

    if let Side::Symlink(dest) = read_side(&target_path)? {
        validate_symlink_target(&target_path, &dest)?;
    }

    let store_side = read_side(&store_path)?;
    let target_side = read_side(&target_path)?;

    let existing = engine
        .store()
        .get_tracked_file(target.id, relative_path)?;

    match run_decision(engine, target, relative_path, &store_side, &target_side, existing.as_ref()) {
        Ok(outcome) => apply_outcome(engine, target, relative_path, existing, outcome, events, stats),
        Err(e) => {
            stats.errors += 1;
            mark_error(engine, target, relative_path, existing, &e.to_string())?;
            Ok(())
        }
    }
}

enum Outcome {
    /// Fast path / merge-resolved / copy resolved: both sides now equal.
    Synced {
        checksum: Option<String>,
        kind: FileKind,
        auto_merged: bool,
        /// Set only for the three-way-merge outcome (§4.8 step 5e): the
        /// merged bytes exist nowhere on disk yet, so the caller must write
        /// them directly rather than copy from whichever side already holds
        /// the winning checksum.
        merged_content: Option<Vec<u8>>,
    },
    /// Both sides absent; previously synced — delete the record.
    Removed,
    /// One side missing, history exists — open/update a conflict and mark missing.
    Missing {
        status: SyncStatus,
        present_checksum: Option<String>,
        kind: FileKind,
    },
    /// Both sides differ with no resolvable base — conflict.
    Conflict {
        base: Option<Vec<u8>>,
        store_bytes: Option<Vec<u8>>,
        target_bytes: Option<Vec<u8>>,
        merged: Option<Vec<u8>>,
        store_checksum: Option<String>,
        target_checksum: Option<String>,
    },
}

#[allow(clippy::too_many_lines)]
fn run_decision(
    engine: &SyncEngine,
    target: &SyncTarget,
    relative_path: &str,
    store_side: &Side,
    target_side: &Side,
    existing: Option<&TrackedFile>,
) -> Result<Outcome> {
    // Step 1: fast path — both exist and bytes equal.
    if let (Some(s), Some(t)) = (store_side.checksum(), target_side.checksum()) {
        if s == t {
            return Ok(Outcome::Synced {
                checksum: Some(s),
                kind: store_side.kind(),
                auto_merged: false,
                merged_content: None,
            });
        }
    }

    let has_history = existing.is_some_and(TrackedFile::has_sync_history);

    match (matches!(store_side, Side::Absent), matches!(target_side, Side::Absent)) {
        // Step 2: both absent, previously synced.
        (true, true) if has_history => Ok(Outcome::Removed),
        (true, true) => Ok(Outcome::Removed),

        // Step 3: exactly one side missing, previously synced — open conflict.
        (true, false) if has_history => Ok(Outcome::Missing {
            status: SyncStatus::MissingInStore,
            present_checksum: target_side.checksum(),
            kind: target_side.kind(),
        }),
        (false, true) if has_history => Ok(Outcome::Missing {
            status: SyncStatus::MissingInTarget,
            present_checksum: store_side.checksum(),
            kind: store_side.kind(),
        }),

        // Step 4: exactly one side, no prior history — adopt it.
        (true, false) => Ok(Outcome::Synced {
            checksum: target_side.checksum(),
            kind: target_side.kind(),
            auto_merged: false,
            merged_content: None,
        }),
        (false, true) => Ok(Outcome::Synced {
            checksum: store_side.checksum(),
            kind: store_side.kind(),
            auto_merged: false,
            merged_content: None,
        }),

        // Step 5: both sides exist but differ.
        (false, false) => resolve_both_present(engine, target, relative_path, store_side, target_side),
    }
}

fn resolve_both_present(
    engine: &SyncEngine,
    target: &SyncTarget,
    relative_path: &str,
    store_side: &Side,
    target_side: &Side,
) -> Result<Outcome> {
    let store_bytes = store_side.bytes().unwrap_or_default();
    let target_bytes = target_side.bytes().unwrap_or_default();

    let base = engine.git.committed_content(&format!(
        "{}/{relative_path}",
        target.store_path
    ))?;

    match &base {
        // (b) no base: store wins (onboarding-template fallback, §4.8.5b).
        None => Ok(Outcome::Synced {
            checksum: store_side.checksum(),
            kind: store_side.kind(),
            auto_merged: false,
            merged_content: None,
        }),
        Some(base_bytes) if base_bytes == &target_bytes => Ok(Outcome::Synced {
            checksum: store_side.checksum(),
            kind: store_side.kind(),
            auto_merged: false,
            merged_content: None,
        }),
        Some(base_bytes) if base_bytes == &store_bytes => Ok(Outcome::Synced {
            checksum: target_side.checksum(),
            kind: target_side.kind(),
            auto_merged: false,
            merged_content: None,
        }),
        Some(base_bytes) => {
            let merge = engine.git.three_way_merge(base_bytes, &target_bytes, &store_bytes)?;
            if merge.has_conflicts {
                Ok(Outcome::Conflict {
                    base: Some(base_bytes.clone()),
                    store_bytes: Some(store_bytes),
                    target_bytes: Some(target_bytes),
                    merged: Some(merge.content),
                    store_checksum: store_side.checksum(),
                    target_checksum: target_side.checksum(),
                })
            } else {
                let checksum = Some(content_checksum(&merge.content));
                Ok(Outcome::Synced {
                    checksum,
                    kind: FileKind::File,
                    auto_merged: true,
                    merged_content: Some(merge.content),
                })
            }
        }
    }
}

fn apply_outcome(
    engine: &SyncEngine,
    target: &SyncTarget,
    relative_path: &str,
    existing: Option<TrackedFile>,
    outcome: Outcome,
    events: &mut Vec<SyncEvent>,
    stats: &mut ReconcileStats,
) -> Result<()> {
    let store_path = engine.safe_store_path(target, relative_path)?;
    let target_path = engine.safe_target_path(target, relative_path)?;
    let now = now_unix();

    match outcome {
        Outcome::Synced { checksum, kind, auto_merged, merged_content } => {
            let record = TrackedFile {
                id: existing.as_ref().map_or(0, |f| f.id),
                target_id: target.id,
                relative_path: relative_path.to_owned(),
                kind,
                store_checksum: checksum.clone(),
                target_checksum: checksum,
                store_mtime: None,
                target_mtime: None,
                sync_status: SyncStatus::Synced,
                last_synced_at: Some(now),
                last_error: None,
            };
            let file_id = engine.store().upsert_tracked_file(&record)?;

            if let Some(pending) = engine.store().pending_conflict_for(file_id)? {
                engine
                    .store()
                    .resolve_conflict(pending.id, ConflictStatus::ResolvedAuto, now)?;
                events.push(SyncEvent::ConflictResolved { conflict_id: pending.id });
            }

            if auto_merged {
                if let Some(bytes) = &merged_content {
                    engine.write_guarded(&store_path, bytes)?;
                    engine.write_guarded(&target_path, bytes)?;
                }
                engine.store().append_log(
                    target.id,
                    LogKind::AutoMerged,
                    &format!("auto-merged {relative_path}"),
                    now,
                )?;
            }

            stats.synced += 1;
            events.push(SyncEvent::SyncStatus {
                target_id: target.id,
                file_id,
                status: SyncStatus::Synced,
            });
        }

        Outcome::Removed => {
            if let Some(existing) = existing {
                engine.store().delete_tracked_file(existing.id)?;
                events.push(SyncEvent::FilesChanged { target_id: target.id });
            }
        }

        Outcome::Missing { status, present_checksum, kind } => {
            let record = TrackedFile {
                id: existing.as_ref().map_or(0, |f| f.id),
                target_id: target.id,
                relative_path: relative_path.to_owned(),
                kind,
                store_checksum: if status == SyncStatus::MissingInStore {
                    None
                } else {
                    present_checksum.clone()
                },
                target_checksum: if status == SyncStatus::MissingInTarget {
                    None
                } else {
                    present_checksum.clone()
                },
                store_mtime: None,
                target_mtime: None,
                sync_status: status,
                last_synced_at: existing.as_ref().and_then(|f| f.last_synced_at),
                last_error: None,
            };
            let file_id = engine.store().upsert_tracked_file(&record)?;

            let present_bytes = if status == SyncStatus::MissingInStore {
                std::fs::read(&target_path).ok()
            } else {
                std::fs::read(&store_path).ok()
            };
            let store_content = if status == SyncStatus::MissingInStore { None } else { present_bytes.clone() };
            let target_content = if status == SyncStatus::MissingInStore { present_bytes } else { None };
            let conflict_id = engine.store().open_or_update_conflict(
                file_id,
                store_content.as_deref(),
                target_content.as_deref(),
                None,
                None,
                record.store_checksum.as_deref(),
                record.target_checksum.as_deref(),
                status,
            )?;
            stats.conflicts += 1;
            engine.store().append_log(
                target.id,
                LogKind::ConflictOpened,
                &format!("{relative_path} went missing on one side"),
                now,
            )?;
            events.push(SyncEvent::ConflictUpdated {
                conflict_id,
                file_id,
                target_id: target.id,
            });
        }

        Outcome::Conflict {
            base,
            store_bytes,
            target_bytes,
            merged,
            store_checksum,
            target_checksum,
        } => {
            let record = TrackedFile {
                id: existing.as_ref().map_or(0, |f| f.id),
                target_id: target.id,
                relative_path: relative_path.to_owned(),
                kind: FileKind::File,
                store_checksum: store_checksum.clone(),
                target_checksum: target_checksum.clone(),
                store_mtime: None,
                target_mtime: None,
                sync_status: SyncStatus::Conflict,
                last_synced_at: existing.as_ref().and_then(|f| f.last_synced_at),
                last_error: None,
            };
            let file_id = engine.store().upsert_tracked_file(&record)?;
            let conflict_id = engine.store().open_or_update_conflict(
                file_id,
                store_bytes.as_deref(),
                target_bytes.as_deref(),
                base.as_deref(),
                merged.as_deref(),
                store_checksum.as_deref(),
                target_checksum.as_deref(),
                SyncStatus::Conflict,
            )?;
            stats.conflicts += 1;
            engine.store().append_log(
                target.id,
                LogKind::ConflictOpened,
                &format!("overlapping edits on {relative_path}"),
                now,
            )?;
            events.push(SyncEvent::ConflictUpdated {
                conflict_id,
                file_id,
                target_id: target.id,
            });
        }
    }

    // Materialise the resolved content onto disk, guarded by self-change
    // suppression, when the outcome requires a write.
    if let Some(file) = engine.store().get_tracked_file(target.id, relative_path)? {
        if file.sync_status == SyncStatus::Synced {
            if let Some(checksum) = &file.store_checksum {
                materialise(engine, &store_path, &target_path, checksum)?;
            }
        }
    }

    Ok(())
}

/// Copy whichever side currently holds the checksum that won onto the side
/// that doesn't — idempotent if both already match.
fn materialise(engine: &SyncEngine, store_path: &Path, target_path: &Path, checksum: &str) -> Result<()> {
    let store_side = read_side(store_path)?;
    let target_side = read_side(target_path)?;

    match (store_side.checksum(), target_side.checksum()) {
        (Some(s), Some(t)) if s == t => Ok(()),
        (Some(s), _) if s == checksum => {
            if let Some(bytes) = store_side.bytes() {
                engine.write_guarded(target_path, &bytes)?;
            }
            Ok(())
        }
        (_, Some(t)) if t == checksum => {
            if let Some(bytes) = target_side.bytes() {
                engine.write_guarded(store_path, &bytes)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn mark_error(
    engine: &SyncEngine,
    target: &SyncTarget,
    relative_path: &str,
    existing: Option<TrackedFile>,
    detail: &str,
) -> Result<()> {
    let now = now_unix();
    if let Some(mut file) = existing {
        file.sync_status = SyncStatus::Error;
        file.last_error = Some(detail.to_owned());
        engine.store().upsert_tracked_file(&file)?;
    }
    engine
        .store()
        .append_log(target.id, LogKind::Error, detail, now)?;
    Ok(())
}

pub fn resolve_conflict(
    engine: &SyncEngine,
    conflict_id: ConflictId,
    resolution: &ConflictResolution,
    target: &SyncTarget,
    now: i64,
) -> Result<SyncEvent> {
    let conflict = engine
        .store()
        .get_conflict(conflict_id)?
        .ok_or(crate::error::SyncError::NotFound {
            kind: "conflict",
            id: conflict_id.to_string(),
        })?;
    let file = engine
        .store()
        .get_tracked_file_by_id(conflict.tracked_file_id)?
        .ok_or(crate::error::SyncError::NotFound {
            kind: "tracked_file",
            id: conflict.tracked_file_id.to_string(),
        })?;

    let store_path = engine.safe_store_path(target, &file.relative_path)?;
    let target_path = engine.safe_target_path(target, &file.relative_path)?;

    match resolution {
        ConflictResolution::KeepStore => {
            if let Some(bytes) = &conflict.store_content {
                engine.write_guarded(&target_path, bytes)?;
            }
        }
        ConflictResolution::KeepTarget => {
            if let Some(bytes) = &conflict.target_content {
                engine.write_guarded(&store_path, bytes)?;
            }
        }
        ConflictResolution::Manual(bytes) => {
            engine.write_guarded(&store_path, bytes)?;
            engine.write_guarded(&target_path, bytes)?;
        }
        ConflictResolution::Delete => {
            engine.delete_guarded(&store_path)?;
            engine.delete_guarded(&target_path)?;
        }
    }

    engine.store().resolve_conflict(conflict_id, resolution.status(), now)?;

    let mut updated = file;
    updated.sync_status = SyncStatus::Synced;
    updated.last_synced_at = Some(now);
    engine.store().upsert_tracked_file(&updated)?;

    engine.store().append_log(
        target.id,
        LogKind::ConflictResolved,
        &format!("conflict {conflict_id} resolved as {:?}", resolution.status()),
        now,
    )?;

    Ok(SyncEvent::ConflictResolved { conflict_id })
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
