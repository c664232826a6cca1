//! Consumer API surface (§6) — the operations an external layer (CLI,
//! dashboard, tray app) needs from the engine. Abstract: this is a plain
//! in-process facade, not a transport. A future RPC/IPC server would sit
//! in front of [`SyncApi`], not replace it.

use crate::engine::{SyncEngine, SyncEvent};
use crate::error::Result;
use crate::git_adapter::{HeadToken, PullOutcome};
use crate::model::conflict::{Conflict, ConflictId, ConflictResolution};
use crate::model::settings::GlobalSettings;
use crate::model::target::{SyncTarget, TargetId, TargetKind, TargetStatus};
use crate::model::log::LogEntry;
use crate::model::tracked_file::TrackedFile;

/// One row of the "list targets" view (§6): enough to render a summary
/// without fetching every tracked file.
#[derive(Clone, Debug)]
pub struct TargetSummary {
    pub target: SyncTarget,
    pub tracked_file_count: usize,
    pub pending_conflict_count: usize,
}

/// A single target plus the tracked files under it (§6's "get one target").
#[derive(Clone, Debug)]
pub struct TargetDetail {
    pub target: SyncTarget,
    pub tracked_files: Vec<TrackedFile>,
}

pub struct SyncApi {
    engine: SyncEngine,
}

impl SyncApi {
    #[must_use]
    pub const fn new(engine: SyncEngine) -> Self {
        Self { engine }
    }

    #[must_use]
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn list_targets(&self) -> Result<Vec<TargetSummary>> {
        self.engine
            .store()
            .list_targets()?
            .into_iter()
            .map(|target| {
                let tracked_file_count = self.engine.store().list_tracked_files(target.id)?.len();
                let pending_conflict_count =
                    self.engine.store().list_pending_conflicts(target.id)?.len();
                Ok(TargetSummary {
                    target,
                    tracked_file_count,
                    pending_conflict_count,
                })
            })
            .collect()
    }

    pub fn get_target(&self, id: TargetId) -> Result<Option<TargetDetail>> {
        let Some(target) = self.engine.store().get_target(id)? else {
            return Ok(None);
        };
        let tracked_files = self.engine.store().list_tracked_files(id)?;
        Ok(Some(TargetDetail { target, tracked_files }))
    }

    pub fn register_target(
        &self,
        kind: TargetKind,
        display_name: &str,
        local_path: std::path::PathBuf,
        store_path: String,
    ) -> Result<SyncTarget> {
        let target = SyncTarget {
            id: 0,
            kind,
            display_name: display_name.to_owned(),
            local_path,
            store_path,
            status: TargetStatus::Active,
            is_favourite: false,
            service_type: None,
            icon: None,
        };
        self.engine.register_target(&target)
    }

    pub fn unregister_target(&self, id: TargetId) -> Result<()> {
        self.engine.store().delete_target(id)
    }

    pub fn pause_target(&self, id: TargetId) -> Result<()> {
        self.engine.store().update_target_status(id, TargetStatus::Paused)
    }

    pub fn resume_target(&self, id: TargetId) -> Result<()> {
        self.engine.store().update_target_status(id, TargetStatus::Active)
    }

    /// Trigger a rescan / forced sync of one target (§6).
    pub fn sync_target(&self, target: &SyncTarget) -> Result<(Vec<SyncEvent>, crate::engine::ReconcileStats)> {
        self.engine.sync_target(target)
    }

    pub fn list_conflicts(&self, target_id: TargetId) -> Result<Vec<Conflict>> {
        self.engine.store().list_pending_conflicts(target_id)
    }

    /// Read-only view of a target's audit trail (SPEC_FULL §11).
    pub fn recent_log(&self, target_id: TargetId, limit: u32) -> Result<Vec<LogEntry>> {
        self.engine.store().recent_log(target_id, limit)
    }

    pub fn resolve_conflict(
        &self,
        conflict_id: ConflictId,
        resolution: &ConflictResolution,
        target: &SyncTarget,
        now: i64,
    ) -> Result<SyncEvent> {
        self.engine.resolve_conflict(conflict_id, resolution, target, now)
    }

    /// Resolve every pending conflict under `target` the same way (§6's
    /// "bulk variant scoped to a single target").
    pub fn resolve_all_conflicts(
        &self,
        target: &SyncTarget,
        resolution: &ConflictResolution,
        now: i64,
    ) -> Result<Vec<SyncEvent>> {
        self.engine
            .store()
            .list_pending_conflicts(target.id)?
            .into_iter()
            .map(|conflict| self.engine.resolve_conflict(conflict.id, resolution, target, now))
            .collect()
    }

    pub fn read_store_file(&self, target: &SyncTarget, relative_path: &str) -> Result<Vec<u8>> {
        self.engine.read_store_file(target, relative_path)
    }

    pub fn write_store_file(&self, target: &SyncTarget, relative_path: &str, contents: &[u8]) -> Result<()> {
        self.engine.write_store_file(target, relative_path, contents)
    }

    pub fn global_settings(&self) -> Result<GlobalSettings> {
        self.engine.store().global_settings()
    }

    pub fn set_global_setting(&self, key: &str, value: &str) -> Result<()> {
        self.engine.store().set_setting(key, value)
    }

    /// Enter pull mode, pull the remote, leave pull mode; returns the
    /// pre-pull HEAD token the caller can diff against post-pull (§6).
    pub fn pull(&self) -> Result<PullOutcome> {
        self.engine.pull_store()
    }

    pub fn push(&self) -> Result<()> {
        self.engine.push_store()
    }

    #[must_use]
    pub fn pre_pull_head(outcome: &PullOutcome) -> &HeadToken {
        &outcome.pre_pull_head
    }
}
