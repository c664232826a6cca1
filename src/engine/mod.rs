//! Sync engine (§4.8) — the heart of the system. Reconciles one
//! `(TrackedFile, Target)` at a time; the only writer of tracked_file and
//! conflict rows.

mod events;
mod reconcile;

pub use events::SyncEvent;
pub use reconcile::ReconcileStats;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::Result;
use crate::git_adapter::GitAdapter;
use crate::model::pattern::PatternKind;
use crate::model::target::{SyncTarget, TargetKind};
use crate::patterns;
use crate::scanner;
use crate::store::Store;
use crate::watcher::SelfChangeTable;

/// Latch suspending watcher-triggered reconciliation while a pull is being
/// consumed (§4.8, §5, §9). Process-wide, owned by the engine value rather
/// than an ambient singleton.
#[derive(Default)]
pub struct PullModeLatch(AtomicBool);

impl PullModeLatch {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn enter(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn leave(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SyncEngine {
    store: Store,
    git: GitAdapter,
    store_root: PathBuf,
    self_change: SelfChangeTable,
    pull_latch: PullModeLatch,
}

impl SyncEngine {
    pub fn new(store: Store, git: GitAdapter, store_root: PathBuf) -> Result<Self> {
        let settings = store.global_settings()?;
        Ok(Self {
            store,
            git,
            store_root,
            self_change: SelfChangeTable::new(Duration::from_millis(settings.self_change_ttl_ms)),
            pull_latch: PullModeLatch::default(),
        })
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub fn self_change_table(&self) -> SelfChangeTable {
        self.self_change.clone()
    }

    pub fn enter_pull_mode(&self) {
        self.pull_latch.enter();
    }

    pub fn leave_pull_mode(&self) {
        self.pull_latch.leave();
    }

    fn store_subtree(&self, target: &SyncTarget) -> PathBuf {
        self.store_root.join(&target.store_path)
    }

    /// Register a new target: for a `repo`-kind target whose store subtree
    /// doesn't exist yet, materialise `repos/_default/` into it first (§11)
    /// so the first reconciliation pass sees a template rather than an
    /// empty directory. Then insert the row and run the initial sync pass.
    pub fn register_target(&self, target: &SyncTarget) -> Result<SyncTarget> {
        let subtree = self.store_subtree(target);
        if target.kind == TargetKind::Repo && !subtree.exists() {
            let default_template = self.store_root.join("repos").join("_default");
            if default_template.is_dir() {
                copy_dir_all(&default_template, &subtree)?;
            }
        }

        let id = self.store.insert_target(target)?;
        let inserted = self
            .store
            .get_target(id)?
            .expect("just-inserted target must exist");
        self.sync_target(&inserted)?;
        Ok(inserted)
    }

    /// Run one reconciliation pass over `target`: scan its tree, reconcile
    /// every path that is tracked or newly matched, flush the commit
    /// queue, and return the events to broadcast plus aggregate stats.
    pub fn sync_target(&self, target: &SyncTarget) -> Result<(Vec<SyncEvent>, ReconcileStats)> {
        if self.pull_latch.is_active() {
            return Ok((Vec::new(), ReconcileStats::default()));
        }

        let store_subtree = self.store_subtree(target);
        let limit = self.store.size_block_bytes()?;
        let total_size = dir_size(&store_subtree)?;
        if total_size > limit {
            let reason = format!(
                "store subtree for '{}' is {total_size} bytes, exceeding the {limit}-byte limit",
                target.store_path
            );
            return Ok((
                vec![SyncEvent::SyncBlocked {
                    target_id: target.id,
                    reason,
                    total_size,
                }],
                ReconcileStats::default(),
            ));
        }

        let include = patterns::effective_patterns(&self.store, target.id, PatternKind::Include)?;
        let ignore_raw = patterns::effective_patterns(&self.store, target.id, PatternKind::Ignore)?;
        let ignore = patterns::expand_ignore_patterns(&ignore_raw);
        let include_set = patterns::build_matcher(&include)?;
        let ignore_set = patterns::build_matcher(&ignore)?;

        // Union of both trees: a path can be newly introduced on either side
        // (a fresh file dropped in the target, or one materialised into the
        // store by a template, a pull, or another machine's sync pass) and
        // must be discovered regardless of which side saw it first.
        let target_scanned = scanner::scan(&target.local_path, &include_set, &ignore_set)?;
        let store_scanned = scanner::scan(&store_subtree, &include_set, &ignore_set)?;
        let mut paths: Vec<String> = target_scanned
            .iter()
            .chain(store_scanned.iter())
            .map(|e| e.relative_path.clone())
            .collect();
        for tracked in self.store.list_tracked_files(target.id)? {
            paths.push(tracked.relative_path);
        }
        paths.sort();
        paths.dedup();

        let mut events = Vec::new();
        let mut stats = ReconcileStats::default();
        for relative_path in paths {
            reconcile::reconcile_one(self, target, &relative_path, &mut events, &mut stats)?;
        }

        self.git.queue_commit(&format!("sync {}", target.store_path));
        self.git.flush_commit()?;
        events.push(SyncEvent::SyncComplete {
            target_id: target.id,
            stats: stats.clone(),
        });
        Ok((events, stats))
    }

    /// Resolve a pending conflict (the consumer-API "resolve conflicts"
    /// operation, §6).
    pub fn resolve_conflict(
        &self,
        conflict_id: crate::model::conflict::ConflictId,
        resolution: &crate::model::conflict::ConflictResolution,
        target: &SyncTarget,
        now: i64,
    ) -> Result<SyncEvent> {
        reconcile::resolve_conflict(self, conflict_id, resolution, target, now)
    }

    /// Read a store-side file's contents directly (the consumer-API
    /// "read store-side file contents" operation, §6).
    pub fn read_store_file(&self, target: &SyncTarget, relative_path: &str) -> Result<Vec<u8>> {
        let path = self.safe_store_path(target, relative_path)?;
        Ok(std::fs::read(path)?)
    }

    /// Write a store-side file's contents directly (the consumer-API
    /// "write store-side file contents" operation, §6); the next sync
    /// pass reconciles the result against the target.
    pub fn write_store_file(&self, target: &SyncTarget, relative_path: &str, contents: &[u8]) -> Result<()> {
        let path = self.safe_store_path(target, relative_path)?;
        self.write_guarded(&path, contents)
    }

    /// Enter pull mode, pull the store's remote, then leave pull mode
    /// (§4.5, §4.8 "Pull mode", §6). The watcher-triggered sync passes that
    /// would otherwise race the pull are suspended for its duration.
    pub fn pull_store(&self) -> Result<crate::git_adapter::PullOutcome> {
        self.enter_pull_mode();
        let result = self.git.pull();
        self.leave_pull_mode();
        result
    }

    /// Push the store's current branch to its configured remote (§4.5, §6).
    pub fn push_store(&self) -> Result<()> {
        self.git.push()
    }

    fn safe_store_path(&self, target: &SyncTarget, relative_path: &str) -> Result<PathBuf> {
        crate::path_safety::safe_join(&self.store_subtree(target), &[relative_path])
    }

    fn safe_target_path(&self, target: &SyncTarget, relative_path: &str) -> Result<PathBuf> {
        crate::path_safety::safe_join(&target.local_path, &[relative_path])
    }

    fn write_guarded(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.self_change.record(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn delete_guarded(&self, path: &Path) -> Result<()> {
        self.self_change.record(path);
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let dst_path = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &dst_path)?;
        } else {
            std::fs::copy(entry.path(), &dst_path)?;
        }
    }
    Ok(())
}

fn dir_size(path: &Path) -> Result<u64> {
    let mut total = 0u64;
    let read_dir = match std::fs::read_dir(path) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    for entry in read_dir {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}
