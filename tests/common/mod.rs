//! Shared fixtures for integration tests: a real `git`-backed store plus a
//! plain target directory, wired through the public `SyncEngine` surface.

use std::path::PathBuf;

use tempfile::TempDir;

use syncd::engine::SyncEngine;
use syncd::git_adapter::GitAdapter;
use syncd::model::target::{SyncTarget, TargetKind, TargetStatus};
use syncd::store::Store;

pub struct Harness {
    pub store_dir: TempDir,
    pub target_dir: TempDir,
    pub engine: SyncEngine,
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        let store_dir = tempfile::tempdir().unwrap();
        let target_dir = tempfile::tempdir().unwrap();
        let git = GitAdapter::init(store_dir.path()).unwrap();
        let store = Store::open_in_memory().unwrap();
        store.seed_default_patterns(&["**/*"], &[]).unwrap();
        let engine = SyncEngine::new(store, git, store_dir.path().to_path_buf()).unwrap();
        Self {
            store_dir,
            target_dir,
            engine,
        }
    }

    /// Register a fresh `repo`-kind target rooted at `target_dir` and run
    /// its first reconciliation pass.
    pub fn register_repo(&self, slug: &str) -> SyncTarget {
        let target = SyncTarget {
            id: 0,
            kind: TargetKind::Repo,
            display_name: slug.to_owned(),
            local_path: self.target_dir.path().to_path_buf(),
            store_path: format!("repos/{slug}"),
            status: TargetStatus::Active,
            is_favourite: false,
            service_type: None,
            icon: None,
        };
        self.engine.register_target(&target).unwrap()
    }

    pub fn store_path(&self, target: &SyncTarget, relative: &str) -> PathBuf {
        self.store_dir.path().join(&target.store_path).join(relative)
    }

    pub fn target_path(&self, relative: &str) -> PathBuf {
        self.target_dir.path().join(relative)
    }

    pub fn write_store(&self, target: &SyncTarget, relative: &str, content: &str) {
        let path = self.store_path(target, relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn write_target(&self, relative: &str, content: &str) {
        let path = self.target_path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn remove_store(&self, target: &SyncTarget, relative: &str) {
        let _ = std::fs::remove_file(self.store_path(target, relative));
    }

    pub fn remove_target(&self, relative: &str) {
        let _ = std::fs::remove_file(self.target_path(relative));
    }

    pub fn read_store(&self, target: &SyncTarget, relative: &str) -> String {
        std::fs::read_to_string(self.store_path(target, relative)).unwrap()
    }

    pub fn read_target(&self, relative: &str) -> String {
        std::fs::read_to_string(self.target_path(relative)).unwrap()
    }

    /// Run one reconciliation pass over `target`.
    pub fn sync(&self, target: &SyncTarget) {
        self.engine.sync_target(target).unwrap();
    }
}
