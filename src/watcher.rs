//! Filesystem watcher (§4.7) — debounced, recursive watch of store and
//! target trees, with self-change suppression shared across all watchers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use notify::RecursiveMode;
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};

use crate::error::Result;
use crate::model::target::TargetId;

/// Which side of a target an event originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Store,
    Target,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Modify,
    Delete,
    Rename,
}

/// A debounced filesystem change event delivered to the engine (§4.7).
#[derive(Clone, Debug)]
pub struct WatchEvent {
    pub target_id: TargetId,
    pub side: Side,
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Shared self-change suppression table (§4.7, §5, §9): a process-wide map
/// of paths the engine itself is about to write, with a short TTL. Watcher
/// events for a suppressed path are dropped while the record is fresh.
#[derive(Clone)]
pub struct SelfChangeTable {
    inner: Arc<Mutex<HashMap<PathBuf, Instant>>>,
    ttl: Duration,
}

impl SelfChangeTable {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Record that the engine is about to write `path`. Call this before
    /// issuing the write (§5 locking discipline).
    pub fn record(&self, path: &Path) {
        let mut map = self.inner.lock().expect("self-change table poisoned");
        map.insert(path.to_path_buf(), Instant::now());
    }

    /// Whether `path` has a fresh self-change record. Expired entries are
    /// purged lazily on lookup.
    pub fn is_suppressed(&self, path: &Path) -> bool {
        let mut map = self.inner.lock().expect("self-change table poisoned");
        match map.get(path) {
            Some(at) if at.elapsed() < self.ttl => true,
            Some(_) => {
                map.remove(path);
                false
            }
            None => false,
        }
    }
}

/// A recursive, debounced watch over one target's root directory.
pub struct TargetWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher, RecommendedCache>,
}

impl TargetWatcher {
    /// Start watching `root` for `target_id`/`side`, forwarding debounced
    /// events (minus self-originated writes) to `on_event`.
    pub fn start(
        root: &Path,
        target_id: TargetId,
        side: Side,
        debounce: Duration,
        self_change: SelfChangeTable,
        on_event: impl Fn(WatchEvent) + Send + 'static,
    ) -> Result<Self> {
        let root_owned = root.to_path_buf();
        let mut debouncer = new_debouncer(
            debounce,
            None,
            move |result: DebounceEventResult| {
                let Ok(events) = result else {
                    return;
                };
                for event in events {
                    for path in &event.paths {
                        if self_change.is_suppressed(path) {
                            continue;
                        }
                        let Some(kind) = classify(&event.event.kind) else {
                            continue;
                        };
                        on_event(WatchEvent {
                            target_id,
                            side,
                            path: path.clone(),
                            kind,
                        });
                    }
                }
            },
        )
        .map_err(|e| std::io::Error::other(e.to_string()))?;

        debouncer
            .watch(&root_owned, RecursiveMode::Recursive)
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}

fn classify(kind: &notify::EventKind) -> Option<ChangeKind> {
    use notify::EventKind;
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Create),
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => Some(ChangeKind::Rename),
        EventKind::Modify(_) => Some(ChangeKind::Modify),
        EventKind::Remove(_) => Some(ChangeKind::Delete),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record_is_suppressed() {
        let table = SelfChangeTable::new(Duration::from_millis(500));
        let path = PathBuf::from("/store/repos/app/AGENTS.md");
        table.record(&path);
        assert!(table.is_suppressed(&path));
    }

    #[test]
    fn expired_record_is_not_suppressed() {
        let table = SelfChangeTable::new(Duration::from_millis(1));
        let path = PathBuf::from("/store/repos/app/AGENTS.md");
        table.record(&path);
        std::thread::sleep(Duration::from_millis(10));
        assert!(!table.is_suppressed(&path));
    }

    #[test]
    fn unrecorded_path_is_not_suppressed() {
        let table = SelfChangeTable::new(Duration::from_millis(500));
        assert!(!table.is_suppressed(Path::new("/store/repos/app/untouched.md")));
    }
}
