//! Settings sync (§4.10) — exports global settings, pattern sets, and
//! per-target overrides to `<store>/sync-settings.json`, and applies the
//! file back in after a pull.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::Result;
use crate::model::pattern::PatternKind;
use crate::model::settings::{GlobalSettings, LocalPatternOverride, SettingsSnapshot, TargetOverrides};
use crate::store::Store;

fn snapshot_path(store_root: &Path) -> PathBuf {
    store_root.join("sync-settings.json")
}

fn override_key(kind: PatternKind, pattern: &str) -> String {
    let prefix = match kind {
        PatternKind::Include => "include",
        PatternKind::Ignore => "ignore",
    };
    format!("{prefix}:{pattern}")
}

fn parse_override_key(key: &str) -> Option<(PatternKind, &str)> {
    let (prefix, pattern) = key.split_once(':')?;
    let kind = match prefix {
        "include" => PatternKind::Include,
        "ignore" => PatternKind::Ignore,
        _ => return None,
    };
    Some((kind, pattern))
}

/// Build the full export snapshot from the database (§4.10).
pub fn build_snapshot(store: &Store) -> Result<SettingsSnapshot> {
    let global = store.global_settings()?;
    let file_patterns = store.list_global_patterns(PatternKind::Include)?;
    let ignore_patterns = store.list_global_patterns(PatternKind::Ignore)?;

    let mut per_target_overrides = BTreeMap::new();
    for target in store.list_targets()? {
        let overrides = store.list_overrides(target.id)?;
        let locals = store.list_local_patterns(target.id)?;
        if overrides.is_empty() && locals.is_empty() {
            continue;
        }
        let enabled_overrides = overrides
            .into_iter()
            .map(|(kind, pattern, enabled)| (override_key(kind, &pattern), enabled))
            .collect();
        let local_patterns = locals
            .into_iter()
            .map(|(kind, pattern, enabled)| LocalPatternOverride { kind, pattern, enabled })
            .collect();
        per_target_overrides.insert(
            target.store_path,
            TargetOverrides {
                enabled_overrides,
                local_patterns,
            },
        );
    }

    Ok(SettingsSnapshot {
        global,
        file_patterns,
        ignore_patterns,
        per_target_overrides,
    })
}

/// Write the export snapshot, sorted for stable diffs (§4.10). Caller is
/// responsible for queueing the commit.
pub fn export(store: &Store, store_root: &Path) -> Result<()> {
    let snapshot = build_snapshot(store)?;
    let json = serde_json::to_string_pretty(&snapshot).map_err(|e| crate::error::SyncError::Json {
        path: snapshot_path(store_root),
        detail: e.to_string(),
    })?;
    std::fs::write(snapshot_path(store_root), format!("{json}\n"))?;
    Ok(())
}

pub fn load(store_root: &Path) -> Result<Option<SettingsSnapshot>> {
    match std::fs::read_to_string(snapshot_path(store_root)) {
        Ok(raw) => {
            let snapshot = serde_json::from_str(&raw).map_err(|e| crate::error::SyncError::Json {
                path: snapshot_path(store_root),
                detail: e.to_string(),
            })?;
            Ok(Some(snapshot))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Overrides for a target that isn't linked on this machine yet, held in
/// memory keyed by `store_path` until the target becomes linked (§4.10
/// deferral rule).
#[derive(Default)]
pub struct DeferredOverrides {
    pending: Mutex<HashMap<String, TargetOverrides>>,
}

impl DeferredOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&self, store_path: String, overrides: TargetOverrides) {
        self.pending.lock().expect("deferred overrides mutex poisoned").insert(store_path, overrides);
    }

    /// Take and return held overrides for `store_path`, if any, so the
    /// caller can apply them now that the target is linked.
    pub fn take(&self, store_path: &str) -> Option<TargetOverrides> {
        self.pending.lock().expect("deferred overrides mutex poisoned").remove(store_path)
    }
}

fn apply_global(store: &Store, global: &GlobalSettings) -> Result<()> {
    store.set_setting("size_block_bytes", &global.size_block_bytes.to_string())?;
    store.set_setting("debounce_ms", &global.debounce_ms.to_string())?;
    store.set_setting("self_change_ttl_ms", &global.self_change_ttl_ms.to_string())?;
    Ok(())
}

fn apply_global_patterns(store: &Store, snapshot: &SettingsSnapshot) -> Result<()> {
    for entry in &snapshot.file_patterns {
        store.seed_default_patterns(&[entry.pattern.as_str()], &[])?;
    }
    for entry in &snapshot.ignore_patterns {
        store.seed_default_patterns(&[], &[entry.pattern.as_str()])?;
    }
    Ok(())
}

fn apply_target_overrides(store: &Store, target_id: crate::model::target::TargetId, overrides: &TargetOverrides) -> Result<()> {
    for (key, enabled) in &overrides.enabled_overrides {
        if let Some((kind, pattern)) = parse_override_key(key) {
            store.set_pattern_override(target_id, kind, pattern, *enabled)?;
        }
    }
    for local in &overrides.local_patterns {
        store.add_local_pattern(target_id, local.kind, &local.pattern, local.enabled)?;
    }
    Ok(())
}

/// Apply a freshly-pulled `sync-settings.json` into the database (§4.10).
/// Overrides for targets not yet linked on this machine are held in
/// `deferred` rather than dropped.
pub fn apply(store: &Store, snapshot: &SettingsSnapshot, deferred: &DeferredOverrides) -> Result<()> {
    apply_global(store, &snapshot.global)?;
    apply_global_patterns(store, snapshot)?;

    for (store_path, overrides) in &snapshot.per_target_overrides {
        match store.get_target_by_store_path(store_path)? {
            Some(target) => apply_target_overrides(store, target.id, overrides)?,
            None => deferred.hold(store_path.clone(), overrides.clone()),
        }
    }
    Ok(())
}

/// Apply any overrides held for `store_path` now that its target has just
/// become linked (§4.10 deferral rule).
pub fn apply_deferred_for(
    store: &Store,
    deferred: &DeferredOverrides,
    store_path: &str,
    target_id: crate::model::target::TargetId,
) -> Result<()> {
    if let Some(overrides) = deferred.take(store_path) {
        apply_target_overrides(store, target_id, &overrides)?;
    }
    Ok(())
}
