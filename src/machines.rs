//! Machines registry (§4.9) — reads and rewrites `<store>/machines.json`,
//! the cross-host mapping of which machine has which repo/service linked
//! where, and drives auto-linking of entries newly visible after a pull.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::machines::{MachineInfo, MachinesFile, RepoMapping, ServiceDescriptor, ServicesMeta};
use crate::model::target::{SyncTarget, TargetKind, TargetStatus};
use crate::store::Store;

const STALE_AFTER_SECS: i64 = 24 * 60 * 60;

fn machines_path(store_root: &Path) -> PathBuf {
    store_root.join("machines.json")
}

fn services_meta_path(store_root: &Path) -> PathBuf {
    store_root.join("services").join("services.json")
}

pub fn load(store_root: &Path) -> Result<MachinesFile> {
    match std::fs::read_to_string(machines_path(store_root)) {
        Ok(raw) => Ok(serde_json::from_str(&raw).map_err(|e| crate::error::SyncError::Json {
            path: machines_path(store_root),
            detail: e.to_string(),
        })?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MachinesFile::default()),
        Err(e) => Err(e.into()),
    }
}

fn save(store_root: &Path, file: &MachinesFile) -> Result<()> {
    let json = serde_json::to_string_pretty(file).map_err(|e| crate::error::SyncError::Json {
        path: machines_path(store_root),
        detail: e.to_string(),
    })?;
    std::fs::write(machines_path(store_root), format!("{json}\n"))?;
    Ok(())
}

fn load_services_meta(store_root: &Path) -> Result<ServicesMeta> {
    match std::fs::read_to_string(services_meta_path(store_root)) {
        Ok(raw) => Ok(serde_json::from_str(&raw).map_err(|e| crate::error::SyncError::Json {
            path: services_meta_path(store_root),
            detail: e.to_string(),
        })?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServicesMeta::default()),
        Err(e) => Err(e.into()),
    }
}

fn save_services_meta(store_root: &Path, meta: &ServicesMeta) -> Result<()> {
    let json = serde_json::to_string_pretty(meta).map_err(|e| crate::error::SyncError::Json {
        path: services_meta_path(store_root),
        detail: e.to_string(),
    })?;
    let path = services_meta_path(store_root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

fn kind_map<'a>(file: &'a MachinesFile, kind: TargetKind) -> &'a BTreeMap<String, BTreeMap<String, RepoMapping>> {
    match kind {
        TargetKind::Repo => &file.repos,
        TargetKind::Service => &file.services,
    }
}

fn kind_map_mut<'a>(
    file: &'a mut MachinesFile,
    kind: TargetKind,
) -> &'a mut BTreeMap<String, BTreeMap<String, RepoMapping>> {
    match kind {
        TargetKind::Repo => &mut file.repos,
        TargetKind::Service => &mut file.services,
    }
}

/// Write or refresh this machine's entry. Only touches disk when the entry
/// is new, the display name changed, or `last_seen` is stale by more than
/// 24 hours — avoids a commit on every startup (§4.9).
pub fn register_current_machine(
    store_root: &Path,
    machine_id: &str,
    machine_name: &str,
    now: i64,
) -> Result<bool> {
    let mut file = load(store_root)?;
    let needs_write = match file.machines.get(machine_id) {
        None => true,
        Some(existing) => existing.name != machine_name || now - existing.last_seen > STALE_AFTER_SECS,
    };
    if !needs_write {
        return Ok(false);
    }
    file.machines.insert(
        machine_id.to_owned(),
        MachineInfo {
            name: machine_name.to_owned(),
            last_seen: now,
        },
    );
    save(store_root, &file)?;
    Ok(true)
}

/// Idempotently record this machine's current local paths for every
/// registered target (§4.9).
pub fn seed(store: &Store, store_root: &Path, machine_id: &str) -> Result<()> {
    let mut file = load(store_root)?;
    for target in store.list_targets()? {
        let map = kind_map_mut(&mut file, target.kind).entry(target.store_path.clone()).or_default();
        map.insert(
            machine_id.to_owned(),
            RepoMapping {
                local_path: target.local_path.to_string_lossy().into_owned(),
            },
        );
    }
    save(store_root, &file)?;
    Ok(())
}

/// One store subdirectory not currently registered as a target on this
/// machine (§4.9).
pub struct UnlinkedEntry {
    pub store_path: String,
    /// Other machines that reference this entry, and the local path each
    /// of them uses.
    pub referenced_by: Vec<(String, String)>,
    pub suggested_path: Option<PathBuf>,
    pub path_exists: bool,
}

fn list_store_subdirs(store_root: &Path, prefix: &str) -> Result<Vec<String>> {
    let dir = store_root.join(prefix);
    let read_dir = match std::fs::read_dir(&dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut out = Vec::new();
    for entry in read_dir {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name != ".git" {
                out.push(format!("{prefix}/{name}"));
            }
        }
    }
    out.sort();
    Ok(out)
}

fn unlinked_entries(
    store: &Store,
    store_root: &Path,
    machine_id: &str,
    kind: TargetKind,
    prefix: &str,
    default_path: impl Fn(&str) -> Option<PathBuf>,
) -> Result<Vec<UnlinkedEntry>> {
    let file = load(store_root)?;
    let registered: std::collections::HashSet<String> = store
        .list_targets()?
        .into_iter()
        .filter(|t| t.kind == kind)
        .map(|t| t.store_path)
        .collect();

    let mut out = Vec::new();
    for store_path in list_store_subdirs(store_root, prefix)? {
        if registered.contains(&store_path) {
            continue;
        }
        let mapping = kind_map(&file, kind).get(&store_path);
        let referenced_by = mapping.map_or_else(Vec::new, |per_machine| {
            per_machine
                .iter()
                .filter(|(id, _)| id.as_str() != machine_id)
                .map(|(id, m)| (id.clone(), m.local_path.clone()))
                .collect()
        });
        let own_prior = mapping.and_then(|m| m.get(machine_id)).map(|m| PathBuf::from(&m.local_path));
        let slug = store_path
            .split_once('/')
            .map_or(store_path.as_str(), |(_, slug)| slug);
        let suggested_path = own_prior.or_else(|| default_path(slug));
        let path_exists = suggested_path.as_ref().is_some_and(|p| p.exists());
        out.push(UnlinkedEntry {
            store_path,
            referenced_by,
            suggested_path,
            path_exists,
        });
    }
    Ok(out)
}

pub fn unlinked_repos(store: &Store, store_root: &Path, machine_id: &str) -> Result<Vec<UnlinkedEntry>> {
    unlinked_entries(store, store_root, machine_id, TargetKind::Repo, "repos", |_| None)
}

/// Built-in service platform defaults, relative to the user's home
/// directory (§4.9).
fn builtin_service_default(slug: &str) -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    match slug {
        "claude" => Some(home.join(".claude")),
        "copilot" => Some(home.join(".config").join("github-copilot")),
        "cursor" => Some(home.join(".cursor")),
        _ => None,
    }
}

pub fn unlinked_services(store: &Store, store_root: &Path, machine_id: &str) -> Result<Vec<UnlinkedEntry>> {
    unlinked_entries(
        store,
        store_root,
        machine_id,
        TargetKind::Service,
        "services",
        builtin_service_default,
    )
}

/// Outcome of auto-linking one unlinked entry (§4.9).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    PathMissing,
    AlreadyRegistered,
}

/// Auto-link every unlinked entry whose suggested path exists: register
/// the target, scan it, materialise whichever side is empty, apply the
/// ignore-block manager for repos, and write the machines-file mapping.
pub fn auto_link_all(
    engine: &crate::engine::SyncEngine,
    store_root: &Path,
    machine_id: &str,
    kind: TargetKind,
    entries: &[UnlinkedEntry],
) -> Result<Vec<(String, LinkOutcome)>> {
    let mut results = Vec::new();
    for entry in entries {
        let Some(suggested) = &entry.suggested_path else {
            results.push((entry.store_path.clone(), LinkOutcome::PathMissing));
            continue;
        };
        if !entry.path_exists {
            results.push((entry.store_path.clone(), LinkOutcome::PathMissing));
            continue;
        }
        if engine.store().get_target_by_store_path(&entry.store_path)?.is_some() {
            results.push((entry.store_path.clone(), LinkOutcome::AlreadyRegistered));
            continue;
        }

        let slug = entry
            .store_path
            .split_once('/')
            .map_or(entry.store_path.as_str(), |(_, slug)| slug);
        let target = SyncTarget {
            id: 0,
            kind,
            display_name: slug.to_owned(),
            local_path: suggested.clone(),
            store_path: entry.store_path.clone(),
            status: TargetStatus::Active,
            is_favourite: false,
            service_type: if kind == TargetKind::Service { Some(slug.to_owned()) } else { None },
            icon: None,
        };
        let registered = engine.register_target(&target)?;

        if kind == TargetKind::Repo {
            let include = crate::patterns::effective_patterns(
                engine.store(),
                registered.id,
                crate::model::pattern::PatternKind::Include,
            )?;
            let roots = crate::patterns::derive_gitignore_roots(&include);
            crate::ignore_block::apply(&registered.local_path.join(".gitignore"), &roots)?;
        }

        let mut file = load(store_root)?;
        kind_map_mut(&mut file, kind).entry(entry.store_path.clone()).or_default().insert(
            machine_id.to_owned(),
            RepoMapping {
                local_path: suggested.to_string_lossy().into_owned(),
            },
        );
        save(store_root, &file)?;

        results.push((entry.store_path.clone(), LinkOutcome::Linked));
    }
    Ok(results)
}

/// Remove an unlinked store subtree entirely: delete its files, strip all
/// mappings from the machines file, and (for services) its services.json
/// entry (§4.9).
pub fn delete_unlinked(store_root: &Path, kind: TargetKind, store_path: &str) -> Result<()> {
    let full = store_root.join(store_path);
    if full.is_dir() {
        std::fs::remove_dir_all(&full)?;
    }

    let mut file = load(store_root)?;
    kind_map_mut(&mut file, kind).remove(store_path);
    save(store_root, &file)?;

    if kind == TargetKind::Service {
        let slug = store_path.split_once('/').map_or(store_path, |(_, slug)| slug);
        let mut meta = load_services_meta(store_root)?;
        if meta.services.remove(slug).is_some() {
            save_services_meta(store_root, &meta)?;
        }
    }
    Ok(())
}

pub fn register_service_descriptor(store_root: &Path, service_type: &str, descriptor: ServiceDescriptor) -> Result<()> {
    let mut meta = load_services_meta(store_root)?;
    meta.services.insert(service_type.to_owned(), descriptor);
    save_services_meta(store_root, &meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn register_writes_new_machine() {
        let dir = tempdir().unwrap();
        let wrote = register_current_machine(dir.path(), "m1", "laptop", 1000).unwrap();
        assert!(wrote);
        let file = load(dir.path()).unwrap();
        assert_eq!(file.machines.get("m1").unwrap().name, "laptop");
    }

    #[test]
    fn register_skips_when_fresh_and_unchanged() {
        let dir = tempdir().unwrap();
        register_current_machine(dir.path(), "m1", "laptop", 1000).unwrap();
        let wrote = register_current_machine(dir.path(), "m1", "laptop", 1500).unwrap();
        assert!(!wrote);
    }

    #[test]
    fn register_rewrites_when_stale() {
        let dir = tempdir().unwrap();
        register_current_machine(dir.path(), "m1", "laptop", 1000).unwrap();
        let wrote = register_current_machine(dir.path(), "m1", "laptop", 1000 + STALE_AFTER_SECS + 1).unwrap();
        assert!(wrote);
    }

    #[test]
    fn register_rewrites_on_name_change() {
        let dir = tempdir().unwrap();
        register_current_machine(dir.path(), "m1", "laptop", 1000).unwrap();
        let wrote = register_current_machine(dir.path(), "m1", "desktop", 1001).unwrap();
        assert!(wrote);
    }

    #[test]
    fn unlinked_repos_lists_unregistered_subdirs() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("repos").join("app")).unwrap();
        let store = Store::open_in_memory().unwrap();

        let entries = unlinked_repos(&store, dir.path(), "m1").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].store_path, "repos/app");
    }

    #[test]
    fn delete_unlinked_removes_subtree_and_mapping() {
        let dir = tempdir().unwrap();
        let repo_dir = dir.path().join("repos").join("app");
        std::fs::create_dir_all(&repo_dir).unwrap();
        register_current_machine(dir.path(), "m1", "laptop", 1000).unwrap();
        seed_mapping_for_test(dir.path(), "repos/app", "m1", "/home/dev/app");

        delete_unlinked(dir.path(), TargetKind::Repo, "repos/app").unwrap();

        assert!(!repo_dir.exists());
        let file = load(dir.path()).unwrap();
        assert!(file.repos.get("repos/app").is_none());
    }

    fn seed_mapping_for_test(store_root: &Path, store_path: &str, machine_id: &str, local_path: &str) {
        let mut file = load(store_root).unwrap();
        file.repos.entry(store_path.to_owned()).or_default().insert(
            machine_id.to_owned(),
            RepoMapping {
                local_path: local_path.to_owned(),
            },
        );
        save(store_root, &file).unwrap();
    }
}
