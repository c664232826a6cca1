//! [`MachinesFile`] — cross-machine mapping registry (§3, §4.9, §6).
//!
//! Serialised to `<store>/machines.json` with all key levels sorted
//! alphabetically, two-space indent, trailing newline (§6). `BTreeMap`
//! gives the sort for free through `serde_json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineInfo {
    pub name: String,
    /// Unix seconds.
    pub last_seen: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoMapping {
    pub local_path: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MachinesFile {
    pub machines: BTreeMap<String, MachineInfo>,
    /// Keyed by `store_path`, then by `machine_id`.
    pub repos: BTreeMap<String, BTreeMap<String, RepoMapping>>,
    pub services: BTreeMap<String, BTreeMap<String, RepoMapping>>,
}

impl MachinesFile {
    /// A `store_path` is "linked" on `machine_id` iff it has an entry whose
    /// `local_path` exists on disk (§3 invariant). The existence check is a
    /// separate I/O step — see `crate::machines::linked_local_path`.
    #[must_use]
    pub fn mapping_for<'a>(
        &'a self,
        kind_map: &'a BTreeMap<String, BTreeMap<String, RepoMapping>>,
        store_path: &str,
        machine_id: &str,
    ) -> Option<&'a RepoMapping> {
        kind_map.get(store_path).and_then(|m| m.get(machine_id))
    }

    #[must_use]
    pub fn repo_mapping(&self, store_path: &str, machine_id: &str) -> Option<&RepoMapping> {
        self.mapping_for(&self.repos, store_path, machine_id)
    }

    #[must_use]
    pub fn service_mapping(&self, store_path: &str, machine_id: &str) -> Option<&RepoMapping> {
        self.mapping_for(&self.services, store_path, machine_id)
    }
}

/// `<store>/services/services.json` — custom service metadata so a service
/// defined on one host can be materialised on another (§3, §4.9).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub patterns: Vec<String>,
    pub description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicesMeta {
    /// Keyed by `service_type`.
    pub services: BTreeMap<String, ServiceDescriptor>,
}
