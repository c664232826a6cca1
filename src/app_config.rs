//! Per-user application configuration (§6, §10.3) — `~/<app-dir>/config.json`
//! with `data_dir`, `machine_id`, `machine_name`. Missing file means
//! defaults; corrupt file is a config error; writes are atomic (write a
//! `.tmp` sibling then rename).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// The directory name under `dirs::config_dir()` / `dirs::data_dir()`.
const APP_DIR: &str = "syncd";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the metadata store (`store.sqlite3`) lives. Resolution order:
    /// `$SYNCD_DATA_DIR`, else `dirs::data_dir()/syncd`.
    pub data_dir: PathBuf,
    /// Generated once with `uuid::Uuid::new_v4()` and persisted thereafter.
    pub machine_id: String,
    /// Defaults to `hostname::get()`, falling back to `"unknown-machine"`.
    pub machine_name: String,
}

fn config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().ok_or_else(|| SyncError::Config {
        path: PathBuf::from("~/.config"),
        detail: "could not resolve the platform config directory".to_owned(),
    })?;
    Ok(dir.join(APP_DIR).join("config.json"))
}

fn default_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("SYNCD_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let base = dirs::data_dir().ok_or_else(|| SyncError::Config {
        path: PathBuf::from("~/.local/share"),
        detail: "could not resolve the platform data directory".to_owned(),
    })?;
    Ok(base.join(APP_DIR))
}

fn default_machine_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown-machine".to_owned())
}

impl AppConfig {
    fn fresh() -> Result<Self> {
        Ok(Self {
            data_dir: default_data_dir()?,
            machine_id: Uuid::new_v4().to_string(),
            machine_name: default_machine_name(),
        })
    }

    /// Load the config from disk, creating and persisting a fresh one if
    /// absent. A present-but-corrupt file is a hard error (§10.3).
    pub fn load_or_init() -> Result<Self> {
        let path = config_path()?;
        match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| SyncError::Config {
                path,
                detail: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::fresh()?;
                config.save()?;
                Ok(config)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically persist this config: write a `.tmp` sibling, then rename
    /// over the real path (§10.3).
    pub fn save(&self) -> Result<()> {
        let path = config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| SyncError::Config {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, format!("{json}\n"))?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    #[must_use]
    pub fn store_root(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// `<store>/.db/<dbfile>`, excluded from git by the store's own
    /// `.gitignore` (§6).
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.store_root().join(".db").join("syncd.sqlite3")
    }
}

/// Whether `path` looks like a usable git repository (`syncd doctor`, §10.5).
#[must_use]
pub fn looks_like_git_repo(path: &Path) -> bool {
    path.join(".git").exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fresh_config_has_nonempty_machine_id() {
        let config = AppConfig::fresh().unwrap();
        assert!(!config.machine_id.is_empty());
        assert!(!config.machine_name.is_empty());
    }

    #[test]
    fn save_then_load_round_trips_by_hand() {
        let dir = tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().join("data"),
            machine_id: "fixed-id".into(),
            machine_name: "test-machine".into(),
        };
        let json = serde_json::to_string_pretty(&config).unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, &json).unwrap();
        let loaded: AppConfig = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn looks_like_git_repo_detects_dot_git() {
        let dir = tempdir().unwrap();
        assert!(!looks_like_git_repo(dir.path()));
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        assert!(looks_like_git_repo(dir.path()));
    }
}
