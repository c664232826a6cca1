//! [`SyncTarget`] — a repo or a service instance (§3).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Unique identifier for a [`SyncTarget`] row.
pub type TargetId = i64;

/// Whether a target mirrors a git repository or a tool-specific service
/// config directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Repo,
    Service,
}

impl TargetKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Repo => "repo",
            Self::Service => "service",
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a target. Pausing stops its watcher but keeps the
/// record (§3 invariant).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Active,
    Paused,
    Error,
}

impl TargetStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }
}

/// A repo or a service instance tracked by the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncTarget {
    pub id: TargetId,
    pub kind: TargetKind,
    pub display_name: String,
    /// Absolute path on this machine.
    pub local_path: PathBuf,
    /// Relative to the store root: `repos/<slug>` or `services/<slug>`.
    pub store_path: String,
    pub status: TargetStatus,
    /// Repo-only. `false` for services.
    pub is_favourite: bool,
    /// Service-only.
    pub service_type: Option<String>,
    /// Service-only.
    pub icon: Option<String>,
}

impl SyncTarget {
    /// The slug portion of `store_path` (`repos/<slug>` or `services/<slug>`).
    #[must_use]
    pub fn slug(&self) -> &str {
        self.store_path
            .split_once('/')
            .map_or(self.store_path.as_str(), |(_, slug)| slug)
    }
}
