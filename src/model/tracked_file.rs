//! [`TrackedFile`] — one file or symlink the engine is syncing (§3, §4.8).

use serde::{Deserialize, Serialize};

use super::target::TargetId;

pub type TrackedFileId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Symlink,
}

/// Closed enumeration of sync states (§3, §4.8). `Error` is the seventh
/// variant added for transient I/O failures (SPEC_FULL §11).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    PendingToTarget,
    PendingToStore,
    Conflict,
    MissingInTarget,
    MissingInStore,
    Error,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::PendingToTarget => "pending_to_target",
            Self::PendingToStore => "pending_to_store",
            Self::Conflict => "conflict",
            Self::MissingInTarget => "missing_in_target",
            Self::MissingInStore => "missing_in_store",
            Self::Error => "error",
        }
    }

    /// Legal transitions per the state machine in §4.8: any state may go to
    /// `synced`; `synced` may go to any `pending_*`, `conflict`, or
    /// `missing_*`; a `missing_*` state may advance directly to `conflict`
    /// (store delete-then-recreate while target was modified, §4.8).
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if next == Self::Synced {
            return true;
        }
        match self {
            Self::Synced => matches!(
                next,
                Self::PendingToTarget
                    | Self::PendingToStore
                    | Self::Conflict
                    | Self::MissingInTarget
                    | Self::MissingInStore
                    | Self::Error
            ),
            Self::MissingInTarget | Self::MissingInStore => {
                matches!(next, Self::Conflict | Self::Error)
            }
            Self::Error => true,
            Self::PendingToTarget | Self::PendingToStore | Self::Conflict => {
                matches!(next, Self::Error)
            }
        }
    }
}

/// One file (or symlink) the engine is syncing inside a target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedFile {
    pub id: TrackedFileId,
    pub target_id: TargetId,
    /// POSIX-normalised path relative to both the target root and the
    /// target's store subtree.
    pub relative_path: String,
    pub kind: FileKind,
    pub store_checksum: Option<String>,
    pub target_checksum: Option<String>,
    pub store_mtime: Option<i64>,
    pub target_mtime: Option<i64>,
    pub sync_status: SyncStatus,
    /// Updated iff the record ends in `synced` (§3 invariant).
    pub last_synced_at: Option<i64>,
    /// Present only when `sync_status == Error`.
    pub last_error: Option<String>,
}

impl TrackedFile {
    /// Fast-path equality test (§4.8 step 1): both checksums present and equal.
    #[must_use]
    pub fn checksums_match(&self) -> bool {
        matches!(
            (&self.store_checksum, &self.target_checksum),
            (Some(a), Some(b)) if a == b
        )
    }

    /// Whether this file has ever completed a synced reconciliation —
    /// distinguishes "exactly one side exists, previously synced" (§4.8 step
    /// 3) from "no prior history" (§4.8 step 4).
    #[must_use]
    pub const fn has_sync_history(&self) -> bool {
        self.last_synced_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synced_can_go_anywhere() {
        assert!(SyncStatus::Synced.can_transition_to(SyncStatus::Conflict));
        assert!(SyncStatus::Synced.can_transition_to(SyncStatus::MissingInStore));
        assert!(SyncStatus::Synced.can_transition_to(SyncStatus::Error));
    }

    #[test]
    fn any_state_can_go_to_synced() {
        assert!(SyncStatus::Conflict.can_transition_to(SyncStatus::Synced));
        assert!(SyncStatus::MissingInTarget.can_transition_to(SyncStatus::Synced));
        assert!(SyncStatus::Error.can_transition_to(SyncStatus::Synced));
    }

    #[test]
    fn missing_can_advance_directly_to_conflict() {
        assert!(SyncStatus::MissingInStore.can_transition_to(SyncStatus::Conflict));
        assert!(SyncStatus::MissingInTarget.can_transition_to(SyncStatus::Conflict));
    }

    #[test]
    fn missing_cannot_go_to_pending() {
        assert!(!SyncStatus::MissingInStore.can_transition_to(SyncStatus::PendingToTarget));
    }

    #[test]
    fn checksums_match_requires_both_present_and_equal() {
        let mut f = sample_file();
        f.store_checksum = Some("abc".into());
        f.target_checksum = Some("abc".into());
        assert!(f.checksums_match());

        f.target_checksum = Some("def".into());
        assert!(!f.checksums_match());

        f.target_checksum = None;
        assert!(!f.checksums_match());
    }

    fn sample_file() -> TrackedFile {
        TrackedFile {
            id: 1,
            target_id: 1,
            relative_path: "AGENTS.md".into(),
            kind: FileKind::File,
            store_checksum: None,
            target_checksum: None,
            store_mtime: None,
            target_mtime: None,
            sync_status: SyncStatus::PendingToTarget,
            last_synced_at: None,
            last_error: None,
        }
    }
}
