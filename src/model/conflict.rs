//! [`Conflict`] — an unresolved divergence on a [`TrackedFile`](super::tracked_file::TrackedFile) (§3).

use serde::{Deserialize, Serialize};

use super::tracked_file::TrackedFileId;

pub type ConflictId = i64;

/// Closed enumeration of conflict resolutions (§3). `Pending` is the only
/// mutable state — once resolved, a `Conflict`'s `status` never mutates
/// again (§3 lifecycle).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Pending,
    ResolvedStore,
    ResolvedTarget,
    ResolvedManual,
    ResolvedDelete,
    ResolvedAuto,
}

impl ConflictStatus {
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ResolvedStore => "resolved_store",
            Self::ResolvedTarget => "resolved_target",
            Self::ResolvedManual => "resolved_manual",
            Self::ResolvedDelete => "resolved_delete",
            Self::ResolvedAuto => "resolved_auto",
        }
    }
}

/// An unresolved (or formerly unresolved) divergence on a tracked file.
///
/// `base_content` is the common-ancestor content from the store's git HEAD
/// at the moment of detection, or `None` for first-ever sync (§3). At most
/// one `Pending` conflict exists per tracked file (§3, §4.8); re-detection
/// updates the existing row rather than inserting a duplicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: ConflictId,
    pub tracked_file_id: TrackedFileId,
    pub store_content: Option<Vec<u8>>,
    pub target_content: Option<Vec<u8>>,
    pub base_content: Option<Vec<u8>>,
    /// Three-way merge output with conflict markers, if a merge was attempted.
    pub merged_content: Option<Vec<u8>>,
    pub store_checksum: Option<String>,
    pub target_checksum: Option<String>,
    pub status: ConflictStatus,
    pub resolved_at: Option<i64>,
}

/// What action the caller is requesting for a pending conflict (the
/// "resolve conflicts" operation of the consumer API contract, §6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConflictResolution {
    KeepStore,
    KeepTarget,
    Manual(Vec<u8>),
    Delete,
}

impl ConflictResolution {
    #[must_use]
    pub const fn status(&self) -> ConflictStatus {
        match self {
            Self::KeepStore => ConflictStatus::ResolvedStore,
            Self::KeepTarget => ConflictStatus::ResolvedTarget,
            Self::Manual(_) => ConflictStatus::ResolvedManual,
            Self::Delete => ConflictStatus::ResolvedDelete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_status_mapping() {
        assert_eq!(
            ConflictResolution::KeepStore.status(),
            ConflictStatus::ResolvedStore
        );
        assert_eq!(
            ConflictResolution::KeepTarget.status(),
            ConflictStatus::ResolvedTarget
        );
        assert_eq!(
            ConflictResolution::Manual(b"x".to_vec()).status(),
            ConflictStatus::ResolvedManual
        );
        assert_eq!(
            ConflictResolution::Delete.status(),
            ConflictStatus::ResolvedDelete
        );
    }

    #[test]
    fn only_pending_is_pending() {
        assert!(ConflictStatus::Pending.is_pending());
        assert!(!ConflictStatus::ResolvedAuto.is_pending());
    }
}
