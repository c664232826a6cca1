//! Event shapes broadcast by the sync engine (§4.8). Shape only — no
//! transport is specified; the external I/O façade adapts these for the
//! dashboard.

use crate::model::conflict::{Conflict, ConflictId};
use crate::model::target::TargetId;
use crate::model::tracked_file::{SyncStatus, TrackedFileId};

use super::reconcile::ReconcileStats;

#[derive(Clone, Debug)]
pub enum SyncEvent {
    SyncStatus {
        target_id: TargetId,
        file_id: TrackedFileId,
        status: SyncStatus,
    },
    ConflictCreated {
        conflict: Conflict,
    },
    ConflictUpdated {
        conflict_id: ConflictId,
        file_id: TrackedFileId,
        target_id: TargetId,
    },
    ConflictResolved {
        conflict_id: ConflictId,
    },
    FilesChanged {
        target_id: TargetId,
    },
    SyncComplete {
        target_id: TargetId,
        stats: ReconcileStats,
    },
    SyncBlocked {
        target_id: TargetId,
        reason: String,
        total_size: u64,
    },
    WatcherError {
        target_id: TargetId,
        detail: String,
    },
}
