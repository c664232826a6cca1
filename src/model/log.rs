//! Append-only sync log (SPEC_FULL §11) — the "log" responsibility named in
//! §2's Metadata store row but left undetailed by §3.

use serde::{Deserialize, Serialize};

use super::target::TargetId;

pub type LogEntryId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    AutoMerged,
    ConflictOpened,
    ConflictResolved,
    SyncBlocked,
    Error,
}

impl LogKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AutoMerged => "auto_merged",
            Self::ConflictOpened => "conflict_opened",
            Self::ConflictResolved => "conflict_resolved",
            Self::SyncBlocked => "sync_blocked",
            Self::Error => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: LogEntryId,
    pub at: i64,
    pub target_id: TargetId,
    pub kind: LogKind,
    pub detail: String,
}
