//! Data model — core entities and invariants (§3).

pub mod conflict;
pub mod log;
pub mod machines;
pub mod pattern;
pub mod settings;
pub mod target;
pub mod tracked_file;

pub use conflict::{Conflict, ConflictStatus};
pub use log::{LogEntry, LogKind};
pub use pattern::{PatternEntry, PatternKind, PatternSource};
pub use target::{SyncTarget, TargetKind, TargetStatus};
pub use tracked_file::{FileKind, SyncStatus, TrackedFile};
