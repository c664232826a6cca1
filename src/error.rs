//! Unified error type for the sync engine.
//!
//! Defines [`SyncError`], covering the taxonomy of spec §7: transient I/O,
//! invalid external input, merge failure, remote failure, and schema
//! migration failure. Each variant carries enough context that a caller
//! (the dashboard façade, or a test) can format a complete message without
//! additional lookups. Size-blocked and corrupt-JSON-as-empty-document are
//! *not* errors (§7) and so have no variant here — they are first-class
//! decisions represented elsewhere (`SyncBlocked` event, empty-default load).

use std::fmt;
use std::path::PathBuf;

/// Unified error type for sync engine operations.
#[derive(Debug)]
pub enum SyncError {
    /// An I/O error occurred during a filesystem or process operation.
    Io(std::io::Error),

    /// A path escaped its expected base directory after normalisation.
    PathTraversal {
        /// The base directory the path was expected to stay within.
        base: PathBuf,
        /// The segment(s) that were joined onto `base`.
        attempted: PathBuf,
    },

    /// A symlink target was absolute or escaped its target root via `..`.
    InvalidSymlinkTarget {
        /// The symlink's location.
        path: PathBuf,
        /// The rejected destination string.
        target: String,
    },

    /// A referenced entity does not exist in the metadata store.
    NotFound {
        /// The kind of entity (`"target"`, `"tracked_file"`, `"conflict"`, ...).
        kind: &'static str,
        /// A human-readable identifier for the missing entity.
        id: String,
    },

    /// A referenced entity already exists where uniqueness is required.
    AlreadyExists {
        /// The kind of entity.
        kind: &'static str,
        /// A human-readable identifier for the conflicting entity.
        id: String,
    },

    /// A git command invoked by the store adapter failed.
    GitCommand {
        /// The command that was run (e.g. `"git merge-file --stdout"`).
        command: String,
        /// Captured stderr.
        stderr: String,
        /// Process exit code, if available.
        exit_code: Option<i32>,
    },

    /// A remote pull/push failed. Surfaced verbatim per §7; the pull-mode
    /// latch is always released before this variant reaches the caller.
    Remote {
        /// `"pull"` or `"push"`.
        operation: &'static str,
        /// Underlying detail (usually captured stderr).
        detail: String,
    },

    /// Schema migration failed; the engine refuses to start.
    Migration {
        /// The migration version that failed to apply.
        version: u32,
        /// Underlying detail.
        detail: String,
    },

    /// The metadata store reported an error.
    Store(rusqlite::Error),

    /// A JSON document could not be parsed or written.
    Json {
        /// Path to the offending file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// The per-user configuration file could not be loaded or parsed.
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::PathTraversal { base, attempted } => write!(
                f,
                "path '{}' escapes base directory '{}'",
                attempted.display(),
                base.display()
            ),
            Self::InvalidSymlinkTarget { path, target } => write!(
                f,
                "symlink '{}' has an invalid target '{target}' (must be relative and not start with '..')",
                path.display()
            ),
            Self::NotFound { kind, id } => write!(f, "{kind} '{id}' not found"),
            Self::AlreadyExists { kind, id } => write!(f, "{kind} '{id}' already exists"),
            Self::GitCommand {
                command,
                stderr,
                exit_code,
            } => {
                write!(f, "`{command}` failed")?;
                if let Some(code) = exit_code {
                    write!(f, " (exit code {code})")?;
                }
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
            Self::Remote { operation, detail } => {
                write!(f, "remote {operation} failed: {detail}")
            }
            Self::Migration { version, detail } => {
                write!(f, "schema migration {version} failed: {detail}")
            }
            Self::Store(err) => write!(f, "metadata store error: {err}"),
            Self::Json { path, detail } => {
                write!(f, "malformed JSON in '{}': {detail}", path.display())
            }
            Self::Config { path, detail } => {
                write!(f, "configuration error in '{}': {detail}", path.display())
            }
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err)
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_path_traversal() {
        let err = SyncError::PathTraversal {
            base: PathBuf::from("/store/repos/foo"),
            attempted: PathBuf::from("/store/repos/foo/../../etc/passwd"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("escapes base directory"));
    }

    #[test]
    fn display_git_command_with_exit_code() {
        let err = SyncError::GitCommand {
            command: "git merge-file --stdout".into(),
            stderr: "conflict".into(),
            exit_code: Some(1),
        };
        let msg = format!("{err}");
        assert!(msg.contains("exit code 1"));
        assert!(msg.contains("conflict"));
    }

    #[test]
    fn display_git_command_empty_stderr() {
        let err = SyncError::GitCommand {
            command: "git init".into(),
            stderr: String::new(),
            exit_code: None,
        };
        let msg = format!("{err}");
        assert!(!msg.contains(":  "));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::other("disk full");
        let err: SyncError = io_err.into();
        assert!(matches!(err, SyncError::Io(_)));
    }

    #[test]
    fn error_source_io() {
        let err = SyncError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
