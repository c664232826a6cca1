//! Path and symlink-target validation (§4.1).
//!
//! `safe_join` is used on every path that originates from an external
//! caller (watcher events, scanner results, dashboard requests) before it
//! touches the filesystem. Symlink destinations received from external
//! callers must be relative and must not start with `..`.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result as SyncResult, SyncError};

/// Join `segments` onto `base`, rejecting any result that, after
/// normalisation, does not have `base` as a prefix.
///
/// Normalisation is purely lexical (`Component` collapsing of `.` and
/// `..`); it does not consult the filesystem, so it also rejects paths
/// that only *would* escape via a symlink discovered later — callers that
/// need symlink-aware containment combine this with [`validate_symlink_target`].
pub fn safe_join(base: &Path, segments: &[&str]) -> SyncResult<PathBuf> {
    let mut joined = base.to_path_buf();
    for seg in segments {
        joined.push(seg);
    }
    let normalised = normalise(&joined);
    let base_normalised = normalise(base);
    if normalised.starts_with(&base_normalised) {
        Ok(normalised)
    } else {
        Err(SyncError::PathTraversal {
            base: base.to_path_buf(),
            attempted: joined,
        })
    }
}

/// Lexically normalise a path: collapse `.`, resolve `..` against prior
/// components (never escaping above the path's own root), without touching
/// the filesystem.
fn normalise(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().next_back(), Some(Component::RootDir) | None) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Validate a symlink destination string received from an external caller
/// (e.g. a newly scanned target file, or an edit posted by the dashboard).
///
/// Rejects absolute targets and targets that start with `..`.
pub fn validate_symlink_target(path: &Path, target: &str) -> SyncResult<()> {
    let target_path = Path::new(target);
    if target_path.is_absolute() {
        return Err(SyncError::InvalidSymlinkTarget {
            path: path.to_path_buf(),
            target: target.to_owned(),
        });
    }
    if target_path
        .components()
        .next()
        .is_some_and(|c| c == Component::ParentDir)
    {
        return Err(SyncError::InvalidSymlinkTarget {
            path: path.to_path_buf(),
            target: target.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_join_allows_nested_path() {
        let base = Path::new("/store/repos/foo");
        let joined = safe_join(base, &["src", "lib.rs"]).unwrap();
        assert_eq!(joined, PathBuf::from("/store/repos/foo/src/lib.rs"));
    }

    #[test]
    fn safe_join_rejects_parent_escape() {
        let base = Path::new("/store/repos/foo");
        let err = safe_join(base, &["..", "..", "etc", "passwd"]).unwrap_err();
        assert!(matches!(err, SyncError::PathTraversal { .. }));
    }

    #[test]
    fn safe_join_allows_internal_dotdot_that_stays_inside() {
        let base = Path::new("/store/repos/foo");
        let joined = safe_join(base, &["sub", "..", "lib.rs"]).unwrap();
        assert_eq!(joined, PathBuf::from("/store/repos/foo/lib.rs"));
    }

    #[test]
    fn validate_symlink_target_rejects_absolute() {
        let err = validate_symlink_target(Path::new("link"), "/etc/passwd").unwrap_err();
        assert!(matches!(err, SyncError::InvalidSymlinkTarget { .. }));
    }

    #[test]
    fn validate_symlink_target_rejects_dotdot_prefix() {
        let err = validate_symlink_target(Path::new("link"), "../../escape").unwrap_err();
        assert!(matches!(err, SyncError::InvalidSymlinkTarget { .. }));
    }

    #[test]
    fn validate_symlink_target_allows_relative() {
        validate_symlink_target(Path::new("link"), "sibling/file.md").unwrap();
    }

    #[test]
    fn validate_symlink_target_allows_dotdot_in_middle() {
        validate_symlink_target(Path::new("a/link"), "sub/../file.md").unwrap();
    }
}
