//! Target scanner (§4.4) — enumerates files in a target tree matching the
//! effective include patterns minus the expanded ignore patterns.

use std::path::{Path, PathBuf};

use globset::GlobSet;

use crate::error::Result;

/// One scanned entry: a POSIX-normalised relative path and whether it is a
/// symlink (root-segment symlinks are emitted whole, not descended into).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScannedEntry {
    pub relative_path: String,
    pub is_symlink: bool,
}

/// Walk `root`, matching `include` and excluding `ignore`. Does not follow
/// symlinks. A path is excluded if any ancestor directory in its chain is
/// itself a symlink (the path being scanned may itself be a symlink — those
/// are kept). Results are sorted and de-duplicated (§4.4).
pub fn scan(root: &Path, include: &GlobSet, ignore: &GlobSet) -> Result<Vec<ScannedEntry>> {
    let mut out = Vec::new();
    walk(root, root, include, ignore, &mut out)?;
    out.sort();
    out.dedup();
    Ok(out)
}

fn walk(
    root: &Path,
    dir: &Path,
    include: &GlobSet,
    ignore: &GlobSet,
    out: &mut Vec<ScannedEntry>,
) -> Result<()> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for entry in read_dir {
        let entry = entry?;
        let path = entry.path();
        let symlink_meta = entry.metadata()?;
        let is_symlink = symlink_meta.is_symlink();

        let relative = match path.strip_prefix(root) {
            Ok(p) => posix_relative(p),
            Err(_) => continue,
        };

        if is_symlink {
            if include.is_match(&relative) && !ignore.is_match(&relative) {
                out.push(ScannedEntry {
                    relative_path: relative,
                    is_symlink: true,
                });
            }
            // Never descend through a symlink, whether or not it matched.
            continue;
        }

        if symlink_meta.is_dir() {
            walk(root, &path, include, ignore, out)?;
            continue;
        }

        if symlink_meta.is_file() && include.is_match(&relative) && !ignore.is_match(&relative) {
            out.push(ScannedEntry {
                relative_path: relative,
                is_symlink: false,
            });
        }
    }

    Ok(())
}

fn posix_relative(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::build_matcher;
    use std::fs;
    use tempfile::tempdir;

    fn matcher(patterns: &[&str]) -> GlobSet {
        let entries: Vec<_> = patterns
            .iter()
            .map(|p| crate::model::pattern::PatternEntry {
                pattern: (*p).to_owned(),
                enabled: true,
                source: crate::model::pattern::PatternSource::Default,
            })
            .collect();
        build_matcher(&entries).unwrap()
    }

    #[test]
    fn scan_matches_nested_markdown() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs/nested")).unwrap();
        fs::write(dir.path().join("docs/nested/AGENTS.md"), "hi").unwrap();
        fs::write(dir.path().join("README.txt"), "hi").unwrap();

        let include = matcher(&["**/*.md"]);
        let ignore = matcher(&[]);
        let results = scan(dir.path(), &include, &ignore).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].relative_path, "docs/nested/AGENTS.md");
        assert!(!results[0].is_symlink);
    }

    #[test]
    fn scan_is_deterministic_across_runs() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();

        let include = matcher(&["**/*.md"]);
        let ignore = matcher(&[]);
        let first = scan(dir.path(), &include, &ignore).unwrap();
        let second = scan(dir.path(), &include, &ignore).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn scan_excludes_ignored_patterns() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/pkg.md"), "x").unwrap();
        fs::write(dir.path().join("keep.md"), "x").unwrap();

        let include = matcher(&["**/*.md"]);
        let ignore = matcher(&["**/node_modules/**"]);
        let results = scan(dir.path(), &include, &ignore).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].relative_path, "keep.md");
    }

    #[cfg(unix)]
    #[test]
    fn scan_emits_symlinked_root_segment_without_descending() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        let real = dir.path().join("real-target");
        fs::create_dir_all(&real).unwrap();
        fs::write(real.join("inner.md"), "x").unwrap();
        symlink(&real, dir.path().join("linked")).unwrap();

        let include = matcher(&["**/*.md", "linked"]);
        let ignore = matcher(&[]);
        let results = scan(dir.path(), &include, &ignore).unwrap();

        assert!(results.iter().any(|e| e.relative_path == "linked" && e.is_symlink));
        assert!(!results.iter().any(|e| e.relative_path.starts_with("linked/")));
    }
}
