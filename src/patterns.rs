//! Pattern resolver (§4.3) — composes global and per-target pattern state
//! into the ordered, expanded sets consumed by the scanner and the
//! ignore-block manager.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::Result;
use crate::model::pattern::{PatternEntry, PatternKind, PatternSource};
use crate::store::Store;

/// Effective, ordered pattern list for a target: local patterns first, then
/// global patterns with the per-target `enabled` override already applied
/// (§4.3). Identity and `source` of a global pattern never become `Local`
/// through an override.
pub fn effective_patterns(
    store: &Store,
    target_id: i64,
    kind: PatternKind,
) -> Result<Vec<PatternEntry>> {
    store.effective_patterns(target_id, kind)
}

/// Expand ignore patterns so they match at any depth (§4.3): every pattern
/// `P` that does not already begin with `**/` also yields `**/P`.
#[must_use]
pub fn expand_ignore_patterns(entries: &[PatternEntry]) -> Vec<PatternEntry> {
    let mut expanded = Vec::with_capacity(entries.len() * 2);
    for entry in entries {
        expanded.push(entry.clone());
        if !entry.pattern.starts_with("**/") {
            expanded.push(PatternEntry {
                pattern: format!("**/{}", entry.pattern),
                enabled: entry.enabled,
                source: entry.source,
            });
        }
    }
    expanded
}

/// Build a matcher over the `enabled` patterns of `entries`, ignoring
/// disabled ones. `**` crosses directory boundaries, `*` does not, and a
/// leading `.` is matched by default (the scanner dialect required by §4.3).
pub fn build_matcher(entries: &[PatternEntry]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for entry in entries.iter().filter(|e| e.enabled) {
        let glob = Glob::new(&entry.pattern)
            .map_err(|e| crate::error::SyncError::Config {
                path: std::path::PathBuf::from(&entry.pattern),
                detail: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| crate::error::SyncError::Config {
            path: std::path::PathBuf::new(),
            detail: e.to_string(),
        })
}

/// Root-level patterns derived from the enabled include set for the
/// managed `.gitignore` segment (§4.6): strip `/**` and `/*` suffixes;
/// folder-like entries get a trailing `/`.
#[must_use]
pub fn derive_gitignore_roots(include_entries: &[PatternEntry]) -> Vec<String> {
    let mut roots: Vec<String> = include_entries
        .iter()
        .filter(|e| e.enabled)
        .map(|e| root_segment(&e.pattern))
        .collect();
    roots.sort();
    roots.dedup();
    roots
}

fn root_segment(pattern: &str) -> String {
    if let Some(folder) = pattern
        .strip_suffix("/**")
        .or_else(|| pattern.strip_suffix("/*"))
    {
        format!("{folder}/")
    } else {
        // No folder-glob suffix: an exact file path, e.g.
        // `.github/copilot-instructions.md` (§8 boundary behaviour) must be
        // reproduced verbatim, not truncated to its parent directory.
        pattern.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn entry(pattern: &str) -> PatternEntry {
        PatternEntry {
            pattern: pattern.to_owned(),
            enabled: true,
            source: PatternSource::Default,
        }
    }

    #[test]
    fn expand_adds_cross_directory_variant() {
        let entries = vec![entry("node_modules")];
        let expanded = expand_ignore_patterns(&entries);
        assert!(expanded.iter().any(|e| e.pattern == "node_modules"));
        assert!(expanded.iter().any(|e| e.pattern == "**/node_modules"));
    }

    #[test]
    fn expand_is_idempotent_for_already_deep_patterns() {
        let entries = vec![entry("**/node_modules")];
        let expanded = expand_ignore_patterns(&entries);
        assert_eq!(expanded.len(), 1);
    }

    #[test]
    fn matcher_matches_double_star_across_directories() {
        let entries = vec![entry("**/*.md")];
        let set = build_matcher(&entries).unwrap();
        assert!(set.is_match("AGENTS.md"));
        assert!(set.is_match("docs/nested/AGENTS.md"));
    }

    #[test]
    fn matcher_skips_disabled_entries() {
        let mut e = entry("**/*.md");
        e.enabled = false;
        let set = build_matcher(std::slice::from_ref(&e)).unwrap();
        assert!(!set.is_match("AGENTS.md"));
    }

    #[test]
    fn derive_gitignore_roots_keeps_multi_segment_file_exact() {
        let entries = vec![entry(".github/copilot-instructions.md/**")];
        let roots = derive_gitignore_roots(&entries);
        assert_eq!(roots, vec![".github/copilot-instructions.md".to_string()]);
    }

    #[test]
    fn derive_gitignore_roots_adds_trailing_slash_for_folders() {
        let entries = vec![entry(".claude/**")];
        let roots = derive_gitignore_roots(&entries);
        assert_eq!(roots, vec![".claude/".to_string()]);
    }

    #[rstest]
    #[case::markdown_root("AGENTS.md")]
    #[case::markdown_nested("docs/nested/AGENTS.md")]
    #[case::dotfile_tool_dir(".claude/commands/review.md")]
    fn matcher_matches_expected_paths(#[case] path: &str) {
        let entries = vec![entry("**/*.md"), entry(".claude/**")];
        let set = build_matcher(&entries).unwrap();
        assert!(set.is_match(path), "expected match for {path}");
    }

    #[rstest]
    #[case::binary(".DS_Store")]
    #[case::unrelated_dir("node_modules/pkg/index.js")]
    fn matcher_rejects_unrelated_paths(#[case] path: &str) {
        let entries = vec![entry("**/*.md"), entry(".claude/**")];
        let set = build_matcher(&entries).unwrap();
        assert!(!set.is_match(path), "expected no match for {path}");
    }
}
