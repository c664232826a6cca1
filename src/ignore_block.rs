//! Ignore-block manager (§4.6) — the idempotent managed segment of a
//! target repo's `.gitignore`, plus untracking newly-ignored paths from the
//! git index.

use std::path::Path;
use std::process::Command;

use crate::error::Result;

const START_MARKER: &str = "# >>> syncd managed patterns >>>";
const END_MARKER: &str = "# <<< syncd managed patterns <<<";

/// Legacy marker recognised for backward compatibility (§4.6, §6): older
/// installations may use this start line and omit an end marker entirely.
const LEGACY_START_MARKER: &str = "# sync-managed:v0";

/// Render the managed segment body for `roots` (already root-level,
/// folder-suffixed as appropriate — see [`crate::patterns::derive_gitignore_roots`]).
fn render_segment(roots: &[String]) -> String {
    let mut out = String::new();
    out.push_str(START_MARKER);
    out.push('\n');
    for root in roots {
        out.push_str(root);
        out.push('\n');
    }
    out.push_str(END_MARKER);
    out.push('\n');
    out
}

/// Rewrite the managed segment of `gitignore_path` to exactly match `roots`,
/// preserving any content outside the segment. Idempotent: re-running with
/// the same `roots` produces byte-identical content (§4.6, §8).
pub fn apply(gitignore_path: &Path, roots: &[String]) -> Result<()> {
    let existing = match std::fs::read_to_string(gitignore_path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let (before, after) = split_out_segment(&existing);
    let mut rebuilt = before;
    if !rebuilt.is_empty() && !rebuilt.ends_with('\n') {
        rebuilt.push('\n');
    }
    rebuilt.push_str(&render_segment(roots));
    rebuilt.push_str(&after);

    std::fs::write(gitignore_path, rebuilt)?;
    Ok(())
}

/// Split `content` into `(before_segment, after_segment)`, removing any
/// existing managed segment (current or legacy marker form) so it can be
/// rebuilt from scratch.
fn split_out_segment(content: &str) -> (String, String) {
    let lines: Vec<&str> = content.lines().collect();

    if let Some(start) = lines.iter().position(|l| *l == START_MARKER) {
        let end = lines
            .iter()
            .skip(start + 1)
            .position(|l| *l == END_MARKER)
            .map_or(lines.len(), |offset| start + 1 + offset + 1);
        let before = lines[..start].join("\n");
        let after_start = end.min(lines.len());
        let after = lines[after_start..].join("\n");
        return (with_trailing_blank(before), with_trailing_blank(after));
    }

    if let Some(start) = lines.iter().position(|l| *l == LEGACY_START_MARKER) {
        // Legacy installations may omit an end marker: treat "until the
        // next blank line" as the segment's extent (§4.6 compatibility).
        let end = lines
            .iter()
            .skip(start + 1)
            .position(|l| l.trim().is_empty())
            .map_or(lines.len(), |offset| start + 1 + offset);
        let before = lines[..start].join("\n");
        let after = lines[end..].join("\n");
        return (with_trailing_blank(before), with_trailing_blank(after));
    }

    (with_trailing_blank(content.to_owned()), String::new())
}

fn with_trailing_blank(s: String) -> String {
    if s.is_empty() { s } else { format!("{s}\n") }
}

/// For each of `relative_paths` currently tracked by git in `repo_root`,
/// remove it from the index while keeping the working-tree copy (§4.6).
pub fn untrack_newly_ignored(repo_root: &Path, relative_paths: &[String]) -> Result<()> {
    if relative_paths.is_empty() {
        return Ok(());
    }
    let tracked = list_tracked(repo_root)?;
    let to_untrack: Vec<&String> = relative_paths.iter().filter(|p| tracked.contains(*p)).collect();
    if to_untrack.is_empty() {
        return Ok(());
    }

    let mut args = vec!["rm", "--cached", "-r", "--"];
    args.extend(to_untrack.iter().map(|s| s.as_str()));
    let output = Command::new("git")
        .args(&args)
        .current_dir(repo_root)
        .output()?;
    if !output.status.success() {
        return Err(crate::error::SyncError::GitCommand {
            command: format!("git {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            exit_code: output.status.code(),
        });
    }
    Ok(())
}

fn list_tracked(repo_root: &Path) -> Result<std::collections::HashSet<String>> {
    let output = Command::new("git")
        .args(["ls-files"])
        .current_dir(repo_root)
        .output()?;
    if !output.status.success() {
        return Ok(std::collections::HashSet::new());
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_owned)
        .collect())
}
