//! Store git adapter (§4.5) — shells out to the real `git` binary, matching
//! the worktree backend's invocation style. Owns init, a coalescing commit
//! queue, HEAD lookups, the three-way merge, and pull/push.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use crate::error::{Result, SyncError};

/// Opaque HEAD token (a commit hash) used by pull-mode to know the
/// pre-pull base (§4.5).
pub type HeadToken = String;

/// Outcome of a three-way textual merge (§4.5, §4.8 step 5e).
pub struct MergeOutcome {
    pub content: Vec<u8>,
    pub has_conflicts: bool,
}

/// Outcome of a `pull()` (§4.5).
pub struct PullOutcome {
    pub pre_pull_head: HeadToken,
    pub conflicted_paths: Vec<String>,
}

/// The store's git repository. One instance per engine process.
pub struct GitAdapter {
    root: PathBuf,
    /// Coalesces back-to-back `queue_commit` calls (§4.5): many queued
    /// messages collapse into the most recent one at flush time — the
    /// "last wins" policy from the open coalescing question (§9a).
    pending_message: Mutex<Option<String>>,
}

impl GitAdapter {
    /// Initialise the store as a git repository if one is not already
    /// present at `root`.
    pub fn init(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let adapter = Self {
            root: root.to_path_buf(),
            pending_message: Mutex::new(None),
        };
        if !root.join(".git").exists() {
            adapter.run(&["init"])?;
            adapter.run(&["config", "user.name", "syncd"])?;
            adapter.run(&["config", "user.email", "syncd@localhost"])?;
        }
        let gitignore = root.join(".gitignore");
        if !gitignore.exists() {
            std::fs::write(&gitignore, ".db/\n")?;
        }
        Ok(adapter)
    }

    fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()?;
        Ok(output)
    }

    fn run_ok(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args)?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(SyncError::GitCommand {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                exit_code: output.status.code(),
            })
        }
    }

    /// Queue a commit message; `flush_commit` coalesces repeated calls.
    pub fn queue_commit(&self, message: &str) {
        let mut pending = self.pending_message.lock().expect("adapter mutex poisoned");
        *pending = Some(message.to_owned());
    }

    /// Stage everything under the store root and commit the coalesced
    /// message, if any mutation is pending. No-op (and no error) when
    /// nothing changed since the last flush.
    pub fn flush_commit(&self) -> Result<()> {
        let message = {
            let mut pending = self.pending_message.lock().expect("adapter mutex poisoned");
            pending.take()
        };
        let Some(message) = message else {
            return Ok(());
        };

        self.run_ok(&["add", "-A"])?;
        let status = self.run_ok(&["status", "--porcelain"])?;
        if status.trim().is_empty() {
            return Ok(());
        }
        self.run_ok(&["commit", "-m", &message])?;
        Ok(())
    }

    /// The three-way-merge base for a file (§4.5, §4.8 step 5a): its
    /// content at the most recent commit that added or modified it, or
    /// `None` if it has never been committed. Deliberately *not* a plain
    /// `HEAD:path` read — a path that was deleted and later recreated
    /// (§4.8's `missing_* -> conflict` transition) must still resolve to
    /// the content it held right before the deletion, not `None`, so the
    /// reappearance is reconciled against its true last-synced ancestor
    /// rather than treated as brand new.
    pub fn committed_content(&self, relative_path: &str) -> Result<Option<Vec<u8>>> {
        let log = self.run(&[
            "log",
            "--diff-filter=AM",
            "-1",
            "--format=%H",
            "--",
            relative_path,
        ])?;
        if !log.status.success() {
            return Ok(None);
        }
        let hash = String::from_utf8_lossy(&log.stdout).trim().to_owned();
        if hash.is_empty() {
            return Ok(None);
        }
        let output = self.run(&["show", &format!("{hash}:{relative_path}")])?;
        if output.status.success() {
            Ok(Some(output.stdout))
        } else {
            Ok(None)
        }
    }

    /// An opaque token identifying the current HEAD.
    pub fn head_hash(&self) -> Result<HeadToken> {
        match self.run_ok(&["rev-parse", "HEAD"]) {
            Ok(hash) => Ok(hash.trim().to_owned()),
            Err(SyncError::GitCommand { .. }) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    /// Line-level three-way textual merge, identical in marker format and
    /// conflict detection to `git merge-file --stdout --diff3` (§4.5, §9).
    pub fn three_way_merge(&self, base: &[u8], ours: &[u8], theirs: &[u8]) -> Result<MergeOutcome> {
        let dir = tempfile::tempdir()?;
        let ours_path = dir.path().join("ours");
        let base_path = dir.path().join("base");
        let theirs_path = dir.path().join("theirs");
        std::fs::write(&ours_path, ours)?;
        std::fs::write(&base_path, base)?;
        std::fs::write(&theirs_path, theirs)?;

        let output = Command::new("git")
            .arg("merge-file")
            .arg("-p")
            .arg("--diff3")
            .arg(&ours_path)
            .arg(&base_path)
            .arg(&theirs_path)
            .output()?;

        match output.status.code() {
            Some(0) => Ok(MergeOutcome {
                content: output.stdout,
                has_conflicts: false,
            }),
            Some(n) if n > 0 => Ok(MergeOutcome {
                content: output.stdout,
                has_conflicts: true,
            }),
            code => Err(SyncError::GitCommand {
                command: "git merge-file -p --diff3 <ours> <base> <theirs>".to_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                exit_code: code,
            }),
        }
    }

    /// Pull from the configured remote, completing the merge with "ours"
    /// for textually conflicting files (§4.5). Returns the pre-pull HEAD
    /// and the set of paths git's merge marked conflicted.
    pub fn pull(&self) -> Result<PullOutcome> {
        let pre_pull_head = self.head_hash()?;
        let result = self.run(&["pull", "--no-rebase", "-X", "ours"]);
        let conflicted_paths = self.conflicted_paths()?;
        match result {
            Ok(output) if output.status.success() => Ok(PullOutcome {
                pre_pull_head,
                conflicted_paths,
            }),
            Ok(output) => Err(SyncError::Remote {
                operation: "pull",
                detail: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            }),
            Err(e) => Err(SyncError::Remote {
                operation: "pull",
                detail: e.to_string(),
            }),
        }
    }

    fn conflicted_paths(&self) -> Result<Vec<String>> {
        let output = self.run(&["diff", "--name-only", "--diff-filter=U"])?;
        if !output.status.success() {
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_owned)
            .collect())
    }

    /// Push the current branch to the configured remote (§4.5).
    pub fn push(&self) -> Result<()> {
        let output = self.run(&["push"])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SyncError::Remote {
                operation: "push",
                detail: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn init_store() -> (tempfile::TempDir, GitAdapter) {
        let dir = tempdir().unwrap();
        let adapter = GitAdapter::init(dir.path()).unwrap();
        (dir, adapter)
    }

    #[test]
    fn init_creates_git_dir() {
        let (dir, _adapter) = init_store();
        assert!(dir.path().join(".git").exists());
    }

    #[test]
    fn flush_commit_is_noop_without_pending_message() {
        let (_dir, adapter) = init_store();
        adapter.flush_commit().unwrap();
    }

    #[test]
    fn queue_and_flush_commits_staged_file() {
        let (dir, adapter) = init_store();
        std::fs::write(dir.path().join("AGENTS.md"), "hello").unwrap();
        adapter.queue_commit("add AGENTS.md");
        adapter.flush_commit().unwrap();

        let content = adapter.committed_content("AGENTS.md").unwrap();
        assert_eq!(content, Some(b"hello".to_vec()));
    }

    #[test]
    fn committed_content_is_none_for_unknown_path() {
        let (_dir, adapter) = init_store();
        assert_eq!(adapter.committed_content("missing.md").unwrap(), None);
    }

    #[test]
    fn committed_content_survives_a_delete_commit() {
        let (dir, adapter) = init_store();
        std::fs::write(dir.path().join("AGENTS.md"), "original").unwrap();
        adapter.queue_commit("add AGENTS.md");
        adapter.flush_commit().unwrap();

        std::fs::remove_file(dir.path().join("AGENTS.md")).unwrap();
        adapter.queue_commit("remove AGENTS.md");
        adapter.flush_commit().unwrap();

        // HEAD no longer has the path, but the last add/modify snapshot
        // is still the right three-way-merge base for a later recreate.
        assert_eq!(
            adapter.committed_content("AGENTS.md").unwrap(),
            Some(b"original".to_vec())
        );
    }

    #[test]
    fn three_way_merge_clean_on_non_overlapping_edits() {
        let (_dir, adapter) = init_store();
        let base = b"Line 1\nLine 2\nLine 3\n";
        let ours = b"Line 0\nLine 1\nLine 2\nLine 3\n";
        let theirs = b"Line 1\nLine 2\nLine 3\nLine 4\n";
        let outcome = adapter.three_way_merge(base, ours, theirs).unwrap();
        assert!(!outcome.has_conflicts);
        assert_eq!(
            outcome.content,
            b"Line 0\nLine 1\nLine 2\nLine 3\nLine 4\n".to_vec()
        );
    }

    #[test]
    fn three_way_merge_conflicts_on_overlapping_edits() {
        let (_dir, adapter) = init_store();
        let base = b"greeting = hello\n";
        let ours = b"greeting = bonjour\n";
        let theirs = b"greeting = hola\n";
        let outcome = adapter.three_way_merge(base, ours, theirs).unwrap();
        assert!(outcome.has_conflicts);
        let text = String::from_utf8_lossy(&outcome.content);
        assert!(text.contains("bonjour"));
        assert!(text.contains("hola"));
    }
}
