//! `git` subprocess implementation of [`VcsSource`].

use super::{LineStat, StatusSnapshot, VcsSource};
use crate::error::{CanopyError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, root: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(root)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CanopyError::SourceUnavailable {
                root: root.to_path_buf(),
                details: format!("failed to spawn git: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CanopyError::SourceUnavailable {
                root: root.to_path_buf(),
                details: format!("git {} failed: {}", args.join(" "), stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Lists every worktree attached to the repository containing `repo_root`.
    pub async fn list_worktrees(&self, repo_root: &Path) -> Result<Vec<WorktreeEntry>> {
        let raw = self
            .run(repo_root, &["worktree", "list", "--porcelain"])
            .await?;
        Ok(parse_worktree_list(&raw))
    }

    /// Top-level directory of the worktree containing `path`.
    pub async fn toplevel(&self, path: &Path) -> Result<PathBuf> {
        let raw = self.run(path, &["rev-parse", "--show-toplevel"]).await?;
        Ok(PathBuf::from(raw.trim()))
    }
}

#[async_trait]
impl VcsSource for GitCli {
    async fn status(&self, worktree_root: &Path) -> Result<StatusSnapshot> {
        let raw = self
            .run(worktree_root, &["status", "--porcelain=v1", "-z", "-uall"])
            .await?;
        let mut snapshot = parse_status_porcelain(&raw);

        // Line counts are best-effort: a repository without commits has no HEAD.
        match self
            .run(worktree_root, &["diff", "--numstat", "-z", "HEAD"])
            .await
        {
            Ok(numstat) => snapshot.line_stats = parse_numstat(&numstat),
            Err(err) => {
                tracing::debug!(root = %worktree_root.display(), error = %err, "numstat unavailable");
            }
        }

        Ok(snapshot)
    }

    async fn diff(&self, worktree_root: &Path, base_branch: Option<&str>) -> Result<String> {
        let base = base_branch.unwrap_or("HEAD");
        match self.run(worktree_root, &["diff", base]).await {
            Ok(diff) => Ok(diff),
            Err(err) if base_branch.is_none() => {
                tracing::debug!(root = %worktree_root.display(), error = %err, "diff against HEAD failed, using index diff");
                self.run(worktree_root, &["diff"]).await
            }
            Err(err) => Err(err),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parses `git status --porcelain=v1 -z` output.
///
/// `-z` keeps paths verbatim (no C-style quoting of non-ASCII bytes). A rename
/// or copy record is followed by a second field holding the source path.
pub fn parse_status_porcelain(raw: &str) -> StatusSnapshot {
    let mut snapshot = StatusSnapshot::default();
    let mut fields = raw.split('\0');

    while let Some(record) = fields.next() {
        if record.len() < 4 || !record.is_char_boundary(3) {
            continue;
        }
        let (xy, path) = (&record[..2], record[3..].to_string());
        let x = xy.chars().next().unwrap_or(' ');
        let y = xy.chars().nth(1).unwrap_or(' ');

        if xy == "??" {
            snapshot.untracked.push(path);
        } else if xy == "!!" {
            continue;
        } else if x == 'R' || y == 'R' || x == 'C' || y == 'C' {
            // Source path.
            fields.next();
            snapshot.renamed.push(path);
        } else if x == 'D' || y == 'D' {
            snapshot.deleted.push(path);
        } else if x == 'A' {
            snapshot.created.push(path);
        } else {
            snapshot.modified.push(path);
        }
    }

    snapshot
}

/// Parses `git diff --numstat -z` output. Binary files (`-`) count as zero.
///
/// A rename record has an empty path field followed by the source and
/// destination paths as separate fields; the destination is kept.
pub fn parse_numstat(raw: &str) -> HashMap<String, LineStat> {
    let mut stats = HashMap::new();
    let mut fields = raw.split('\0');

    while let Some(record) = fields.next() {
        let parts: Vec<&str> = record.splitn(3, '\t').collect();
        if parts.len() < 3 {
            continue;
        }
        let path = if parts[2].is_empty() {
            fields.next();
            match fields.next() {
                Some(target) => target,
                None => continue,
            }
        } else {
            parts[2]
        };
        stats.insert(
            path.to_string(),
            LineStat {
                insertions: parts[0].parse().unwrap_or(0),
                deletions: parts[1].parse().unwrap_or(0),
            },
        );
    }
    stats
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    /// Short branch name, or `None` when detached or bare.
    pub branch: Option<String>,
    pub head: Option<String>,
}

/// Parses `git worktree list --porcelain` output.
pub fn parse_worktree_list(raw: &str) -> Vec<WorktreeEntry> {
    let mut entries = Vec::new();
    let mut current: Option<WorktreeEntry> = None;

    for line in raw.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(WorktreeEntry {
                path: PathBuf::from(path),
                branch: None,
                head: None,
            });
        } else if let Some(entry) = current.as_mut() {
            if let Some(head) = line.strip_prefix("HEAD ") {
                entry.head = Some(head.to_string());
            } else if let Some(branch) = line.strip_prefix("branch ") {
                let short = branch.strip_prefix("refs/heads/").unwrap_or(branch);
                entry.branch = Some(short.to_string());
            }
        }
    }

    if let Some(entry) = current {
        entries.push(entry);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_groups_by_kind() {
        let raw = " M src/lib.rs\0M  src/main.rs\0A  new.rs\0 D gone.rs\0R  moved.rs\0old.rs\0?? scratch.txt\0?? with space.txt\0";
        let snapshot = parse_status_porcelain(raw);

        assert_eq!(snapshot.modified, vec!["src/lib.rs", "src/main.rs"]);
        assert_eq!(snapshot.created, vec!["new.rs"]);
        assert_eq!(snapshot.deleted, vec!["gone.rs"]);
        assert_eq!(snapshot.renamed, vec!["moved.rs"]);
        assert_eq!(snapshot.untracked, vec!["scratch.txt", "with space.txt"]);
        assert!(!snapshot.is_clean());
    }

    #[test]
    fn test_parse_status_empty_is_clean() {
        assert!(parse_status_porcelain("").is_clean());
    }

    #[test]
    fn test_parse_numstat_handles_binary() {
        let stats = parse_numstat("10\t2\tsrc/lib.rs\0-\t-\tlogo.png\0");
        assert_eq!(
            stats.get("src/lib.rs"),
            Some(&LineStat {
                insertions: 10,
                deletions: 2
            })
        );
        assert_eq!(stats.get("logo.png"), Some(&LineStat::default()));
    }

    #[test]
    fn test_parse_status_keeps_non_ascii_paths_verbatim() {
        let snapshot = parse_status_porcelain("?? café.txt\0 M docs/naïve \"quoted\".md\0");

        assert_eq!(snapshot.untracked, vec!["café.txt"]);
        assert_eq!(snapshot.modified, vec!["docs/naïve \"quoted\".md"]);
    }

    #[test]
    fn test_parse_numstat_rename_uses_destination() {
        let stats = parse_numstat("3\t1\t\0old name.rs\0new name.rs\05\t0\tcafé.rs\0");

        assert_eq!(
            stats.get("new name.rs"),
            Some(&LineStat {
                insertions: 3,
                deletions: 1
            })
        );
        assert!(!stats.contains_key("old name.rs"));
        assert_eq!(stats.get("café.rs").map(|s| s.insertions), Some(5));
    }

    #[test]
    fn test_parse_worktree_list() {
        let raw = "worktree /code/app\nHEAD abc123\nbranch refs/heads/main\n\nworktree /code/app-feature\nHEAD def456\nbranch refs/heads/feature/issue-42\n\nworktree /code/app-detached\nHEAD 999999\ndetached\n";
        let entries = parse_worktree_list(raw);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].path, PathBuf::from("/code/app"));
        assert_eq!(entries[0].branch.as_deref(), Some("main"));
        assert_eq!(entries[1].branch.as_deref(), Some("feature/issue-42"));
        assert_eq!(entries[2].branch, None);
        assert_eq!(entries[2].head.as_deref(), Some("999999"));
    }

    #[tokio::test]
    async fn test_status_outside_repository_is_source_unavailable() {
        let temp = tempfile::tempdir().expect("temp dir");
        let missing = temp.path().join("does-not-exist");

        let err = GitCli::new().status(&missing).await.expect_err("missing dir");
        assert!(matches!(err, CanopyError::SourceUnavailable { .. }));
    }
}
