//! Builds [`WorktreeChanges`] and a prompt-ready diff for one worktree.

use super::{StatusSnapshot, VcsSource};
use crate::error::Result;
use crate::text::truncate_chars;
use crate::types::{FileChange, FileStatus, WorktreeChanges};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

/// Result of one collection pass.
#[derive(Debug, Clone)]
pub struct CollectedChanges {
    pub changes: WorktreeChanges,
    /// Unified diff followed by a list of untracked files, truncated to the
    /// collector's limit.
    pub diff: String,
    pub diff_truncated: bool,
}

#[derive(Clone)]
pub struct ChangeCollector {
    source: Arc<dyn VcsSource>,
    max_diff_chars: usize,
}

impl ChangeCollector {
    pub fn new(source: Arc<dyn VcsSource>, max_diff_chars: usize) -> Self {
        Self {
            source,
            max_diff_chars,
        }
    }

    /// Queries status and diff for `root`.
    ///
    /// A clean worktree is a normal result with zero changes; only a failing
    /// VCS query is an error.
    pub async fn collect(
        &self,
        worktree_id: &str,
        root: &Path,
        base_branch: Option<&str>,
    ) -> Result<CollectedChanges> {
        let snapshot = self.source.status(root).await?;
        let changes = build_file_changes(&snapshot);

        let diff = if changes.is_empty() {
            String::new()
        } else {
            let mut diff = self.source.diff(root, base_branch).await?;
            if !snapshot.untracked.is_empty() {
                if !diff.is_empty() && !diff.ends_with('\n') {
                    diff.push('\n');
                }
                for path in &snapshot.untracked {
                    diff.push_str("new untracked file: ");
                    diff.push_str(path);
                    diff.push('\n');
                }
            }
            diff
        };
        let (diff, diff_truncated) = truncate_chars(&diff, self.max_diff_chars);

        let last_modified_ms = latest_mtime_ms(root, &changes).await;
        let changes = WorktreeChanges::new(worktree_id, root, changes, Utc::now())
            .with_last_modified(last_modified_ms);

        tracing::debug!(
            worktree = %worktree_id,
            files = changes.changed_file_count,
            insertions = changes.total_insertions,
            deletions = changes.total_deletions,
            diff_truncated,
            "Collected worktree changes"
        );

        Ok(CollectedChanges {
            changes,
            diff,
            diff_truncated,
        })
    }
}

/// Flattens a snapshot into one sorted list of file changes.
pub(crate) fn build_file_changes(snapshot: &StatusSnapshot) -> Vec<FileChange> {
    let groups: [(&Vec<String>, FileStatus); 5] = [
        (&snapshot.modified, FileStatus::Modified),
        (&snapshot.created, FileStatus::Added),
        (&snapshot.deleted, FileStatus::Deleted),
        (&snapshot.renamed, FileStatus::Renamed),
        (&snapshot.untracked, FileStatus::Untracked),
    ];

    let mut changes: Vec<FileChange> = groups
        .iter()
        .flat_map(|(paths, status)| {
            paths.iter().map(move |path| {
                let stat = snapshot.line_stats.get(path).copied().unwrap_or_default();
                FileChange {
                    path: path.clone(),
                    status: *status,
                    insertions: stat.insertions,
                    deletions: stat.deletions,
                }
            })
        })
        .collect();

    changes.sort_by(|a, b| a.path.cmp(&b.path));
    changes
}

async fn latest_mtime_ms(root: &Path, changes: &[FileChange]) -> Option<i64> {
    let mut latest: Option<i64> = None;
    for change in changes {
        if change.status == FileStatus::Deleted {
            continue;
        }
        let Ok(metadata) = tokio::fs::metadata(root.join(&change.path)).await else {
            continue;
        };
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64);
        if let Some(mtime) = mtime {
            latest = Some(latest.map_or(mtime, |current| current.max(mtime)));
        }
    }
    latest
}
