//! Core types shared between the enrichment pipeline and its clients.
//!
//! `Worktree` and `WorktreeChanges` are rebuilt on every polling cycle.
//! `AiStatus` values are immutable once synthesized and outlive those cycles
//! through the status cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// Worktree Types
// ═══════════════════════════════════════════════════════════════════════════════

/// A git working copy tracked by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worktree {
    pub id: String,
    pub path: PathBuf,
    pub name: String,
    pub branch: String,
    pub is_current: bool,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub summary_loading: bool,
    #[serde(default)]
    pub modified_count: u32,
}

impl Worktree {
    /// Creates a worktree with no summary yet. The id is the root path.
    pub fn new(path: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            id: path.to_string_lossy().to_string(),
            path,
            name,
            branch: branch.into(),
            is_current: false,
            summary: None,
            summary_loading: false,
            modified_count: 0,
        }
    }

    pub fn with_current(mut self, is_current: bool) -> Self {
        self.is_current = is_current;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Change Types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Modified,
    Added,
    Deleted,
    Renamed,
    Untracked,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Modified => "modified",
            FileStatus::Added => "added",
            FileStatus::Deleted => "deleted",
            FileStatus::Renamed => "renamed",
            FileStatus::Untracked => "untracked",
        }
    }
}

/// One changed file, relative to the worktree root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub status: FileStatus,
    pub insertions: u32,
    pub deletions: u32,
}

/// Full change set for a worktree at one point in time.
///
/// Always built wholesale through [`WorktreeChanges::new`] so the derived
/// counters can never drift from `changes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorktreeChanges {
    pub worktree_id: String,
    pub root_path: PathBuf,
    pub changes: Vec<FileChange>,
    pub changed_file_count: u32,
    pub total_insertions: u32,
    pub total_deletions: u32,
    pub last_updated: DateTime<Utc>,
    /// Most recent mtime (epoch ms) among changed files that still exist.
    #[serde(default)]
    pub last_modified_ms: Option<i64>,
}

impl WorktreeChanges {
    pub fn new(
        worktree_id: impl Into<String>,
        root_path: impl Into<PathBuf>,
        changes: Vec<FileChange>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        let total_insertions = changes.iter().map(|c| c.insertions).sum();
        let total_deletions = changes.iter().map(|c| c.deletions).sum();
        Self {
            worktree_id: worktree_id.into(),
            root_path: root_path.into(),
            changed_file_count: changes.len() as u32,
            changes,
            total_insertions,
            total_deletions,
            last_updated,
            last_modified_ms: None,
        }
    }

    pub fn with_last_modified(mut self, last_modified_ms: Option<i64>) -> Self {
        self.last_modified_ms = last_modified_ms;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Status Types
// ═══════════════════════════════════════════════════════════════════════════════

/// AI-generated one-line status for a working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiStatus {
    pub emoji: String,
    pub description: String,
}

impl AiStatus {
    pub fn display(&self) -> String {
        format!("{} {}", self.emoji, self.description)
    }
}

/// Final summary line shown on a worktree card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeSummary {
    pub summary: String,
    pub modified_count: u32,
}

impl WorktreeSummary {
    pub fn clean(branch: &str) -> Self {
        Self {
            summary: format!("Clean: {}", branch),
            modified_count: 0,
        }
    }

    pub fn analysis_unavailable(branch: &str, modified_count: u32) -> Self {
        Self {
            summary: format!("{} (analysis unavailable)", branch),
            modified_count,
        }
    }

    pub fn git_unavailable(branch: &str) -> Self {
        Self {
            summary: format!("{} (git unavailable)", branch),
            modified_count: 0,
        }
    }

    pub fn service_unavailable(branch: &str, modified_count: u32) -> Self {
        Self {
            summary: format!("{} (AI service unavailable)", branch),
            modified_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(path: &str, status: FileStatus, insertions: u32, deletions: u32) -> FileChange {
        FileChange {
            path: path.to_string(),
            status,
            insertions,
            deletions,
        }
    }

    #[test]
    fn test_changes_derive_counts_from_sequence() {
        let changes = WorktreeChanges::new(
            "wt",
            "/repo",
            vec![
                change("src/lib.rs", FileStatus::Modified, 10, 2),
                change("README.md", FileStatus::Added, 5, 0),
                change("old.rs", FileStatus::Deleted, 0, 40),
            ],
            Utc::now(),
        );

        assert_eq!(changes.changed_file_count, 3);
        assert_eq!(changes.total_insertions, 15);
        assert_eq!(changes.total_deletions, 42);
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_empty_changes_are_valid() {
        let changes = WorktreeChanges::new("wt", "/repo", vec![], Utc::now());
        assert_eq!(changes.changed_file_count, 0);
        assert_eq!(changes.total_insertions, 0);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_worktree_new_derives_name_and_id() {
        let wt = Worktree::new("/code/app-feature", "feature/login");
        assert_eq!(wt.id, "/code/app-feature");
        assert_eq!(wt.name, "app-feature");
        assert!(!wt.summary_loading);
        assert!(!wt.is_current);
    }

    #[test]
    fn test_fallback_templates() {
        assert_eq!(WorktreeSummary::clean("main").summary, "Clean: main");
        assert_eq!(
            WorktreeSummary::analysis_unavailable("feat", 4),
            WorktreeSummary {
                summary: "feat (analysis unavailable)".to_string(),
                modified_count: 4
            }
        );
        assert_eq!(
            WorktreeSummary::git_unavailable("feat").summary,
            "feat (git unavailable)"
        );
    }
}
