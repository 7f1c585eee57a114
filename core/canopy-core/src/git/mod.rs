//! Version-control access for worktrees.
//!
//! - [`VcsSource`]: the seam the pipeline talks to (status + diff per root)
//! - [`GitCli`]: production implementation shelling out to `git`
//! - [`ChangeCollector`]: turns a status snapshot into [`WorktreeChanges`]
//!   plus a bounded diff blob for prompting
//!
//! [`WorktreeChanges`]: crate::types::WorktreeChanges

mod cli;
mod collector;

pub use cli::{parse_numstat, parse_status_porcelain, parse_worktree_list, GitCli, WorktreeEntry};
pub use collector::{ChangeCollector, CollectedChanges};

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// Inserted/deleted line counts for one path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineStat {
    pub insertions: u32,
    pub deletions: u32,
}

/// Raw file status grouped by kind, paths relative to the worktree root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub modified: Vec<String>,
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub renamed: Vec<String>,
    pub untracked: Vec<String>,
    /// Line counts for tracked paths; untracked files have none.
    pub line_stats: HashMap<String, LineStat>,
}

impl StatusSnapshot {
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty()
            && self.created.is_empty()
            && self.deleted.is_empty()
            && self.renamed.is_empty()
            && self.untracked.is_empty()
    }
}

/// A version-control data source, callable per worktree independently.
///
/// Failures surface as [`CanopyError::SourceUnavailable`]; callers turn that
/// into a fallback summary rather than propagating it to the UI.
///
/// [`CanopyError::SourceUnavailable`]: crate::error::CanopyError::SourceUnavailable
#[async_trait]
pub trait VcsSource: Send + Sync {
    async fn status(&self, worktree_root: &Path) -> Result<StatusSnapshot>;

    /// Unified diff of the working copy against `base_branch` (or `HEAD`).
    async fn diff(&self, worktree_root: &Path, base_branch: Option<&str>) -> Result<String>;
}
