//! Per-worktree analysis: collect → fingerprint → cache → synthesize.
//!
//! [`WorktreeAnalyzer::generate_worktree_summary`] is what the orchestrator
//! calls for each card and never fails; every error collapses into one of the
//! fallback summaries in [`WorktreeSummary`].
//! [`WorktreeAnalyzer::analyze_status`] serves the trigger loop for the active
//! worktree and surfaces errors so the loop can keep the previous status.

use crate::cache::SummaryCache;
use crate::context::read_project_context;
use crate::error::{CanopyError, Result};
use crate::fingerprint::fingerprint_changes;
use crate::git::{ChangeCollector, CollectedChanges};
use crate::synth::SummarySynthesizer;
use crate::types::{AiStatus, Worktree, WorktreeSummary};
use std::path::Path;
use std::sync::Arc;

/// Default minimum diff size (chars) before the status path calls the AI.
pub const DEFAULT_MIN_DIFF_CHARS: usize = 50;

#[derive(Clone)]
pub struct WorktreeAnalyzer {
    collector: ChangeCollector,
    synth: SummarySynthesizer,
    cache: Option<Arc<SummaryCache>>,
    min_diff_chars: usize,
}

impl WorktreeAnalyzer {
    pub fn new(
        collector: ChangeCollector,
        synth: SummarySynthesizer,
        cache: Option<Arc<SummaryCache>>,
    ) -> Self {
        Self {
            collector,
            synth,
            cache,
            min_diff_chars: DEFAULT_MIN_DIFF_CHARS,
        }
    }

    pub fn with_min_diff_chars(mut self, min_diff_chars: usize) -> Self {
        self.min_diff_chars = min_diff_chars;
        self
    }

    pub fn collector(&self) -> &ChangeCollector {
        &self.collector
    }

    /// Summary line for one worktree card.
    pub async fn generate_worktree_summary(
        &self,
        worktree: &Worktree,
        base_branch: Option<&str>,
    ) -> WorktreeSummary {
        let branch = worktree.branch.as_str();
        let collected = match self
            .collector
            .collect(&worktree.id, &worktree.path, base_branch)
            .await
        {
            Ok(collected) => collected,
            Err(err) => {
                tracing::warn!(worktree = %worktree.id, error = %err, "Change collection failed");
                return WorktreeSummary::git_unavailable(branch);
            }
        };

        if collected.diff.trim().is_empty() {
            return WorktreeSummary::clean(branch);
        }

        let modified_count = collected.changes.changed_file_count;
        match self.status_for(&collected, &worktree.path).await {
            Ok(status) => WorktreeSummary {
                summary: status.display(),
                modified_count,
            },
            Err(CanopyError::AiUnconfigured) => {
                WorktreeSummary::service_unavailable(branch, modified_count)
            }
            Err(err) => {
                tracing::warn!(worktree = %worktree.id, error = %err, "Summary synthesis failed");
                WorktreeSummary::analysis_unavailable(branch, modified_count)
            }
        }
    }

    /// Status for the active worktree.
    ///
    /// `Ok(None)` when the worktree is clean or its diff does not exceed the
    /// minimum size; no AI call is made in either case.
    pub async fn analyze_status(
        &self,
        worktree_id: &str,
        root: &Path,
        base_branch: Option<&str>,
    ) -> Result<Option<AiStatus>> {
        let collected = self.collector.collect(worktree_id, root, base_branch).await?;
        let diff_chars = collected.diff.trim().chars().count();
        if diff_chars <= self.min_diff_chars {
            tracing::debug!(
                worktree = %worktree_id,
                diff_chars,
                min = self.min_diff_chars,
                "Diff below threshold; skipping AI status"
            );
            return Ok(None);
        }
        self.status_for(&collected, root).await.map(Some)
    }

    /// Cache-first synthesis. Only successful results are written back.
    async fn status_for(&self, collected: &CollectedChanges, root: &Path) -> Result<AiStatus> {
        let key = collected.changes.worktree_id.as_str();
        let fingerprint =
            fingerprint_changes(&collected.changes, &collected.diff, self.synth.model_tag());

        if let Some(hit) = self
            .cache
            .as_ref()
            .and_then(|cache| cache.lookup(key, &fingerprint))
        {
            return Ok(hit);
        }

        let context = read_project_context(root);
        let status = self.synth.synthesize(&collected.diff, context.as_deref()).await?;

        if let Some(cache) = &self.cache {
            cache
                .record(key, status.clone(), fingerprint, self.synth.model_tag())
                .await;
        }
        Ok(status)
    }
}
