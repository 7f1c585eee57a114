//! Concurrent fan-out of worktree analysis.
//!
//! Every worktree gets a `Loading` update as soon as enrichment starts and
//! exactly one `Loaded` update when its analysis ends, success or fallback.
//! Each worktree runs in its own task, so a panic or a slow endpoint in one
//! never delays or cancels the others. A semaphore bounds how many analyses
//! talk to the AI endpoint at once.

use crate::analysis::WorktreeAnalyzer;
use crate::types::{Worktree, WorktreeSummary};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

pub const DEFAULT_MAX_CONCURRENT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryState {
    Loading,
    Loaded(WorktreeSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeUpdate {
    pub worktree_id: String,
    pub state: SummaryState,
}

/// Receives incremental updates while a batch is enriched.
pub trait UpdateSink: Send + Sync {
    fn publish(&self, update: WorktreeUpdate);
}

impl UpdateSink for mpsc::UnboundedSender<WorktreeUpdate> {
    fn publish(&self, update: WorktreeUpdate) {
        if self.send(update).is_err() {
            tracing::trace!("Update receiver dropped");
        }
    }
}

pub struct EnrichmentOrchestrator {
    analyzer: Arc<WorktreeAnalyzer>,
    limit: Arc<Semaphore>,
}

impl EnrichmentOrchestrator {
    pub fn new(analyzer: WorktreeAnalyzer, max_concurrent: usize) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            limit: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Analyzes all worktrees concurrently.
    ///
    /// Returns the worktrees in input order with `summary` and
    /// `modified_count` filled in and `summary_loading` cleared.
    pub async fn enrich_worktrees(
        &self,
        mut worktrees: Vec<Worktree>,
        base_branch: Option<&str>,
        sink: Arc<dyn UpdateSink>,
    ) -> Vec<Worktree> {
        let base_branch = base_branch.map(str::to_string);
        let mut handles = Vec::with_capacity(worktrees.len());
        mark_loading(&mut worktrees);

        for worktree in &worktrees {
            sink.publish(WorktreeUpdate {
                worktree_id: worktree.id.clone(),
                state: SummaryState::Loading,
            });

            let analyzer = Arc::clone(&self.analyzer);
            let limit = Arc::clone(&self.limit);
            let sink = Arc::clone(&sink);
            let base_branch = base_branch.clone();
            let worktree = worktree.clone();

            handles.push(tokio::spawn(async move {
                let summary = match limit.acquire_owned().await {
                    Ok(_permit) => {
                        analyzer
                            .generate_worktree_summary(&worktree, base_branch.as_deref())
                            .await
                    }
                    Err(_) => WorktreeSummary::analysis_unavailable(
                        &worktree.branch,
                        worktree.modified_count,
                    ),
                };
                sink.publish(WorktreeUpdate {
                    worktree_id: worktree.id.clone(),
                    state: SummaryState::Loaded(summary.clone()),
                });
                summary
            }));
        }

        let mut enriched = Vec::with_capacity(worktrees.len());
        for (mut worktree, handle) in worktrees.into_iter().zip(handles) {
            let summary = match handle.await {
                Ok(summary) => summary,
                Err(err) => {
                    tracing::error!(worktree = %worktree.id, error = %err, "Enrichment task failed");
                    let fallback = WorktreeSummary::analysis_unavailable(
                        &worktree.branch,
                        worktree.modified_count,
                    );
                    sink.publish(WorktreeUpdate {
                        worktree_id: worktree.id.clone(),
                        state: SummaryState::Loaded(fallback.clone()),
                    });
                    fallback
                }
            };
            worktree.summary = Some(summary.summary);
            worktree.modified_count = summary.modified_count;
            worktree.summary_loading = false;
            enriched.push(worktree);
        }
        enriched
    }
}

/// Flags every worktree as awaiting a summary. Cleared again once its
/// `Loaded` update has been published.
pub fn mark_loading(worktrees: &mut [Worktree]) {
    for worktree in worktrees {
        worktree.summary_loading = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiClient, AiRequest, AiResponse};
    use crate::error::{CanopyError, Result};
    use crate::git::{ChangeCollector, StatusSnapshot, VcsSource};
    use crate::synth::{SummarySynthesizer, SynthSettings};
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Dirty everywhere except paths containing "clean"; panics on "panic"
    /// and fails on "broken".
    struct PathDrivenVcs;

    #[async_trait]
    impl VcsSource for PathDrivenVcs {
        async fn status(&self, root: &Path) -> Result<StatusSnapshot> {
            let root_str = root.to_string_lossy();
            if root_str.contains("panic") {
                panic!("vcs exploded");
            }
            if root_str.contains("broken") {
                return Err(CanopyError::SourceUnavailable {
                    root: root.to_path_buf(),
                    details: "corrupt index".into(),
                });
            }
            if root_str.contains("clean") {
                return Ok(StatusSnapshot::default());
            }
            Ok(StatusSnapshot {
                modified: vec!["src/main.rs".into()],
                ..StatusSnapshot::default()
            })
        }

        async fn diff(&self, root: &Path, _base: Option<&str>) -> Result<String> {
            Ok(format!("+change in {}", root.display()))
        }
    }

    struct SlowAi {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl AiClient for SlowAi {
        fn model(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _request: &AiRequest) -> Result<AiResponse> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(AiResponse::new(json!({
                "output_text": "{\"emoji\":\"🚧\",\"description\":\"Work in progress\"}"
            })))
        }
    }

    fn orchestrator(ai: Arc<SlowAi>, max_concurrent: usize) -> EnrichmentOrchestrator {
        let analyzer = WorktreeAnalyzer::new(
            ChangeCollector::new(Arc::new(PathDrivenVcs), 20_000),
            SummarySynthesizer::new(Some(ai as Arc<dyn AiClient>), SynthSettings::default()),
            None,
        );
        EnrichmentOrchestrator::new(analyzer, max_concurrent)
    }

    fn slow_ai() -> Arc<SlowAi> {
        Arc::new(SlowAi {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<WorktreeUpdate>) -> Vec<WorktreeUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_worktree_reports_loading_then_loaded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worktrees: Vec<Worktree> = (0..5)
            .map(|i| Worktree::new(format!("/repo/wt-{}", i), format!("feature/{}", i)))
            .collect();

        let enriched = orchestrator(slow_ai(), 4)
            .enrich_worktrees(worktrees, Some("main"), Arc::new(tx))
            .await;

        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 10);
        for wt in &enriched {
            let states: Vec<&SummaryState> = updates
                .iter()
                .filter(|u| u.worktree_id == wt.id)
                .map(|u| &u.state)
                .collect();
            assert_eq!(states.len(), 2, "worktree {}", wt.id);
            assert_eq!(states[0], &SummaryState::Loading);
            assert!(matches!(states[1], SummaryState::Loaded(_)));
            assert_eq!(wt.summary.as_deref(), Some("🚧 Work in progress"));
            assert_eq!(wt.modified_count, 1);
            assert!(!wt.summary_loading);
        }
        assert_eq!(enriched[3].id, "/repo/wt-3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_isolated() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worktrees = vec![
            Worktree::new("/repo/panic", "feature/boom"),
            Worktree::new("/repo/broken", "feature/corrupt"),
            Worktree::new("/repo/clean", "feature/idle"),
            Worktree::new("/repo/dirty", "feature/work"),
        ];

        let enriched = orchestrator(slow_ai(), 2)
            .enrich_worktrees(worktrees, None, Arc::new(tx))
            .await;

        let summaries: Vec<&str> = enriched
            .iter()
            .map(|wt| wt.summary.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(
            summaries,
            vec![
                "feature/boom (analysis unavailable)",
                "feature/corrupt (git unavailable)",
                "Clean: feature/idle",
                "🚧 Work in progress",
            ]
        );
        assert_eq!(drain(&mut rx).len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let ai = slow_ai();
        let (tx, _rx) = mpsc::unbounded_channel();
        let worktrees: Vec<Worktree> = (0..8)
            .map(|i| Worktree::new(format!("/repo/wt-{}", i), "feature/x"))
            .collect();

        orchestrator(ai.clone(), 3)
            .enrich_worktrees(worktrees, None, Arc::new(tx))
            .await;

        let peak = ai.peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak {}", peak);
    }

    #[test]
    fn test_mark_loading_flags_every_worktree() {
        let mut worktrees = vec![
            Worktree::new("/repo/a", "feature/a"),
            Worktree::new("/repo/b", "feature/b"),
        ];
        assert!(worktrees.iter().all(|wt| !wt.summary_loading));

        mark_loading(&mut worktrees);

        assert!(worktrees.iter().all(|wt| wt.summary_loading));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let enriched = orchestrator(slow_ai(), 4)
            .enrich_worktrees(Vec::new(), None, Arc::new(tx))
            .await;
        assert!(enriched.is_empty());
        assert!(drain(&mut rx).is_empty());
    }
}
