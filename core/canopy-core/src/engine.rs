//! CanopyEngine - wires storage, config and the enrichment pipeline together.
//!
//! Clients (the CLI today) construct one engine and call into it; every
//! component is also usable on its own for tests or custom wiring.
//!
//! ```rust,ignore
//! use canopy_core::CanopyEngine;
//!
//! let engine = CanopyEngine::new()?;
//! let worktrees = engine.discover_worktrees(Path::new(".")).await?;
//! let enriched = engine.enrich(worktrees, Arc::new(tx)).await;
//! ```

use crate::ai::{AiClient, OpenAiClient};
use crate::analysis::WorktreeAnalyzer;
use crate::cache::{JsonFileStore, SummaryCache};
use crate::config::{load_config, CanopyConfig};
use crate::enrich::{EnrichmentOrchestrator, UpdateSink};
use crate::error::Result;
use crate::git::{ChangeCollector, GitCli, VcsSource, WorktreeEntry};
use crate::issues::IssueResolver;
use crate::storage::StorageConfig;
use crate::synth::{SummarySynthesizer, SynthSettings};
use crate::trigger::TriggerPolicy;
use crate::types::Worktree;
use std::path::Path;
use std::sync::Arc;

pub struct CanopyEngine {
    storage: StorageConfig,
    config: CanopyConfig,
    git: GitCli,
    cache: Arc<SummaryCache>,
    analyzer: WorktreeAnalyzer,
    orchestrator: EnrichmentOrchestrator,
    issues: IssueResolver,
}

impl CanopyEngine {
    /// Engine rooted at `~/.canopy`, talking to real git and the configured AI endpoint.
    pub fn new() -> Result<Self> {
        Self::with_storage(StorageConfig::from_home()?)
    }

    pub fn with_storage(storage: StorageConfig) -> Result<Self> {
        let config = load_config(&storage.config_file())?;
        let ai = OpenAiClient::from_config(&config.ai)?
            .map(|client| Arc::new(client) as Arc<dyn AiClient>);
        let cache = Arc::new(SummaryCache::open(Box::new(JsonFileStore::new(
            storage.status_cache_file(),
        ))));
        Ok(Self::with_parts(storage, config, Arc::new(GitCli::new()), ai, cache))
    }

    /// Fully injected construction, for tests and alternative backends.
    pub fn with_parts(
        storage: StorageConfig,
        config: CanopyConfig,
        vcs: Arc<dyn VcsSource>,
        ai: Option<Arc<dyn AiClient>>,
        cache: Arc<SummaryCache>,
    ) -> Self {
        let collector = ChangeCollector::new(vcs, config.limits.collected_diff_chars);
        let synth = SummarySynthesizer::new(ai.clone(), SynthSettings::from_config(&config));
        let analyzer = WorktreeAnalyzer::new(collector, synth, Some(Arc::clone(&cache)))
            .with_min_diff_chars(config.trigger.min_diff_chars);
        let orchestrator =
            EnrichmentOrchestrator::new(analyzer.clone(), config.enrichment.max_concurrent);
        let issues = IssueResolver::new(ai, &config.ai);

        Self {
            storage,
            config,
            git: GitCli::new(),
            cache,
            analyzer,
            orchestrator,
            issues,
        }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn config(&self) -> &CanopyConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SummaryCache> {
        &self.cache
    }

    pub fn analyzer(&self) -> &WorktreeAnalyzer {
        &self.analyzer
    }

    pub fn issues(&self) -> &IssueResolver {
        &self.issues
    }

    pub fn trigger_policy(&self) -> TriggerPolicy {
        TriggerPolicy::new(&self.config.trigger)
    }

    /// Worktrees of the repository containing `path`, the one holding
    /// `path` marked current.
    pub async fn discover_worktrees(&self, path: &Path) -> Result<Vec<Worktree>> {
        let current = self.git.toplevel(path).await?;
        let entries = self.git.list_worktrees(&current).await?;
        Ok(worktrees_from_entries(entries, &current))
    }

    /// Enriches `worktrees` against the configured base branch.
    pub async fn enrich(
        &self,
        worktrees: Vec<Worktree>,
        sink: Arc<dyn UpdateSink>,
    ) -> Vec<Worktree> {
        self.enrich_against(worktrees, self.config.enrichment.base_branch.as_deref(), sink)
            .await
    }

    pub async fn enrich_against(
        &self,
        worktrees: Vec<Worktree>,
        base_branch: Option<&str>,
        sink: Arc<dyn UpdateSink>,
    ) -> Vec<Worktree> {
        self.orchestrator
            .enrich_worktrees(worktrees, base_branch, sink)
            .await
    }
}

/// Converts porcelain entries into worktrees. Detached heads are labelled
/// with their short commit id.
pub fn worktrees_from_entries(entries: Vec<WorktreeEntry>, current_root: &Path) -> Vec<Worktree> {
    entries
        .into_iter()
        .map(|entry| {
            let branch = entry.branch.unwrap_or_else(|| match entry.head.as_deref() {
                Some(head) => format!("detached@{}", head.chars().take(7).collect::<String>()),
                None => "detached".to_string(),
            });
            let is_current = entry.path == current_root;
            Worktree::new(entry.path, branch).with_current(is_current)
        })
        .collect()
}
