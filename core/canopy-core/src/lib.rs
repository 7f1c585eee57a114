//! # canopy-core
//!
//! Enrichment and freshness pipeline for the canopy worktree dashboard.
//!
//! ## Design Principles
//!
//! - **Never crash the dashboard**: every failure in the per-worktree path ends
//!   as a deterministic fallback summary, not an error.
//! - **Hash-validated caching**: an AI status is reused only while the content
//!   fingerprint it was computed from still matches.
//! - **Async at the edges**: git subprocesses, AI calls and timers are async
//!   (tokio); policies such as [`TriggerPolicy`] and [`mood()`] are pure.
//! - **Seams as traits**: [`VcsSource`], [`AiClient`], [`CacheStore`],
//!   [`BranchMatcher`] and [`UpdateSink`] let tests swap in fakes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use canopy_core::CanopyEngine;
//!
//! let engine = CanopyEngine::new()?;
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let worktrees = engine.discover_worktrees(Path::new(".")).await?;
//! let enriched = engine.enrich(worktrees, Arc::new(tx)).await;
//! ```

// Public modules
pub mod ai;
pub mod analysis;
pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod fingerprint;
pub mod git;
pub mod issues;
pub mod mood;
pub mod patterns;
pub mod storage;
pub mod synth;
pub mod text;
pub mod trigger;
pub mod types;

mod shard;

// Re-export commonly used items at crate root
pub use ai::{AiClient, AiRequest, AiResponse, OpenAiClient, OutputSchema};
pub use analysis::WorktreeAnalyzer;
pub use cache::{CacheEntry, CacheStore, JsonFileStore, MemoryStore, SummaryCache};
pub use config::*;
pub use context::read_project_context;
pub use engine::{worktrees_from_entries, CanopyEngine};
pub use enrich::{
    mark_loading, EnrichmentOrchestrator, SummaryState, UpdateSink, WorktreeUpdate,
};
pub use error::{CanopyError, Result};
pub use fingerprint::{fingerprint_changes, fingerprint_files, Fingerprint, FingerprintBuilder};
pub use git::{ChangeCollector, CollectedChanges, GitCli, StatusSnapshot, VcsSource};
pub use issues::{is_skip_branch, BranchMatcher, IssueResolution, IssueResolver, RegexMatcher};
pub use mood::{mood, next_transition, run_mood_clock, Mood};
pub use storage::StorageConfig;
pub use synth::{SummarySynthesizer, SynthSettings};
pub use trigger::{
    run_trigger_loop, ChangeObservation, Completion, RunOutcome, TriggerAction, TriggerPolicy,
};
pub use types::*;
