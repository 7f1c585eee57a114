//! `canopy status`: one-shot enrichment of every worktree.

use canopy_core::{CanopyEngine, Result, SummaryState, WorktreeUpdate};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

pub async fn run(engine: CanopyEngine, repo: PathBuf, base: Option<String>) -> Result<()> {
    let worktrees = engine.discover_worktrees(&repo).await?;
    if worktrees.is_empty() {
        println!("No worktrees found");
        return Ok(());
    }

    let names: HashMap<String, String> = worktrees
        .iter()
        .map(|wt| (wt.id.clone(), wt.name.clone()))
        .collect();
    let (tx, mut rx) = mpsc::unbounded_channel::<WorktreeUpdate>();
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            let name = names
                .get(&update.worktree_id)
                .map(String::as_str)
                .unwrap_or(update.worktree_id.as_str());
            match update.state {
                SummaryState::Loading => println!("  … {:<24} analyzing", name),
                SummaryState::Loaded(summary) => println!("  ✓ {:<24} {}", name, summary.summary),
            }
        }
    });

    let base = base.or_else(|| engine.config().enrichment.base_branch.clone());
    let enriched = engine
        .enrich_against(worktrees, base.as_deref(), Arc::new(tx))
        .await;
    if let Err(err) = printer.await {
        tracing::warn!(error = %err, "Update printer stopped early");
    }

    println!();
    for wt in &enriched {
        let issue = engine
            .issues()
            .resolve(&wt.branch)
            .await
            .issue_number()
            .map(|n| format!("#{}", n))
            .unwrap_or_default();
        println!(
            "{} {:<24} {:<28} {:>6} {:>3} files  {}",
            if wt.is_current { "*" } else { " " },
            wt.name,
            wt.branch,
            issue,
            wt.modified_count,
            wt.summary.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}
