//! `canopy watch`: keeps the active worktree's status and mood fresh.
//!
//! File events (notify) are coalesced for a short settle period, then the
//! change set is re-collected and fed to the trigger loop. The mood clock
//! follows the time of the most recent relevant event.

use canopy_core::{
    run_mood_clock, run_trigger_loop, AiStatus, CanopyEngine, CanopyError, ChangeObservation,
    Mood, Result, Worktree,
};
use chrono::Utc;
use notify::{EventKind, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};

const SETTLE: Duration = Duration::from_millis(300);

/// Paths inside `.git` or common build output never count as edits.
fn is_relevant(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    !relative.components().any(|c| match c {
        Component::Normal(name) => {
            matches!(name.to_str(), Some(".git" | "target" | "node_modules"))
        }
        _ => false,
    })
}

fn active_worktree(worktrees: Vec<Worktree>, path: &Path) -> Result<Worktree> {
    worktrees
        .into_iter()
        .find(|wt| wt.is_current)
        .ok_or_else(|| CanopyError::SourceUnavailable {
            root: path.to_path_buf(),
            details: "no worktree contains this path".to_string(),
        })
}

fn print_status(status: Option<&AiStatus>, worktree: &Worktree) {
    match status {
        Some(status) => println!("[status] {}", status.display()),
        None => println!("[status] Clean: {}", worktree.branch),
    }
}

pub async fn run(engine: CanopyEngine, path: PathBuf) -> Result<()> {
    run_until(engine, path, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Runs the watch loop until `shutdown` resolves or the watcher goes away.
async fn run_until<F>(engine: CanopyEngine, path: PathBuf, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()>,
{
    let worktree = active_worktree(engine.discover_worktrees(&path).await?, &path)?;
    let root = worktree.path.clone();
    let base = engine.config().enrichment.base_branch.clone();
    println!("Watching {} ({})", root.display(), worktree.branch);

    // Filesystem events → unbounded channel (notify calls back on its own thread).
    let (fs_tx, mut fs_rx) = mpsc::unbounded_channel::<()>();
    let watch_root = root.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                if event.paths.iter().any(|p| is_relevant(&watch_root, p)) {
                    let _ = fs_tx.send(());
                }
            }
            Err(err) => tracing::warn!(error = %err, "File watcher error"),
        }
    })
    .map_err(|e| CanopyError::SourceUnavailable {
        root: root.clone(),
        details: format!("file watcher unavailable: {}", e),
    })?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| CanopyError::SourceUnavailable {
            root: root.clone(),
            details: format!("cannot watch: {}", e),
        })?;

    // Trigger loop for the status line.
    let analyzer = Arc::new(engine.analyzer().clone());
    let (obs_tx, obs_rx) = mpsc::unbounded_channel::<ChangeObservation>();
    let (status_tx, mut status_rx) = watch::channel::<Option<AiStatus>>(None);
    let analyze = {
        let analyzer = Arc::clone(&analyzer);
        let id = worktree.id.clone();
        let root = root.clone();
        let base = base.clone();
        move || {
            let analyzer = Arc::clone(&analyzer);
            let id = id.clone();
            let root = root.clone();
            let base = base.clone();
            async move { analyzer.analyze_status(&id, &root, base.as_deref()).await }
        }
    };
    let trigger = tokio::spawn(run_trigger_loop(
        engine.trigger_policy(),
        obs_rx,
        analyze,
        status_tx,
    ));

    // Mood clock.
    let (last_change_tx, last_change_rx) = watch::channel::<Option<i64>>(None);
    let (mood_tx, mut mood_rx) = watch::channel(Mood::Idle);
    let clock = tokio::spawn(run_mood_clock(
        last_change_rx,
        mood_tx,
        engine.config().mood.clone(),
    ));

    let collector = analyzer.collector().clone();
    let mut probe_at: Option<Instant> = Some(Instant::now());
    let mut first_probe = true;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = fs_rx.recv() => {
                if event.is_none() {
                    break;
                }
                last_change_tx.send_replace(Some(Utc::now().timestamp_millis()));
                probe_at = Some(Instant::now() + SETTLE);
            }
            _ = sleep_until(probe_at.unwrap_or_else(Instant::now)), if probe_at.is_some() => {
                probe_at = None;
                match collector.collect(&worktree.id, &root, base.as_deref()).await {
                    Ok(collected) => {
                        if first_probe {
                            last_change_tx.send_replace(collected.changes.last_modified_ms);
                            first_probe = false;
                        }
                        println!(
                            "[changes] {} files (+{} -{})",
                            collected.changes.changed_file_count,
                            collected.changes.total_insertions,
                            collected.changes.total_deletions
                        );
                        let _ = obs_tx.send(ChangeObservation {
                            changed_files: collected.changes.changed_file_count,
                        });
                    }
                    Err(err) => tracing::warn!(error = %err, "Change collection failed"),
                }
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                print_status(status_rx.borrow_and_update().as_ref(), &worktree);
            }
            changed = mood_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("[mood] {}", mood_rx.borrow_and_update().label());
            }
            _ = &mut shutdown => {
                tracing::info!("Interrupted; stopping watch");
                break;
            }
        }
    }

    drop(watcher);
    drop(obs_tx);
    drop(last_change_tx);
    let _ = trigger.await;
    let _ = clock.await;
    Ok(())
}
