//! When to re-run status analysis for the active worktree.
//!
//! [`TriggerPolicy`] is a pure state machine: it consumes change-set
//! observations, timer expiries and analysis completions, and answers with a
//! [`TriggerAction`]. [`run_trigger_loop`] owns the actual timer and the
//! in-flight analysis task and applies those actions.
//!
//! ```text
//!            change (non-empty)          timer fires
//!   idle ─────────────────────▶ pending ─────────────▶ analyzing ──▶ idle
//!     ▲         (restart on change)                       │
//!     └────────────── change during run: queue a rerun ◀──┘
//! ```
//!
//! Runs never overlap. A result is only accepted when no status clear
//! happened while it was in flight; the generation counter tracks that.

use crate::config::TriggerConfig;
use crate::error::Result;
use crate::types::AiStatus;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    /// Start an analysis immediately.
    RunNow,
    /// (Re)start the debounce timer with this delay.
    Schedule(Duration),
    /// Drop the current status and any pending timer.
    ClearStatus,
    /// A run is in flight; another one follows when it finishes.
    Queued,
    Nothing,
}

/// How an analysis run ended, as far as the policy cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Status,
    NoStatus,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Whether the result may replace the displayed status.
    pub accepted: bool,
    pub next: TriggerAction,
}

#[derive(Debug, Clone)]
pub struct TriggerPolicy {
    debounce_with_status: Duration,
    debounce_without_status: Duration,
    started: bool,
    has_status: bool,
    last_non_empty: bool,
    analyzing: bool,
    rerun_queued: bool,
    generation: u64,
}

impl TriggerPolicy {
    pub fn new(config: &TriggerConfig) -> Self {
        Self {
            debounce_with_status: config.debounce_with_status(),
            debounce_without_status: config.debounce_without_status(),
            started: false,
            has_status: false,
            last_non_empty: false,
            analyzing: false,
            rerun_queued: false,
            generation: 0,
        }
    }

    pub fn has_status(&self) -> bool {
        self.has_status
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn debounce(&self) -> Duration {
        if self.has_status {
            self.debounce_with_status
        } else {
            self.debounce_without_status
        }
    }

    /// Feeds one observation of the change set.
    ///
    /// The first observation is the startup evaluation: it runs immediately
    /// whatever the size of the change set and never clears anything.
    pub fn on_changes(&mut self, non_empty: bool) -> TriggerAction {
        let was_non_empty = std::mem::replace(&mut self.last_non_empty, non_empty);

        if !self.started {
            self.started = true;
            return if self.analyzing {
                self.rerun_queued = true;
                TriggerAction::Queued
            } else {
                TriggerAction::RunNow
            };
        }

        if !non_empty {
            self.rerun_queued = false;
            if was_non_empty || self.has_status {
                self.has_status = false;
                self.generation += 1;
                return TriggerAction::ClearStatus;
            }
            return TriggerAction::Nothing;
        }

        if self.analyzing {
            self.rerun_queued = true;
            return TriggerAction::Queued;
        }
        TriggerAction::Schedule(self.debounce())
    }

    /// The debounce timer fired.
    pub fn on_timer(&mut self) -> TriggerAction {
        if self.analyzing {
            self.rerun_queued = true;
            TriggerAction::Queued
        } else {
            TriggerAction::RunNow
        }
    }

    /// Marks a run as started and returns the generation it belongs to.
    pub fn begin_analysis(&mut self) -> u64 {
        self.analyzing = true;
        self.generation
    }

    pub fn finish_analysis(&mut self, generation: u64, outcome: RunOutcome) -> Completion {
        self.analyzing = false;
        let accepted = generation == self.generation;
        if accepted {
            match outcome {
                RunOutcome::Status => self.has_status = true,
                RunOutcome::NoStatus => self.has_status = false,
                RunOutcome::Failed => {}
            }
        }

        let next = if std::mem::take(&mut self.rerun_queued) && self.last_non_empty {
            TriggerAction::Schedule(self.debounce())
        } else {
            TriggerAction::Nothing
        };
        Completion { accepted, next }
    }
}

/// One observation of the active worktree's change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeObservation {
    pub changed_files: u32,
}

impl ChangeObservation {
    pub fn is_empty(&self) -> bool {
        self.changed_files == 0
    }
}

type Running = (u64, JoinHandle<Result<Option<AiStatus>>>);

async fn join_running(
    running: &mut Option<Running>,
) -> (u64, std::result::Result<Result<Option<AiStatus>>, JoinError>) {
    match running {
        Some((generation, handle)) => (*generation, handle.await),
        None => std::future::pending().await,
    }
}

/// Drives `policy` until the observation channel closes.
///
/// `analyze` is called once per run; its result is published on `status`
/// when the policy accepts it. Failed runs keep the previous status.
pub async fn run_trigger_loop<F, Fut>(
    mut policy: TriggerPolicy,
    mut observations: mpsc::UnboundedReceiver<ChangeObservation>,
    analyze: F,
    status: watch::Sender<Option<AiStatus>>,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Option<AiStatus>>> + Send + 'static,
{
    let mut deadline: Option<Instant> = None;
    let mut running: Option<Running> = None;

    loop {
        let action = tokio::select! {
            observation = observations.recv() => match observation {
                Some(observation) => policy.on_changes(!observation.is_empty()),
                None => break,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                policy.on_timer()
            }
            (generation, joined) = join_running(&mut running), if running.is_some() => {
                running = None;
                let (outcome, produced) = match joined {
                    Ok(Ok(Some(produced))) => (RunOutcome::Status, Some(Some(produced))),
                    Ok(Ok(None)) => (RunOutcome::NoStatus, Some(None)),
                    Ok(Err(err)) => {
                        tracing::warn!(error = %err, "Status analysis failed; keeping previous status");
                        (RunOutcome::Failed, None)
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "Status analysis task aborted");
                        (RunOutcome::Failed, None)
                    }
                };
                let completion = policy.finish_analysis(generation, outcome);
                match (completion.accepted, produced) {
                    (true, Some(produced)) => {
                        status.send_replace(produced);
                    }
                    (false, _) => {
                        tracing::debug!(generation, "Discarding superseded status result")
                    }
                    _ => {}
                }
                completion.next
            }
        };

        match action {
            TriggerAction::RunNow => {
                deadline = None;
                let generation = policy.begin_analysis();
                tracing::debug!(generation, "Starting status analysis");
                running = Some((generation, tokio::spawn(analyze())));
            }
            TriggerAction::Schedule(delay) => {
                tracing::trace!(delay_ms = delay.as_millis() as u64, "Debounce timer (re)started");
                deadline = Some(Instant::now() + delay);
            }
            TriggerAction::ClearStatus => {
                deadline = None;
                status.send_replace(None);
            }
            TriggerAction::Queued | TriggerAction::Nothing => {}
        }
    }

    if let Some((_, handle)) = running {
        handle.abort();
    }
}
