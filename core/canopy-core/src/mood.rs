//! Time-decaying activity indicator.
//!
//! `active` for 30s after the last change, `cooldown` until 90s, then `idle`.
//! [`run_mood_clock`] recomputes only at those boundaries and sleeps
//! indefinitely once idle.

use crate::config::MoodConfig;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Active,
    Cooldown,
    Idle,
}

impl Mood {
    pub fn label(&self) -> &'static str {
        match self {
            Mood::Active => "active",
            Mood::Cooldown => "cooldown",
            Mood::Idle => "idle",
        }
    }
}

fn mood_for_elapsed(elapsed_ms: i64, config: &MoodConfig) -> Mood {
    if elapsed_ms < config.active_ms {
        Mood::Active
    } else if elapsed_ms < config.cooldown_ms {
        Mood::Cooldown
    } else {
        Mood::Idle
    }
}

/// Milliseconds since the change, with timestamps from the future treated
/// as "just now".
fn elapsed_ms(last_change_ms: i64, now_ms: i64) -> i64 {
    now_ms.saturating_sub(last_change_ms).max(0)
}

/// Mood for a last-change timestamp (epoch ms). `None` and `0` mean "never".
pub fn mood(last_change_ms: Option<i64>, now_ms: i64, config: &MoodConfig) -> Mood {
    match last_change_ms.filter(|ts| *ts > 0) {
        Some(ts) => mood_for_elapsed(elapsed_ms(ts, now_ms), config),
        None => Mood::Idle,
    }
}

fn until_next_boundary(elapsed_ms: i64, config: &MoodConfig) -> Option<Duration> {
    let boundary = match mood_for_elapsed(elapsed_ms, config) {
        Mood::Active => config.active_ms,
        Mood::Cooldown => config.cooldown_ms,
        Mood::Idle => return None,
    };
    Some(Duration::from_millis((boundary - elapsed_ms).max(0) as u64))
}

/// Time until the mood next changes on its own; `None` once idle.
pub fn next_transition(
    last_change_ms: Option<i64>,
    now_ms: i64,
    config: &MoodConfig,
) -> Option<Duration> {
    let ts = last_change_ms.filter(|ts| *ts > 0)?;
    until_next_boundary(elapsed_ms(ts, now_ms), config)
}

/// Last change, pinned to the monotonic clock when it was received.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    received_at: Instant,
    elapsed_at_receipt: Duration,
}

impl Anchor {
    fn from_timestamp(last_change_ms: Option<i64>) -> Option<Self> {
        let ts = last_change_ms.filter(|ts| *ts > 0)?;
        let elapsed = elapsed_ms(ts, Utc::now().timestamp_millis());
        Some(Self {
            received_at: Instant::now(),
            elapsed_at_receipt: Duration::from_millis(elapsed as u64),
        })
    }

    fn elapsed_ms(&self) -> i64 {
        let total = self.elapsed_at_receipt + self.received_at.elapsed();
        i64::try_from(total.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Publishes the mood for the latest timestamp on `last_change`.
///
/// Wakes up only when the timestamp changes or a boundary is crossed.
/// Returns when the `last_change` sender is dropped.
pub async fn run_mood_clock(
    mut last_change: watch::Receiver<Option<i64>>,
    mood_tx: watch::Sender<Mood>,
    config: MoodConfig,
) {
    let mut anchor = Anchor::from_timestamp(*last_change.borrow_and_update());

    loop {
        let (current, wait) = match anchor {
            Some(anchor) => {
                let elapsed = anchor.elapsed_ms();
                (mood_for_elapsed(elapsed, &config), until_next_boundary(elapsed, &config))
            }
            None => (Mood::Idle, None),
        };
        mood_tx.send_if_modified(|mood| {
            let changed = *mood != current;
            *mood = current;
            changed
        });

        tokio::select! {
            changed = last_change.changed() => {
                if changed.is_err() {
                    break;
                }
                anchor = Anchor::from_timestamp(*last_change.borrow_and_update());
            }
            _ = sleep(wait.unwrap_or_default()), if wait.is_some() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MoodConfig {
        MoodConfig::default()
    }

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_mood_boundaries() {
        let c = config();
        assert_eq!(mood(None, NOW, &c), Mood::Idle);
        assert_eq!(mood(Some(0), NOW, &c), Mood::Idle);
        assert_eq!(mood(Some(NOW), NOW, &c), Mood::Active);
        assert_eq!(mood(Some(NOW - 29_999), NOW, &c), Mood::Active);
        assert_eq!(mood(Some(NOW - 30_000), NOW, &c), Mood::Cooldown);
        assert_eq!(mood(Some(NOW - 89_999), NOW, &c), Mood::Cooldown);
        assert_eq!(mood(Some(NOW - 90_000), NOW, &c), Mood::Idle);
    }

    #[test]
    fn test_future_timestamp_counts_as_active() {
        assert_eq!(mood(Some(NOW + 5_000), NOW, &config()), Mood::Active);
    }

    #[test]
    fn test_next_transition() {
        let c = config();
        assert_eq!(
            next_transition(Some(NOW - 10_000), NOW, &c),
            Some(Duration::from_millis(20_000))
        );
        assert_eq!(
            next_transition(Some(NOW - 30_000), NOW, &c),
            Some(Duration::from_millis(60_000))
        );
        assert_eq!(next_transition(Some(NOW - 90_000), NOW, &c), None);
        assert_eq!(next_transition(None, NOW, &c), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Mood::Cooldown.label(), "cooldown");
        assert_eq!(
            serde_json::to_string(&Mood::Active).unwrap(),
            "\"active\""
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_steps_through_moods_then_goes_quiet() {
        let (last_tx, last_rx) = watch::channel(None);
        let (mood_tx, mut mood_rx) = watch::channel(Mood::Idle);
        let handle = tokio::spawn(run_mood_clock(last_rx, mood_tx, config()));

        last_tx.send_replace(Some(Utc::now().timestamp_millis()));
        mood_rx.changed().await.unwrap();
        assert_eq!(*mood_rx.borrow_and_update(), Mood::Active);

        let start = Instant::now();
        mood_rx.changed().await.unwrap();
        assert_eq!(*mood_rx.borrow_and_update(), Mood::Cooldown);
        let waited = start.elapsed();
        assert!(waited <= Duration::from_secs(30), "waited {:?}", waited);
        assert!(waited >= Duration::from_secs(29), "waited {:?}", waited);

        mood_rx.changed().await.unwrap();
        assert_eq!(*mood_rx.borrow_and_update(), Mood::Idle);
        assert!(start.elapsed() >= Duration::from_secs(89));

        // Idle: no timer left, so a long sleep sees no further updates.
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        assert!(!mood_rx.has_changed().unwrap());

        drop(last_tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_change_reactivates() {
        let old = Utc::now().timestamp_millis() - 60_000;
        let (last_tx, last_rx) = watch::channel(Some(old));
        let (mood_tx, mut mood_rx) = watch::channel(Mood::Idle);
        let handle = tokio::spawn(run_mood_clock(last_rx, mood_tx, config()));

        mood_rx.changed().await.unwrap();
        assert_eq!(*mood_rx.borrow_and_update(), Mood::Cooldown);

        last_tx.send_replace(Some(Utc::now().timestamp_millis()));
        mood_rx.changed().await.unwrap();
        assert_eq!(*mood_rx.borrow_and_update(), Mood::Active);

        drop(last_tx);
        handle.await.unwrap();
    }
}
