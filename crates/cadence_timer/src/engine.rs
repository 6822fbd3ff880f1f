use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("timer engine requires a tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub activity_id: String,
    pub seconds: u64,
    pub running: bool,
}

#[derive(Debug)]
struct Running {
    started_at: Instant,
    baseline: u64,
    generation: u64,
    ticker: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct TimerEntry {
    seconds: u64,
    running: Option<Running>,
}

#[derive(Debug, Default)]
struct EngineState {
    entries: HashMap<String, TimerEntry>,
    next_generation: u64,
}

/// Per-activity stopwatch. At most one ticking task exists per id; every tick recomputes
/// the total from the captured start instant, so throttled ticks never lose time.
///
/// Start instants and tick scheduling both read tokio's clock, so paused test time drives
/// the whole engine.
pub struct TimerEngine {
    runtime: Handle,
    period: Duration,
    state: Mutex<EngineState>,
}

impl TimerEngine {
    pub fn new(runtime: Handle) -> Arc<Self> {
        Arc::new(Self {
            runtime,
            period: TICK_PERIOD,
            state: Mutex::new(EngineState::default()),
        })
    }

    /// Binds to the runtime of the calling task.
    pub fn current() -> Result<Arc<Self>, TimerError> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// Starts or resumes the timer for `id`. Returns `false` when it was already running.
    pub fn start(self: &Arc<Self>, id: &str) -> bool {
        let mut state = self.state.lock();
        state.next_generation += 1;
        let generation = state.next_generation;
        let entry = state.entries.entry(id.to_string()).or_default();
        if entry.running.is_some() {
            return false;
        }

        let started_at = Instant::now();
        let ticker = self.spawn_ticker(id.to_string(), generation, started_at);
        entry.running = Some(Running {
            started_at,
            baseline: entry.seconds,
            generation,
            ticker,
        });
        tracing::debug!(activity_id = id, baseline = entry.seconds, "timer started");
        true
    }

    /// Cancels the tick and keeps the last published value as the new baseline.
    pub fn pause(&self, id: &str) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.get_mut(id) {
            if let Some(running) = entry.running.take() {
                running.ticker.abort();
                tracing::debug!(activity_id = id, seconds = entry.seconds, "timer paused");
            }
        }
    }

    /// Pauses and then forgets the accumulated time.
    pub fn stop(&self, id: &str) {
        self.pause(id);
        if self.state.lock().entries.remove(id).is_some() {
            tracing::debug!(activity_id = id, "timer reset");
        }
    }

    pub fn seconds_for(&self, id: &str) -> u64 {
        self.state
            .lock()
            .entries
            .get(id)
            .map(|entry| entry.seconds)
            .unwrap_or(0)
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.state
            .lock()
            .entries
            .get(id)
            .is_some_and(|entry| entry.running.is_some())
    }

    pub fn running_ids(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut ids: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.running.is_some())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Every known timer, read under one lock so all surfaces see the same tick.
    pub fn snapshot(&self) -> Vec<TimerSnapshot> {
        let state = self.state.lock();
        let mut out: Vec<TimerSnapshot> = state
            .entries
            .iter()
            .map(|(id, entry)| TimerSnapshot {
                activity_id: id.clone(),
                seconds: entry.seconds,
                running: entry.running.is_some(),
            })
            .collect();
        out.sort_by(|a, b| a.activity_id.cmp(&b.activity_id));
        out
    }

    /// Cancels every ticking task. Accumulated values are kept, paused.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        let mut cancelled = 0usize;
        for entry in state.entries.values_mut() {
            if let Some(running) = entry.running.take() {
                running.ticker.abort();
                cancelled += 1;
            }
        }
        tracing::debug!(cancelled, "timer engine shut down");
    }

    fn spawn_ticker(
        self: &Arc<Self>,
        id: String,
        generation: u64,
        started_at: Instant,
    ) -> JoinHandle<()> {
        let engine: Weak<Self> = Arc::downgrade(self);
        let period = self.period;
        self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(started_at + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                if !engine.publish(&id, generation) {
                    break;
                }
            }
        })
    }

    /// Recomputes the total for a running timer. Returns `false` once this tick is stale.
    fn publish(&self, id: &str, generation: u64) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();
        let Some(entry) = state.entries.get_mut(id) else {
            return false;
        };
        let Some(running) = entry.running.as_ref() else {
            return false;
        };
        if running.generation != generation {
            return false;
        }
        let elapsed = now.saturating_duration_since(running.started_at).as_secs();
        let total = running.baseline + elapsed;
        entry.seconds = entry.seconds.max(total);
        tracing::trace!(activity_id = id, seconds = entry.seconds, "timer tick");
        true
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        for entry in self.state.get_mut().entries.values_mut() {
            if let Some(running) = entry.running.take() {
                running.ticker.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn engine() -> Arc<TimerEngine> {
        TimerEngine::current().expect("inside runtime")
    }

    #[tokio::test(start_paused = true)]
    async fn counts_wall_clock_seconds() {
        let engine = engine();
        assert!(engine.start("a1"));
        sleep(Duration::from_millis(65_500)).await;
        assert_eq!(engine.seconds_for("a1"), 65);
        assert!(engine.is_running("a1"));
    }

    #[tokio::test(start_paused = true)]
    async fn starting_twice_keeps_one_ticker() {
        let engine = engine();
        assert!(engine.start("a1"));
        assert!(!engine.start("a1"));
        assert_eq!(engine.running_ids(), vec!["a1".to_string()]);

        sleep(Duration::from_millis(3_500)).await;
        assert_eq!(engine.seconds_for("a1"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_is_idempotent_and_resume_accumulates() {
        let engine = engine();
        engine.start("a1");
        sleep(Duration::from_millis(3_500)).await;
        engine.pause("a1");
        let once = engine.seconds_for("a1");
        engine.pause("a1");
        assert_eq!(engine.seconds_for("a1"), once);
        assert_eq!(once, 3);
        assert!(!engine.is_running("a1"));

        sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.seconds_for("a1"), 3, "paused timers do not move");

        engine.start("a1");
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(engine.seconds_for("a1"), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_resets_to_zero() {
        let engine = engine();
        engine.start("a1");
        sleep(Duration::from_millis(5_500)).await;
        engine.stop("a1");
        assert_eq!(engine.seconds_for("a1"), 0);
        assert!(!engine.is_running("a1"));
        assert!(engine.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn catches_up_after_a_throttled_gap() {
        let engine = engine();
        engine.start("a1");
        tokio::time::advance(Duration::from_secs(10)).await;
        sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.seconds_for("a1"), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn timers_are_independent_per_activity() {
        let engine = engine();
        engine.start("a1");
        sleep(Duration::from_millis(2_500)).await;
        engine.start("a2");
        sleep(Duration::from_millis(2_200)).await;

        let snapshot = engine.snapshot();
        assert_eq!(
            snapshot,
            vec![
                TimerSnapshot {
                    activity_id: "a1".into(),
                    seconds: 4,
                    running: true
                },
                TimerSnapshot {
                    activity_id: "a2".into(),
                    seconds: 2,
                    running: true
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_all_ticks() {
        let engine = engine();
        engine.start("a1");
        engine.start("a2");
        sleep(Duration::from_millis(1_500)).await;
        engine.shutdown();
        assert!(engine.running_ids().is_empty());

        sleep(Duration::from_secs(5)).await;
        assert_eq!(engine.seconds_for("a1"), 1);
        assert_eq!(engine.seconds_for("a2"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_instant_and_ticks_share_tokio_time() {
        tokio::time::advance(Duration::from_secs(100)).await;
        let engine = TimerEngine::new(Handle::current());
        engine.start("a1");
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(engine.seconds_for("a1"), 2);
    }

    #[test]
    fn current_fails_outside_a_runtime() {
        assert!(matches!(TimerEngine::current(), Err(TimerError::NoRuntime(_))));
    }
}
