//! Async generation runner with operator controls.
//!
//! [`run_generations`] drives the generation loop around a shared
//! [`MercatorEngine`]:
//!
//! - **Barrier**: the engine sits behind a `tokio::sync::Mutex`; a tick
//!   starts only after in-flight decisions and learning release the lock.
//! - **Environment channel**: environmental changes received on an `mpsc`
//!   channel are applied before the next tick.
//! - **Pause/resume and stop**: lock-free flags in [`RunnerControl`], with
//!   [`Notify`] to wake the loop.
//! - **Bounded runs**: stop after `max_generations` or on extinction.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify, mpsc};
use tracing::{info, warn};

use mercator_types::{EnvironmentalChange, GenerationReport};

use crate::clock;
use crate::engine::MercatorEngine;
use crate::error::{EngineError, RunnerError};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEndReason {
    /// The configured number of generations ran.
    MaxGenerationsReached,
    /// An operator requested a stop.
    OperatorStop,
    /// The population is empty.
    Extinction,
}

/// Result of a run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Why the run ended.
    pub end_reason: RunEndReason,
    /// Generations executed by this run.
    pub generations_run: u64,
    /// Report of the last generation, if any ran.
    pub last_report: Option<GenerationReport>,
}

/// Shared control state for a running simulation.
#[derive(Debug)]
pub struct RunnerControl {
    paused: AtomicBool,
    resume_notify: Notify,
    stop_requested: AtomicBool,
    stop_notify: Notify,
    tick_interval_ms: AtomicU64,
    max_generations: u64,
}

impl RunnerControl {
    /// Control state with the given pacing; `max_generations` 0 means
    /// unbounded.
    pub fn new(tick_interval_ms: u64, max_generations: u64) -> Self {
        Self {
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
            tick_interval_ms: AtomicU64::new(tick_interval_ms),
            max_generations,
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Whether the runner is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause before the next tick.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume and wake the loop.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_one();
    }

    async fn wait_if_paused(&self) {
        while self.paused.load(Ordering::Acquire) && !self.is_stop_requested() {
            self.resume_notify.notified().await;
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a clean stop after the current tick.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_one();
        self.resume_notify.notify_one();
    }

    /// Whether a stop was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Pacing
    // -----------------------------------------------------------------------

    /// Real-time milliseconds between ticks.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Relaxed)
    }

    /// Change the pause between ticks.
    pub fn set_tick_interval_ms(&self, ms: u64) {
        self.tick_interval_ms.store(ms, Ordering::Relaxed);
    }

    /// Generation bound (0 = unbounded).
    pub const fn max_generations(&self) -> u64 {
        self.max_generations
    }
}

/// Work done around each tick while the engine lock is held.
pub trait GenerationHook: Send {
    /// Called before the clock advances and the tick runs.
    fn before_tick(&mut self, engine: &mut MercatorEngine) -> Result<(), EngineError>;

    /// Called after a tick committed.
    fn after_tick(&mut self, _report: &GenerationReport, _engine: &MercatorEngine) {}
}

/// A hook that does nothing.
pub struct NoOpHook;

impl GenerationHook for NoOpHook {
    fn before_tick(&mut self, _engine: &mut MercatorEngine) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Run generations until a bound, a stop request or extinction.
///
/// Each iteration applies pending environmental changes, runs the hook,
/// advances the simulated clock by one generation and ticks.
pub async fn run_generations(
    engine: Arc<Mutex<MercatorEngine>>,
    control: Arc<RunnerControl>,
    mut changes: mpsc::Receiver<EnvironmentalChange>,
    hook: &mut dyn GenerationHook,
) -> Result<RunResult, RunnerError> {
    let mut generations_run: u64 = 0;
    let mut last_report: Option<GenerationReport> = None;

    info!(
        max_generations = control.max_generations(),
        tick_interval_ms = control.tick_interval_ms(),
        "generation runner starting"
    );

    let end_reason = loop {
        // --- Pause and stop ---
        if control.is_paused() {
            info!("runner paused, waiting for resume");
            control.wait_if_paused().await;
            info!("runner resumed");
        }
        if control.is_stop_requested() {
            info!("operator stop requested");
            break RunEndReason::OperatorStop;
        }

        // --- Tick under the barrier ---
        let report = {
            let mut guard = engine.lock().await;
            while let Ok(change) = changes.try_recv() {
                guard.apply_environmental_change(&change);
            }
            hook.before_tick(&mut guard)?;
            let secs = guard.config().population.generation_duration_secs;
            guard.advance(clock::seconds(secs))?;
            let report = guard.tick()?;
            hook.after_tick(&report, &guard);
            report
        };
        generations_run = generations_run.saturating_add(1);
        let population_after = report.population_after;
        last_report = Some(report);

        if population_after == 0 {
            warn!(generations_run, "population extinct");
            break RunEndReason::Extinction;
        }
        let max = control.max_generations();
        if max > 0 && generations_run >= max {
            info!(generations_run, max, "generation limit reached");
            break RunEndReason::MaxGenerationsReached;
        }

        // --- Pace ---
        let interval_ms = control.tick_interval_ms();
        if interval_ms > 0 {
            tokio::select! {
                () = tokio::time::sleep(std::time::Duration::from_millis(interval_ms)) => {}
                () = control.stop_notify.notified() => {}
            }
        }
    };

    info!(
        reason = ?end_reason,
        generations_run,
        final_generation = last_report.as_ref().map(|r| r.generation),
        "generation runner finished"
    );
    Ok(RunResult {
        end_reason,
        generations_run,
        last_report,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{DateTime, Utc};
    use mercator_agents::AgentSpec;

    use super::*;
    use crate::config::SimulationConfig;

    fn shared_engine(agents: usize) -> Arc<Mutex<MercatorEngine>> {
        let mut config = SimulationConfig::default();
        config.population.size = agents.max(1);
        let mut engine = MercatorEngine::new(config).unwrap();
        for i in 0..agents {
            let cooperation = f64::from(u32::try_from(i).unwrap()) * 7.0 % 100.0;
            engine
                .create_agent(&AgentSpec {
                    traits: BTreeMap::from([("cooperation".to_owned(), cooperation)]),
                    ..AgentSpec::default()
                })
                .unwrap();
        }
        Arc::new(Mutex::new(engine))
    }

    struct Counting(u64);

    impl GenerationHook for Counting {
        fn before_tick(&mut self, _engine: &mut MercatorEngine) -> Result<(), EngineError> {
            self.0 += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn runs_until_generation_limit() {
        let engine = shared_engine(12);
        let control = Arc::new(RunnerControl::new(0, 3));
        let (_tx, rx) = mpsc::channel(4);
        let mut hook = Counting(0);
        let result = run_generations(Arc::clone(&engine), control, rx, &mut hook)
            .await
            .unwrap();
        assert_eq!(result.end_reason, RunEndReason::MaxGenerationsReached);
        assert_eq!(result.generations_run, 3);
        assert_eq!(hook.0, 3);
        assert_eq!(engine.lock().await.generation(), 3);
    }

    #[tokio::test]
    async fn stop_before_start_runs_nothing() {
        let engine = shared_engine(4);
        let control = Arc::new(RunnerControl::new(0, 0));
        control.request_stop();
        let (_tx, rx) = mpsc::channel(4);
        let result = run_generations(engine, control, rx, &mut NoOpHook).await.unwrap();
        assert_eq!(result.end_reason, RunEndReason::OperatorStop);
        assert_eq!(result.generations_run, 0);
        assert!(result.last_report.is_none());
    }

    #[tokio::test]
    async fn empty_population_is_extinct() {
        let engine = shared_engine(0);
        let control = Arc::new(RunnerControl::new(0, 10));
        let (_tx, rx) = mpsc::channel(4);
        let result = run_generations(engine, control, rx, &mut NoOpHook).await.unwrap();
        assert_eq!(result.end_reason, RunEndReason::Extinction);
        assert_eq!(result.generations_run, 1);
    }

    #[tokio::test]
    async fn environmental_changes_apply_before_the_tick() {
        let engine = shared_engine(6);
        let control = Arc::new(RunnerControl::new(0, 1));
        let (tx, rx) = mpsc::channel(4);
        tx.send(EnvironmentalChange {
            change_type: "market_crash".to_owned(),
            magnitude: 80.0,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        })
        .await
        .unwrap();
        run_generations(Arc::clone(&engine), control, rx, &mut NoOpHook)
            .await
            .unwrap();
        assert_eq!(engine.lock().await.population_status().active_pressures, 1);
    }

    #[tokio::test]
    async fn stop_interrupts_the_pause_between_ticks() {
        let engine = shared_engine(4);
        let control = Arc::new(RunnerControl::new(60_000, 0));
        let (_tx, rx) = mpsc::channel(4);
        let handle = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { run_generations(engine, control, rx, &mut NoOpHook).await })
        };
        tokio::task::yield_now().await;
        control.request_stop();
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.end_reason, RunEndReason::OperatorStop);
    }
}
