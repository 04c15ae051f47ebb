// Fixed-interval driver for the sync cycle.
//
// Cycles run one at a time on the blocking pool. A cycle that outlasts the
// interval delays the next tick; missed ticks are never replayed in a burst.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::SyncConfig;
use crate::git::cycle::{CycleOutcome, SyncCycle};
use crate::git::worker::CommandExecutor;

/// Anything that can run one sync attempt. Blocking is expected.
pub trait CycleRunner: Send + Sync + 'static {
    fn run_cycle(&self) -> CycleOutcome;
}

impl<E: CommandExecutor + 'static> CycleRunner for SyncCycle<E> {
    fn run_cycle(&self) -> CycleOutcome {
        self.run_cycle_at(Local::now())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Fire the first cycle immediately instead of after one interval.
    pub run_on_start: bool,
}

impl From<&SyncConfig> for SchedulerConfig {
    fn from(config: &SyncConfig) -> Self {
        Self { interval: config.interval(), run_on_start: config.run_on_start }
    }
}

/// Run one cycle off the async runtime and wait for it.
pub async fn run_cycle_blocking<R: CycleRunner>(runner: &Arc<R>) -> Option<CycleOutcome> {
    let runner = Arc::clone(runner);
    match tokio::task::spawn_blocking(move || runner.run_cycle()).await {
        Ok(outcome) => Some(outcome),
        Err(join_error) => {
            error!(error = %join_error, "sync cycle task failed");
            None
        }
    }
}

/// Drive `runner` every `config.interval` until `shutdown_rx` changes or its
/// sender is dropped. Returns the number of cycles that ran.
pub async fn run_forever<R: CycleRunner>(
    runner: Arc<R>,
    config: SchedulerConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> u64 {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if !config.run_on_start {
        ticker.reset(); // skip immediate first tick
    }

    let mut cycles = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                debug!("scheduler shutting down");
                break;
            }
            _ = ticker.tick() => {}
        }

        if let Some(outcome) = run_cycle_blocking(&runner).await {
            cycles += 1;
            info!(
                outcome = outcome.kind(),
                cycles,
                next_in_secs = config.interval.as_secs(),
                "sync cycle finished"
            );
        }
    }

    cycles
}
