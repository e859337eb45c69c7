//! Recurring retention sweeps.
//!
//! [`RetentionScheduler::run`] is the single timer that drives sweeps. Each sweep runs on the
//! blocking pool and is awaited before the next tick is considered, so two sweeps never run at
//! the same time. Missed ticks are delayed rather than bunched up.

use crate::config::StorageConfig;
use facility_files::{RetentionSweeper, SweepReport};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Runs a [`RetentionSweeper`] on a fixed interval until told to stop.
#[derive(Debug, Clone)]
pub struct RetentionScheduler {
    sweeper: RetentionSweeper,
    interval: Duration,
}

impl RetentionScheduler {
    pub fn new(sweeper: RetentionSweeper, interval: Duration) -> Self {
        Self { sweeper, interval }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            RetentionSweeper::new(&config.path_policy(), config.retention_days()),
            config.sweep_interval(),
        )
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sweeps immediately, then once per interval, until `shutdown` becomes `true` or its
    /// sender is dropped. Returns the number of sweeps started.
    ///
    /// Shutdown is observed between sweeps. A sweep in progress is allowed to finish; if the
    /// process exits first, the partially swept tree is still valid.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            retention_days = self.sweeper.retention_days(),
            photos_root = %self.sweeper.photos_root().display(),
            "retention scheduler started"
        );

        let mut sweeps = 0usize;
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    sweeps += 1;
                    self.run_once().await;
                }
            }
        }

        tracing::info!(sweeps, "retention scheduler stopped");
        sweeps
    }

    /// Runs a single sweep on the blocking pool.
    ///
    /// Returns `None` if the sweep task panicked; the panic is logged and not propagated, so a
    /// single bad sweep cannot stop future ones.
    pub async fn run_once(&self) -> Option<SweepReport> {
        let sweeper = self.sweeper.clone();
        match tokio::task::spawn_blocking(move || sweeper.sweep()).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "retention sweep task failed");
                None
            }
        }
    }
}
