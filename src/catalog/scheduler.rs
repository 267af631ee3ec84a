//! Fixed-interval driver for the catalog refresher
//!
//! The scheduler runs its first cycle as soon as it starts, then one cycle per
//! interval. Cycles never overlap: an overrunning cycle defers the next tick
//! until it finishes and missed ticks collapse into one. A stop request is
//! only observed while waiting for a tick, so a running cycle always ends.

use crate::catalog::refresher::CatalogRefresher;
use crate::error::{ListerError, Result};
use crate::logging::Logger;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick
    Idle,
    /// A refresh cycle is in flight
    Running,
    Stopped,
}

pub struct Scheduler {
    refresher: Arc<CatalogRefresher>,
    interval: Duration,
    output: Logger,
}

impl Scheduler {
    /// Fails on a zero interval, which `tokio::time::interval` cannot tick on
    pub fn new(refresher: Arc<CatalogRefresher>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(ListerError::Config(
                "Refresh interval must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            refresher,
            interval,
            output: Logger::default(),
        })
    }

    pub fn with_output(mut self, output: Logger) -> Self {
        self.output = output;
        self
    }

    /// Spawn the refresh loop on the current runtime.
    ///
    /// Dropping the returned handle detaches the loop; it then runs for the
    /// rest of the process.
    pub fn start(self) -> SchedulerHandle {
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(state_tx, stop_rx));

        SchedulerHandle {
            stop_tx,
            state_rx,
            task,
        }
    }

    async fn run(self, state: watch::Sender<SchedulerState>, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.output.info(&format!(
            "Catalog refresh scheduled every {}",
            self.output.format_duration(self.interval)
        ));

        let mut cycle: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => break,
                _ = ticker.tick() => {}
            }

            cycle += 1;
            state.send_replace(SchedulerState::Running);
            self.run_cycle()
                .instrument(tracing::info_span!("refresh_cycle", cycle))
                .await;
            state.send_replace(SchedulerState::Idle);
        }

        state.send_replace(SchedulerState::Stopped);
        self.output.info("Catalog refresh stopped");
    }

    async fn run_cycle(&self) {
        match self.refresher.refresh().await {
            Ok(report) => {
                self.output.success(&format!(
                    "Published snapshot with {} repositories ({} skipped, {} in catalog) in {}",
                    report.snapshot.len(),
                    report.skipped.len(),
                    report.catalog_size,
                    self.output.format_duration(report.elapsed)
                ));
            }
            // The refresher already reported the failure; the old snapshot stays.
            Err(e) => self.output.debug(&format!("Cycle ended without publishing: {}", e)),
        }
    }
}

/// Resolves once a stop has been requested. If the handle is gone no stop can
/// arrive, so it never resolves.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<SchedulerState>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state_rx.clone()
    }

    /// Ask the loop to stop and wait for the in-flight cycle, if any, to end
    pub async fn shutdown(self) -> Result<()> {
        self.stop_tx.send_replace(true);
        self.task
            .await
            .map_err(|e| ListerError::Task(format!("Scheduler task failed: {}", e)))
    }
}
