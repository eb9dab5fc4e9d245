// src/pipeline/scheduler.rs

//! Fixed-interval pass scheduling.

use std::future::Future;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};

use crate::pipeline::Pipeline;
use crate::storage::JobStore;

/// Why the scheduler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerExit {
    /// Every job is completed; the process should exit with code 0
    AllCompleted,
    /// Shutdown was requested
    Shutdown,
}

/// Triggers a pass immediately and then every `interval`.
pub struct Scheduler {
    pipeline: Pipeline,
    interval: Duration,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    /// Run passes until every job completes or `shutdown` resolves.
    ///
    /// Passes run inline, so a tick that fires while a pass is still running
    /// is dropped rather than starting a second pass over the same store.
    pub async fn run<F>(&self, store: &mut JobStore, shutdown: F) -> SchedulerExit
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        log::info!(
            "Scheduler started: {} jobs, checking every {} min",
            store.len(),
            self.interval.as_secs() / 60
        );

        let mut pass_number = 0u64;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested, stopping scheduler");
                    return SchedulerExit::Shutdown;
                }
                _ = ticker.tick() => {}
            }

            pass_number += 1;
            log::info!(
                "Pass #{} starting ({} of {} jobs pending)",
                pass_number,
                store.pending_count(),
                store.len()
            );

            let outcome = tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested during pass #{}, stopping scheduler", pass_number);
                    return SchedulerExit::Shutdown;
                }
                outcome = self.pipeline.run_pass(store) => outcome,
            };

            match outcome {
                Ok(report) => {
                    log::info!(
                        "Pass #{} complete: {} results, {} upgrades, {} failed, {} expired",
                        pass_number,
                        report.results.len(),
                        report.evaluation.upgrades.len(),
                        report.evaluation.failed,
                        report.evaluation.expired
                    );
                    if let Some(snapshot) = &report.snapshot {
                        log::debug!(
                            "Pass #{} snapshot {} saved at {}",
                            pass_number,
                            snapshot.location.display(),
                            snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
                        );
                    }
                }
                Err(e) => log::error!("Pass #{} failed: {}", pass_number, e),
            }

            if store.all_completed() {
                log::info!("All jobs completed, exiting");
                return SchedulerExit::AllCompleted;
            }
        }
    }
}
