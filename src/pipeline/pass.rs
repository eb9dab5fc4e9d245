// src/pipeline/pass.rs

//! One full pass: dispatch, evaluate, persist.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Config, JobResult};
use crate::pipeline::{Evaluation, JobRunner, UpgradeEvaluator};
use crate::services::{FareClassifier, FlightSource, Notifier};
use crate::storage::{JobStore, SnapshotMetadata};

/// Summary of a finished pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub results: Vec<JobResult>,
    pub evaluation: Evaluation,
    /// `None` when the pass left the store unchanged
    pub snapshot: Option<SnapshotMetadata>,
    pub all_completed: bool,
}

/// Runner and evaluator wired together.
pub struct Pipeline {
    runner: JobRunner,
    evaluator: UpgradeEvaluator,
}

impl Pipeline {
    pub fn new(runner: JobRunner, evaluator: UpgradeEvaluator) -> Self {
        Self { runner, evaluator }
    }

    /// Wire a pipeline from configuration and the chosen collaborators.
    pub fn from_config(
        config: &Config,
        source: Arc<dyn FlightSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let runner = JobRunner::new(source, config.source.timeout(), config.expiry.grace_days);
        let classifier = FareClassifier::from_config(&config.classifier)?;
        let evaluator = UpgradeEvaluator::new(
            classifier,
            notifier,
            config.notifier.default_recipient.clone(),
        );
        Ok(Self::new(runner, evaluator))
    }

    pub async fn run_pass(&self, store: &mut JobStore) -> Result<PassReport> {
        self.run_pass_at(store, Utc::now()).await
    }

    /// Run a pass as of `now`.
    ///
    /// The snapshot is written once, after evaluation, so it carries the
    /// completion state the pass produced. Passes that neither dispatched a
    /// job nor completed one write nothing.
    pub async fn run_pass_at(
        &self,
        store: &mut JobStore,
        now: DateTime<Utc>,
    ) -> Result<PassReport> {
        let pending_before = store.pending_count();
        let results = self.runner.run_at(store, now).await;
        let evaluation = self.evaluator.evaluate(store, &results, now).await;

        let snapshot = if results.is_empty() && store.pending_count() == pending_before {
            log::debug!("Job set unchanged, skipping snapshot");
            None
        } else {
            Some(store.snapshot(&results).await?)
        };

        Ok(PassReport {
            results,
            evaluation,
            snapshot,
            all_completed: store.all_completed(),
        })
    }
}
