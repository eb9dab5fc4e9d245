// src/pipeline/evaluate.rs

//! Upgrade evaluation of a runner batch.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::{Flight, Job, JobId, JobResult, UpgradeMatch};
use crate::services::{FareClassifier, Notifier, upgrade_message};
use crate::storage::JobStore;

/// Counters for one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// Confirmed upgrades, one per `(job, fare class)`
    pub upgrades: Vec<(JobId, UpgradeMatch)>,
    /// Alerts handed to the notifier successfully
    pub notified: usize,
    /// Alerts the notifier rejected
    pub notify_failures: usize,
    /// Jobs retired because the itinerary became unsearchable
    pub expired: usize,
    /// Jobs whose flight showed no target inventory
    pub no_upgrade: usize,
    /// Jobs with a transient failure, retried next tick
    pub failed: usize,
}

/// Classifies located flights and alerts on target-class inventory.
pub struct UpgradeEvaluator {
    classifier: FareClassifier,
    notifier: Arc<dyn Notifier>,
    default_recipient: Option<String>,
}

impl UpgradeEvaluator {
    pub fn new(
        classifier: FareClassifier,
        notifier: Arc<dyn Notifier>,
        default_recipient: Option<String>,
    ) -> Self {
        Self {
            classifier,
            notifier,
            default_recipient,
        }
    }

    /// Evaluate a batch, completing jobs in `store` as upgrades are confirmed.
    pub async fn evaluate(
        &self,
        store: &mut JobStore,
        results: &[JobResult],
        now: DateTime<Utc>,
    ) -> Evaluation {
        let mut evaluation = Evaluation::default();
        let mut alerted: HashSet<(JobId, String)> = HashSet::new();

        for result in results {
            let id = result.job_id();
            let label = store.position(id).unwrap_or(0);
            let Some(job) = store.get(id).cloned() else {
                log::warn!("[Job #{}] Result for unknown job {}, ignoring", label, id);
                continue;
            };
            if job.completed {
                log::debug!("[Job #{}] Already completed, ignoring result", label);
                continue;
            }

            match (&result.flight, &result.error) {
                (_, Some(failure)) if failure.is_terminal() => {
                    log::info!("[Job #{}] Itinerary no longer searchable: {}", label, failure);
                    self.complete(store, &job, now);
                    evaluation.expired += 1;
                }
                (_, Some(failure)) => {
                    log::warn!("[Job #{}] {}", label, failure);
                    evaluation.failed += 1;
                }
                (Some(flight), None) => {
                    self.evaluate_flight(store, label, &job, flight, now, &mut alerted, &mut evaluation)
                        .await;
                }
                (None, None) => {
                    log::warn!("[Job #{}] Result has neither flight nor error", label);
                }
            }
        }

        evaluation
    }

    #[allow(clippy::too_many_arguments)]
    async fn evaluate_flight(
        &self,
        store: &mut JobStore,
        label: usize,
        job: &Job,
        flight: &Flight,
        now: DateTime<Utc>,
        alerted: &mut HashSet<(JobId, String)>,
        evaluation: &mut Evaluation,
    ) {
        let target = &job.itinerary.target_class;
        let matches: Vec<UpgradeMatch> = self
            .classifier
            .classify(flight)
            .into_iter()
            .filter(|m| &m.fare_class == target)
            .collect();

        if matches.is_empty() {
            log::info!("[Job #{}] No upgrade for target class {}", label, target);
            evaluation.no_upgrade += 1;
            return;
        }

        for upgrade in matches {
            if !alerted.insert((job.id.clone(), upgrade.fare_class.clone())) {
                log::debug!(
                    "[Job #{}] Duplicate {} availability, already alerted",
                    label,
                    upgrade.fare_class
                );
                continue;
            }

            log::info!(
                "[Job #{}] Upgrade found: {} x{}",
                label,
                upgrade.fare_class,
                upgrade.quantity
            );
            let message = upgrade_message(&job.itinerary, &upgrade);
            match job.address.as_deref().or(self.default_recipient.as_deref()) {
                Some(address) => match self.notifier.notify(address, &message).await {
                    Ok(()) => evaluation.notified += 1,
                    Err(e) => {
                        log::error!("[Job #{}] {}", label, e);
                        evaluation.notify_failures += 1;
                    }
                },
                None => log::warn!("[Job #{}] No recipient configured: {}", label, message),
            }

            self.complete(store, job, now);
            evaluation.upgrades.push((job.id.clone(), upgrade));
        }
    }

    fn complete(&self, store: &mut JobStore, job: &Job, now: DateTime<Utc>) {
        if let Err(e) = store.mark_completed(&job.id, now) {
            log::error!("Could not complete job {}: {}", job.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FLIGHT_NOT_FOUND, JobFailure};
    use crate::pipeline::testing::{MockNotifier, flight, future_job, store_with};

    fn evaluator(notifier: &Arc<MockNotifier>) -> UpgradeEvaluator {
        let classifier = FareClassifier::new(&["PZ", "PN", "RN"]).unwrap();
        UpgradeEvaluator::new(classifier, notifier.clone(), Some("+15559999".into()))
    }

    #[tokio::test]
    async fn test_target_class_match_notifies_and_completes() {
        let notifier = Arc::new(MockNotifier::default());
        let mut store = store_with(vec![future_job("999")]);
        let results = vec![JobResult::found(
            store.jobs()[0].clone(),
            flight("999", &["PZ4", "YN2"]),
        )];

        let evaluation = evaluator(&notifier)
            .evaluate(&mut store, &results, Utc::now())
            .await;

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+15550001");
        assert!(sent[0].1.contains("PZ"));
        assert!(sent[0].1.contains('4'));
        assert_eq!(evaluation.notified, 1);
        assert!(store.jobs()[0].completed);
    }

    #[tokio::test]
    async fn test_other_classes_do_not_complete() {
        let notifier = Arc::new(MockNotifier::default());
        let mut store = store_with(vec![future_job("999")]);
        let results = vec![JobResult::found(
            store.jobs()[0].clone(),
            flight("999", &["YN2", "RN3"]),
        )];

        let evaluation = evaluator(&notifier)
            .evaluate(&mut store, &results, Utc::now())
            .await;

        assert!(notifier.sent().is_empty());
        assert_eq!(evaluation.no_upgrade, 1);
        assert!(!store.jobs()[0].completed);
    }

    #[tokio::test]
    async fn test_duplicate_codes_notify_once() {
        let notifier = Arc::new(MockNotifier::default());
        let mut store = store_with(vec![future_job("999")]);
        let results = vec![JobResult::found(
            store.jobs()[0].clone(),
            flight("999", &["PZ4", "PZ4", "PZ2"]),
        )];

        let evaluation = evaluator(&notifier)
            .evaluate(&mut store, &results, Utc::now())
            .await;

        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(evaluation.upgrades.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_signal_completes_without_alert() {
        let notifier = Arc::new(MockNotifier::default());
        let mut store = store_with(vec![future_job("999")]);
        let results = vec![JobResult::failed(
            store.jobs()[0].clone(),
            JobFailure::ExpiredItinerary("date is in the past".into()),
        )];

        let evaluation = evaluator(&notifier)
            .evaluate(&mut store, &results, Utc::now())
            .await;

        assert!(notifier.sent().is_empty());
        assert_eq!(evaluation.expired, 1);
        assert!(store.jobs()[0].completed);
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_job_pending() {
        let notifier = Arc::new(MockNotifier::default());
        let mut store = store_with(vec![future_job("999")]);
        let results = vec![JobResult::failed(
            store.jobs()[0].clone(),
            JobFailure::NotFound(FLIGHT_NOT_FOUND.into()),
        )];

        let evaluation = evaluator(&notifier)
            .evaluate(&mut store, &results, Utc::now())
            .await;

        assert_eq!(evaluation.failed, 1);
        assert!(!store.jobs()[0].completed);
    }

    #[tokio::test]
    async fn test_delivery_failure_still_completes() {
        let notifier = Arc::new(MockNotifier::failing());
        let mut store = store_with(vec![future_job("999")]);
        let results = vec![JobResult::found(
            store.jobs()[0].clone(),
            flight("999", &["PZ1"]),
        )];

        let evaluation = evaluator(&notifier)
            .evaluate(&mut store, &results, Utc::now())
            .await;

        assert_eq!(evaluation.notify_failures, 1);
        assert!(store.jobs()[0].completed);
    }

    #[tokio::test]
    async fn test_falls_back_to_default_recipient() {
        let notifier = Arc::new(MockNotifier::default());
        let mut job = future_job("999");
        job.address = None;
        let mut store = store_with(vec![job]);
        let results = vec![JobResult::found(
            store.jobs()[0].clone(),
            flight("999", &["PZ1"]),
        )];

        evaluator(&notifier)
            .evaluate(&mut store, &results, Utc::now())
            .await;

        assert_eq!(notifier.sent()[0].0, "+15559999");
    }

    #[tokio::test]
    async fn test_completed_job_is_never_realerted() {
        let notifier = Arc::new(MockNotifier::default());
        let mut store = store_with(vec![future_job("999")]);
        let results = vec![JobResult::found(
            store.jobs()[0].clone(),
            flight("999", &["PZ4"]),
        )];
        let eval = evaluator(&notifier);

        eval.evaluate(&mut store, &results, Utc::now()).await;
        eval.evaluate(&mut store, &results, Utc::now()).await;

        assert_eq!(notifier.sent().len(), 1);
    }
}
