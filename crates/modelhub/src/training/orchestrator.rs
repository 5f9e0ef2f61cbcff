//! Drives a model record through its lifecycle state machine.

use modelhub_core::{CoreError, Hyperparameters, Metrics, ModelAdapter};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::ModelHubConfig;
use crate::error::{Result, ServiceError};
use crate::gateway::{DatasetGateway, DatasetGatewayError, ExperimentTracker, TrainingRun};
use crate::registry::{ModelEntry, ModelRegistry, ModelStatus};

/// Runs trainings: acquires the per-record guard, resolves the dataset,
/// invokes the adapter on the blocking pool and publishes the result
/// atomically. One orchestrator serves the whole registry.
pub struct TrainingOrchestrator {
    registry: Arc<ModelRegistry>,
    datasets: Arc<dyn DatasetGateway>,
    tracker: Arc<dyn ExperimentTracker>,
    dataset_timeout: Duration,
    tracker_timeout: Duration,
}

impl TrainingOrchestrator {
    pub fn new(
        registry: Arc<ModelRegistry>,
        datasets: Arc<dyn DatasetGateway>,
        tracker: Arc<dyn ExperimentTracker>,
        config: &ModelHubConfig,
    ) -> Self {
        Self {
            registry,
            datasets,
            tracker,
            dataset_timeout: config.dataset_timeout(),
            tracker_timeout: config.tracker_timeout(),
        }
    }

    /// Train (or retrain) one record. `hyperparameters` is the full merged
    /// set the training should use; on success it becomes the record's
    /// current set.
    ///
    /// A second concurrent call for the same record fails fast with
    /// `Conflict` instead of queueing. On failure the record moves to
    /// `failed` and keeps its last-known-good snapshot and version.
    pub async fn run(
        &self,
        entry: Arc<ModelEntry>,
        adapter: Arc<dyn ModelAdapter>,
        dataset_name: &str,
        hyperparameters: Hyperparameters,
    ) -> Result<Metrics> {
        let id = entry.id().clone();
        let _guard = entry.try_begin_mutation().ok_or_else(|| {
            ServiceError::Conflict(format!("training already in progress for model {id}"))
        })?;
        // A concurrent delete may have won the guard race and removed the
        // record; training a ghost entry would publish into nothing.
        if !self.registry.contains(&id)? {
            return Err(ServiceError::NotFound(format!("model {id} not found")));
        }

        entry.set_status(ModelStatus::Training)?;
        info!(model_id = %id, dataset = %dataset_name, "training started");

        let data = match timeout(self.dataset_timeout, self.datasets.resolve(dataset_name)).await {
            Err(_) => {
                entry.mark_failed()?;
                return Err(ServiceError::Dataset {
                    id,
                    reason: format!(
                        "dataset gateway timed out after {}ms",
                        self.dataset_timeout.as_millis()
                    ),
                });
            }
            Ok(Err(DatasetGatewayError::NotFound(name))) => {
                entry.mark_failed()?;
                return Err(ServiceError::NotFound(format!("dataset {name} not found")));
            }
            Ok(Err(e)) => {
                entry.mark_failed()?;
                return Err(ServiceError::Dataset {
                    id,
                    reason: e.to_string(),
                });
            }
            Ok(Ok(data)) => data,
        };

        let task_type = entry.task_type()?;
        let train_adapter = adapter.clone();
        let train_hyperparameters = hyperparameters.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            train_adapter.train(&data, &train_hyperparameters, task_type)
        })
        .await;

        let (state, metrics) = match outcome {
            Err(join_error) => {
                entry.mark_failed()?;
                return Err(ServiceError::Training {
                    id,
                    reason: format!("training task panicked: {join_error}"),
                });
            }
            Ok(Err(e)) => {
                entry.mark_failed()?;
                warn!(model_id = %id, error = %e, "training failed");
                return Err(match e {
                    CoreError::Validation(reason) => ServiceError::Validation(reason),
                    other => ServiceError::Training {
                        id,
                        reason: other.to_string(),
                    },
                });
            }
            Ok(Ok(trained)) => trained,
        };

        let version = entry.publish(state, metrics.clone(), hyperparameters)?;
        info!(model_id = %id, version, "training complete");

        self.notify_tracker(&entry, metrics.clone(), version).await;
        Ok(metrics)
    }

    /// Best-effort notification: a tracker failure or timeout is logged
    /// and the training stays successful.
    async fn notify_tracker(&self, entry: &ModelEntry, metrics: Metrics, version: u64) {
        let run = TrainingRun {
            model_id: entry.id().clone(),
            model_class: entry.model_class().to_string(),
            hyperparameters: entry.hyperparameters().unwrap_or_default(),
            metrics,
            version,
        };
        match timeout(self.tracker_timeout, self.tracker.record_run(&run)).await {
            Ok(Ok(tracking_ref)) => {
                if let Err(e) = entry.set_tracking_ref(tracking_ref) {
                    warn!(model_id = %entry.id(), error = %e, "failed to store tracking ref");
                }
            }
            Ok(Err(e)) => {
                warn!(model_id = %entry.id(), error = %e, "experiment tracker rejected the run");
            }
            Err(_) => {
                warn!(
                    model_id = %entry.id(),
                    timeout_ms = self.tracker_timeout.as_millis(),
                    "experiment tracker timed out"
                );
            }
        }
    }
}
