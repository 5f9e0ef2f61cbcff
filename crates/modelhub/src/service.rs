//! The lifecycle facade: the one entry point transports call into.

use modelhub_core::{
    CoreError, Hyperparameters, HyperparameterSpec, Metrics, ModelFactory, ModelId, TaskType,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::config::ModelHubConfig;
use crate::error::{Result, ServiceError};
use crate::gateway::{DatasetGateway, ExperimentTracker};
use crate::registry::{ModelRecord, ModelRegistry, ModelStatus};
use crate::training::TrainingOrchestrator;

/// Everything needed to start a first training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainRequest {
    pub model_class: String,
    pub task_type: TaskType,
    pub dataset_name: String,
    #[serde(default)]
    pub hyperparameters: Hyperparameters,
}

/// Result of a completed training or retraining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOutcome {
    pub id: ModelId,
    pub version: u64,
    pub metrics: Metrics,
}

/// A model class as advertised to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ModelClassInfo {
    pub name: String,
    pub hyperparameters: Vec<HyperparameterSpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub models: usize,
}

/// Coordinates the factory, the registry and the orchestrator behind a
/// single typed surface. Transports hold one `ModelService` and translate
/// its errors to their own status codes.
pub struct ModelService {
    factory: Arc<ModelFactory>,
    registry: Arc<ModelRegistry>,
    orchestrator: TrainingOrchestrator,
}

impl ModelService {
    pub fn new(
        factory: ModelFactory,
        datasets: Arc<dyn DatasetGateway>,
        tracker: Arc<dyn ExperimentTracker>,
        config: &ModelHubConfig,
    ) -> Self {
        let registry = Arc::new(ModelRegistry::new());
        let orchestrator =
            TrainingOrchestrator::new(registry.clone(), datasets, tracker, config);
        Self {
            factory: Arc::new(factory),
            registry,
            orchestrator,
        }
    }

    /// Registered model class names, in stable order.
    pub fn model_classes(&self) -> Vec<String> {
        self.factory.class_names()
    }

    /// A model class and its hyperparameter schema.
    pub fn describe_model_class(&self, name: &str) -> Result<ModelClassInfo> {
        let adapter = self
            .factory
            .create(name)
            .map_err(|_| ServiceError::NotFound(format!("model class {name:?} not found")))?;
        Ok(ModelClassInfo {
            name: name.to_string(),
            hyperparameters: adapter.hyperparameter_schema(),
        })
    }

    /// Create a record and run its first training to completion. The record
    /// stays in the registry even when training fails, so the caller can
    /// inspect it and retrain under the same id.
    pub async fn train(&self, request: TrainRequest) -> Result<TrainOutcome> {
        if request.dataset_name.trim().is_empty() {
            return Err(ServiceError::Validation(
                "dataset_name must not be empty".to_string(),
            ));
        }
        // Resolve the class before touching the registry so an unknown
        // class leaves no trace behind.
        let adapter = self.factory.create(&request.model_class).map_err(|e| match e {
            CoreError::UnknownModelClass(class) => {
                ServiceError::NotFound(format!("model class {class:?} not found"))
            }
            other => ServiceError::Validation(other.to_string()),
        })?;

        let entry = self.registry.create(
            &request.model_class,
            request.task_type,
            request.hyperparameters.clone(),
        )?;
        let id = entry.id().clone();
        info!(model_id = %id, model_class = %request.model_class, "model record created");

        let metrics = self
            .orchestrator
            .run(entry.clone(), adapter, &request.dataset_name, request.hyperparameters)
            .await?;
        Ok(TrainOutcome {
            id,
            version: entry.record()?.version,
            metrics,
        })
    }

    /// Retrain an existing record, bumping its version on success. Stored
    /// hyperparameters are the base; `overrides` wins key by key. A failed
    /// retrain leaves the previous version serving predictions untouched.
    pub async fn retrain(
        &self,
        id: &ModelId,
        dataset_name: &str,
        overrides: Hyperparameters,
    ) -> Result<TrainOutcome> {
        if dataset_name.trim().is_empty() {
            return Err(ServiceError::Validation(
                "dataset_name must not be empty".to_string(),
            ));
        }
        let entry = self.registry.get(id)?;
        let adapter = self
            .factory
            .create(entry.model_class())
            .map_err(|e| ServiceError::Registry(e.to_string()))?;

        let mut hyperparameters = entry.hyperparameters()?;
        hyperparameters.extend(overrides);

        let metrics = self
            .orchestrator
            .run(entry.clone(), adapter, dataset_name, hyperparameters)
            .await?;
        Ok(TrainOutcome {
            id: id.clone(),
            version: entry.record()?.version,
            metrics,
        })
    }

    /// Run inference against the record's published snapshot.
    ///
    /// A record that is retraining keeps serving its previous snapshot, so
    /// predictions never block on (or observe a half-applied) training. A
    /// record with no snapshot yet is not ready; a failed record with no
    /// snapshot is unavailable until retrained.
    pub async fn predict(&self, id: &ModelId, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        let entry = self.registry.get(id)?;
        let snapshot = match entry.status_and_snapshot()? {
            (ModelStatus::Failed, _) => {
                return Err(ServiceError::ModelUnavailable(id.clone()));
            }
            (_, Some(snapshot)) => snapshot,
            (_, None) => return Err(ServiceError::NotReady(id.clone())),
        };
        let adapter = self
            .factory
            .create(entry.model_class())
            .map_err(|e| ServiceError::Registry(e.to_string()))?;
        adapter
            .predict(snapshot.state.as_ref(), features)
            .map_err(|e| match e {
                CoreError::Validation(reason) => ServiceError::Validation(reason),
                other => ServiceError::Registry(other.to_string()),
            })
    }

    pub fn get_model(&self, id: &ModelId) -> Result<ModelRecord> {
        self.registry.get(id)?.record()
    }

    pub fn list_models(&self) -> Result<Vec<ModelRecord>> {
        self.registry.list()
    }

    /// Remove a record. In-flight predicts holding its snapshot finish
    /// normally; in-flight trainings make the delete a conflict.
    pub fn delete(&self, id: &ModelId) -> Result<()> {
        self.registry.remove(id)?;
        info!(model_id = %id, "model deleted");
        Ok(())
    }

    pub fn health(&self) -> Result<HealthStatus> {
        Ok(HealthStatus {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            models: self.registry.len()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{
        DatasetGatewayError, DatasetResult, InMemoryDatasetGateway, LogTracker,
    };
    use crate::models::default_factory;
    use crate::models::test_data::{classification_data, regression_data};
    use async_trait::async_trait;
    use modelhub_core::{ModelState, Result as CoreResult, TrainingData};
    use std::any::Any;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Condvar, Mutex};
    use tokio::time::{Duration, sleep};

    fn builtin_service() -> ModelService {
        let datasets = InMemoryDatasetGateway::new();
        datasets.insert("clusters.csv", classification_data());
        datasets.insert("line.csv", regression_data());
        ModelService::new(
            default_factory(),
            Arc::new(datasets),
            Arc::new(LogTracker),
            &ModelHubConfig::default(),
        )
    }

    fn classification_request(dataset: &str) -> TrainRequest {
        TrainRequest {
            model_class: "linear".to_string(),
            task_type: TaskType::Classification,
            dataset_name: dataset.to_string(),
            hyperparameters: Hyperparameters::new(),
        }
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let service = builtin_service();

        let outcome = service.train(classification_request("clusters.csv")).await.unwrap();
        assert_eq!(outcome.version, 1);
        assert!(outcome.metrics["accuracy"] >= 0.8);

        let record = service.get_model(&outcome.id).unwrap();
        assert_eq!(record.status, ModelStatus::Ready);
        assert_eq!(record.version, 1);

        let predictions = service
            .predict(&outcome.id, &[vec![0.1, 0.2], vec![5.5, 5.0]])
            .await
            .unwrap();
        assert_eq!(predictions, vec![0.0, 1.0]);

        let retrained = service
            .retrain(&outcome.id, "clusters.csv", Hyperparameters::new())
            .await
            .unwrap();
        assert_eq!(retrained.id, outcome.id);
        assert_eq!(retrained.version, 2);

        service.delete(&outcome.id).unwrap();
        assert!(matches!(
            service.get_model(&outcome.id),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.predict(&outcome.id, &[vec![0.0, 0.0]]).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(service.list_models().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_model_class_is_not_found_and_leaves_registry_untouched() {
        let service = builtin_service();
        let mut request = classification_request("clusters.csv");
        request.model_class = "deep_dream".to_string();

        assert!(matches!(
            service.train(request).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(service.list_models().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_dataset_leaves_a_failed_record() {
        let service = builtin_service();

        let err = service
            .train(classification_request("missing.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let records = service.list_models().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ModelStatus::Failed);
        assert_eq!(records[0].version, 0);

        // Never published anything, so the record is unavailable rather
        // than not ready.
        assert!(matches!(
            service.predict(&records[0].id, &[vec![0.0, 0.0]]).await,
            Err(ServiceError::ModelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_retrain_preserves_previous_model() {
        let service = builtin_service();
        let outcome = service.train(classification_request("clusters.csv")).await.unwrap();

        let err = service
            .retrain(&outcome.id, "missing.csv", Hyperparameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let record = service.get_model(&outcome.id).unwrap();
        assert_eq!(record.status, ModelStatus::Failed);
        assert_eq!(record.version, 1);
        assert_eq!(record.metrics, outcome.metrics);

        // Failed records refuse predictions until retrained.
        assert!(matches!(
            service.predict(&outcome.id, &[vec![0.0, 0.0]]).await,
            Err(ServiceError::ModelUnavailable(_))
        ));

        let recovered = service
            .retrain(&outcome.id, "clusters.csv", Hyperparameters::new())
            .await
            .unwrap();
        assert_eq!(recovered.version, 2);
        assert!(service.predict(&outcome.id, &[vec![0.0, 0.0]]).await.is_ok());
    }

    #[tokio::test]
    async fn test_retrain_merges_hyperparameter_overrides() {
        let service = builtin_service();
        let mut request = classification_request("clusters.csv");
        request
            .hyperparameters
            .insert("c".to_string(), serde_json::json!(2.0));
        let outcome = service.train(request).await.unwrap();
        assert_eq!(
            service.get_model(&outcome.id).unwrap().hyperparameters["c"],
            serde_json::json!(2.0)
        );

        // No overrides: the stored set carries over.
        service
            .retrain(&outcome.id, "clusters.csv", Hyperparameters::new())
            .await
            .unwrap();
        assert_eq!(
            service.get_model(&outcome.id).unwrap().hyperparameters["c"],
            serde_json::json!(2.0)
        );

        let mut overrides = Hyperparameters::new();
        overrides.insert("c".to_string(), serde_json::json!(5.0));
        service
            .retrain(&outcome.id, "clusters.csv", overrides)
            .await
            .unwrap();
        assert_eq!(
            service.get_model(&outcome.id).unwrap().hyperparameters["c"],
            serde_json::json!(5.0)
        );
    }

    #[tokio::test]
    async fn test_train_regression_metrics() {
        let service = builtin_service();
        let outcome = service
            .train(TrainRequest {
                model_class: "tree_ensemble".to_string(),
                task_type: TaskType::Regression,
                dataset_name: "line.csv".to_string(),
                hyperparameters: Hyperparameters::new(),
            })
            .await
            .unwrap();
        assert!(outcome.metrics.contains_key("mse"));
        assert!(outcome.metrics.contains_key("r2_score"));
    }

    #[tokio::test]
    async fn test_model_classes_and_describe() {
        let service = builtin_service();
        assert_eq!(service.model_classes(), vec!["linear", "tree_ensemble"]);

        let info = service.describe_model_class("tree_ensemble").unwrap();
        let names: Vec<&str> = info.hyperparameters.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["n_estimators", "max_depth", "min_samples_split"]);

        assert!(matches!(
            service.describe_model_class("deep_dream"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_health_counts_models() {
        let service = builtin_service();
        assert_eq!(service.health().unwrap().models, 0);

        service.train(classification_request("clusters.csv")).await.unwrap();
        let health = service.health().unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.models, 1);
        assert!(!health.version.is_empty());
    }

    #[tokio::test]
    async fn test_dataset_timeout_fails_training() {
        struct StalledGateway;

        #[async_trait]
        impl DatasetGateway for StalledGateway {
            async fn resolve(&self, _name: &str) -> DatasetResult<TrainingData> {
                std::future::pending().await
            }
        }

        let config = ModelHubConfig {
            dataset_timeout_ms: 50,
            ..ModelHubConfig::default()
        };
        let service = ModelService::new(
            default_factory(),
            Arc::new(StalledGateway),
            Arc::new(LogTracker),
            &config,
        );

        let err = service
            .train(classification_request("slow.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Dataset { .. }));

        let records = service.list_models().unwrap();
        assert_eq!(records[0].status, ModelStatus::Failed);
    }

    #[tokio::test]
    async fn test_dataset_parse_error_surfaces_as_dataset_error() {
        struct BrokenGateway;

        #[async_trait]
        impl DatasetGateway for BrokenGateway {
            async fn resolve(&self, name: &str) -> DatasetResult<TrainingData> {
                Err(DatasetGatewayError::Parse {
                    name: name.to_string(),
                    reason: "bad row".to_string(),
                })
            }
        }

        let service = ModelService::new(
            default_factory(),
            Arc::new(BrokenGateway),
            Arc::new(LogTracker),
            &ModelHubConfig::default(),
        );
        assert!(matches!(
            service.train(classification_request("bad.csv")).await,
            Err(ServiceError::Dataset { .. })
        ));
    }

    // Adapter whose training blocks until the test opens a gate, and whose
    // model predicts the training run number it came from. Lets the tests
    // hold a retrain mid-flight and observe what concurrent calls see.
    struct Gate {
        open: Mutex<bool>,
        cv: Condvar,
    }

    impl Gate {
        fn closed() -> Self {
            Self {
                open: Mutex::new(false),
                cv: Condvar::new(),
            }
        }

        fn open(&self) {
            let mut open = self.open.lock().unwrap();
            *open = true;
            self.cv.notify_all();
        }

        fn close(&self) {
            *self.open.lock().unwrap() = false;
        }

        fn wait(&self) {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cv.wait(open).unwrap();
            }
        }
    }

    struct RunNumberState(f64);

    impl ModelState for RunNumberState {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn feature_count(&self) -> usize {
            1
        }
    }

    struct GatedAdapter {
        gate: Arc<Gate>,
        runs: Arc<AtomicU64>,
    }

    impl modelhub_core::ModelAdapter for GatedAdapter {
        fn train(
            &self,
            _data: &TrainingData,
            _hyperparameters: &Hyperparameters,
            _task_type: TaskType,
        ) -> CoreResult<(Box<dyn ModelState>, Metrics)> {
            self.gate.wait();
            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            Ok((Box::new(RunNumberState(run as f64)), Metrics::new()))
        }

        fn predict(&self, state: &dyn ModelState, features: &[Vec<f64>]) -> CoreResult<Vec<f64>> {
            let state = state
                .as_any()
                .downcast_ref::<RunNumberState>()
                .ok_or_else(|| CoreError::Validation("wrong state".to_string()))?;
            Ok(vec![state.0; features.len()])
        }

        fn hyperparameter_schema(&self) -> Vec<HyperparameterSpec> {
            vec![]
        }
    }

    fn gated_service(gate: Arc<Gate>) -> Arc<ModelService> {
        let runs = Arc::new(AtomicU64::new(0));
        let mut factory = ModelFactory::new();
        factory.register("gated", move || {
            Arc::new(GatedAdapter {
                gate: gate.clone(),
                runs: runs.clone(),
            })
        });
        let datasets = InMemoryDatasetGateway::new();
        datasets.insert("any.csv", classification_data());
        Arc::new(ModelService::new(
            factory,
            Arc::new(datasets),
            Arc::new(LogTracker),
            &ModelHubConfig::default(),
        ))
    }

    async fn wait_for_status(service: &ModelService, id: &ModelId, status: ModelStatus) {
        for _ in 0..200 {
            if service.get_model(id).unwrap().status == status {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("model never reached {status}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_retrain_conflicts_and_predict_serves_old_snapshot() {
        let gate = Arc::new(Gate::closed());
        let service = gated_service(gate.clone());

        gate.open();
        let outcome = service
            .train(TrainRequest {
                model_class: "gated".to_string(),
                task_type: TaskType::Classification,
                dataset_name: "any.csv".to_string(),
                hyperparameters: Hyperparameters::new(),
            })
            .await
            .unwrap();
        let id = outcome.id.clone();
        assert_eq!(service.predict(&id, &[vec![0.0]]).await.unwrap(), vec![1.0]);

        // Hold the second training at the gate.
        gate.close();
        let background = {
            let service = service.clone();
            let id = id.clone();
            tokio::spawn(async move {
                service.retrain(&id, "any.csv", Hyperparameters::new()).await
            })
        };
        wait_for_status(&service, &id, ModelStatus::Training).await;

        // A second retrain and a delete both fail fast while the first
        // retrain holds the record's guard.
        assert!(matches!(
            service.retrain(&id, "any.csv", Hyperparameters::new()).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(service.delete(&id), Err(ServiceError::Conflict(_))));

        // Predictions keep flowing from the version 1 snapshot.
        assert_eq!(service.predict(&id, &[vec![0.0]]).await.unwrap(), vec![1.0]);

        gate.open();
        let retrained = background.await.unwrap().unwrap();
        assert_eq!(retrained.version, 2);
        assert_eq!(service.predict(&id, &[vec![0.0]]).await.unwrap(), vec![2.0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_predict_before_first_training_completes_is_not_ready() {
        let gate = Arc::new(Gate::closed());
        let service = gated_service(gate.clone());

        let background = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .train(TrainRequest {
                        model_class: "gated".to_string(),
                        task_type: TaskType::Classification,
                        dataset_name: "any.csv".to_string(),
                        hyperparameters: Hyperparameters::new(),
                    })
                    .await
            })
        };

        let id = loop {
            if let Some(record) = service.list_models().unwrap().into_iter().next() {
                break record.id;
            }
            sleep(Duration::from_millis(5)).await;
        };
        wait_for_status(&service, &id, ModelStatus::Training).await;

        assert!(matches!(
            service.predict(&id, &[vec![0.0]]).await,
            Err(ServiceError::NotReady(_))
        ));

        gate.open();
        background.await.unwrap().unwrap();
        assert!(service.predict(&id, &[vec![0.0]]).await.is_ok());
    }
}
