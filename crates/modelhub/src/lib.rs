//! Modelhub: an embeddable model lifecycle and registry service.
//!
//! A `ModelService` owns a registry of model records, trains them through
//! pluggable model-family adapters, and serves predictions from published
//! snapshots. Transports (HTTP, CLI) sit on top of the facade and stay out
//! of this crate.

pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod registry;
pub mod service;
pub mod training;

// Re-export core types
pub use modelhub_core::{
    CoreError, HyperparameterSpec, Hyperparameters, Metrics, ModelAdapter, ModelFactory, ModelId,
    ModelState, TaskType, TrainingData,
};

// Re-export service types
pub use config::ModelHubConfig;
pub use error::{Result, ServiceError};
pub use gateway::{
    DatasetGateway, ExperimentTracker, InMemoryDatasetGateway, LocalDatasetGateway, LogTracker,
};
pub use models::default_factory;
pub use registry::{ModelRecord, ModelRegistry, ModelStatus};
pub use service::{HealthStatus, ModelClassInfo, ModelService, TrainOutcome, TrainRequest};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ModelHubConfig;
    pub use crate::error::{Result, ServiceError};
    pub use crate::gateway::{InMemoryDatasetGateway, LocalDatasetGateway, LogTracker};
    pub use crate::models::default_factory;
    pub use crate::registry::{ModelRecord, ModelStatus};
    pub use crate::service::{ModelService, TrainOutcome, TrainRequest};
    pub use modelhub_core::{Hyperparameters, ModelId, TaskType};
}
