//! Error types for the modelhub service layer

use modelhub_core::ModelId;
use thiserror::Error;

/// The typed failures the lifecycle facade surfaces to its transport
/// front-ends. Gateway failures are kept apart from adapter failures so a
/// caller can tell an unreachable dataset store from bad hyperparameters.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Model {0} is not ready")]
    NotReady(ModelId),

    #[error("Model {0} is unavailable; retrain it")]
    ModelUnavailable(ModelId),

    #[error("Training failed for model {id}: {reason}")]
    Training { id: ModelId, reason: String },

    #[error("Dataset error for model {id}: {reason}")]
    Dataset { id: ModelId, reason: String },

    #[error("Experiment tracker timed out: {0}")]
    TrackerTimeout(String),

    #[error("Registry error: {0}")]
    Registry(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
