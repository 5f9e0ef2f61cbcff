//! The capability contract implemented by each model family.

use serde::{Deserialize, Serialize};
use std::any::Any;

use crate::error::Result;
use crate::types::{Hyperparameters, Metrics, TaskType, TrainingData};

/// Opaque, immutable trained parameters produced by [`ModelAdapter::train`].
///
/// A state value is never mutated after training; retraining produces a new
/// value that replaces the old one wholesale. Adapters downcast through
/// [`ModelState::as_any`] to recover their concrete type at predict time.
pub trait ModelState: Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;

    /// Feature width observed at training time.
    fn feature_count(&self) -> usize;
}

/// Declared schema for one hyperparameter of a model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterSpec {
    pub name: String,
    pub description: String,
    pub default: serde_json::Value,
}

impl HyperparameterSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        default: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default,
        }
    }
}

/// One model family's train/predict behavior.
///
/// Implementations are stateless between calls: every learned parameter
/// lives in the returned [`ModelState`], so a single adapter instance may
/// safely serve any number of model records.
pub trait ModelAdapter: Send + Sync {
    /// Fit the family's model to `data` and return the trained state
    /// together with evaluation metrics.
    ///
    /// Fails with [`CoreError::Training`](crate::CoreError::Training) on
    /// malformed shapes or hyperparameter values outside
    /// [`hyperparameter_schema`](ModelAdapter::hyperparameter_schema).
    /// Recoverable numeric issues are reported through metrics, not errors.
    fn train(
        &self,
        data: &TrainingData,
        hyperparameters: &Hyperparameters,
        task_type: TaskType,
    ) -> Result<(Box<dyn ModelState>, Metrics)>;

    /// Predict one output per feature row.
    ///
    /// Fails with [`CoreError::Validation`](crate::CoreError::Validation)
    /// when a row's width does not match the width observed at training
    /// time.
    fn predict(&self, state: &dyn ModelState, features: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Declared hyperparameters of this family.
    fn hyperparameter_schema(&self) -> Vec<HyperparameterSpec>;
}
