//! # Modelhub Core
//!
//! Contract layer for the modelhub model lifecycle service: typed ids,
//! the model adapter capability trait, and the model factory.

pub mod adapter;
pub mod error;
pub mod factory;
pub mod types;

pub use adapter::{HyperparameterSpec, ModelAdapter, ModelState};
pub use error::{CoreError, Result};
pub use factory::ModelFactory;
pub use types::{Hyperparameters, Metrics, ModelId, TaskType, TrainingData};
