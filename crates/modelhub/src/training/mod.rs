//! Training orchestration for the model registry.

mod orchestrator;

pub use orchestrator::TrainingOrchestrator;
