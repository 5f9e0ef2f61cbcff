//! Experiment tracker gateway: best-effort recording of training runs.

use async_trait::async_trait;
use modelhub_core::{Hyperparameters, Metrics, ModelId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::info;

/// NewType pattern for tracker run references
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackingRef(String);

impl TrackingRef {
    /// Create a new TrackingRef
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TrackingRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a successful training hands to the tracker.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingRun {
    pub model_id: ModelId,
    pub model_class: String,
    pub hyperparameters: Hyperparameters,
    pub metrics: Metrics,
    pub version: u64,
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Tracker unavailable: {0}")]
    Unavailable(String),

    #[error("Tracker rejected the run: {0}")]
    Rejected(String),
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

/// Narrow interface to the experiment tracking backend. Calls are
/// timeout-bounded by the orchestrator and their failure never fails the
/// training that produced the run.
#[async_trait]
pub trait ExperimentTracker: Send + Sync {
    /// Record a run and return an opaque reference to it.
    async fn record_run(&self, run: &TrainingRun) -> TrackerResult<TrackingRef>;
}

/// Tracker that records runs to the structured log. Always succeeds.
pub struct LogTracker;

#[async_trait]
impl ExperimentTracker for LogTracker {
    async fn record_run(&self, run: &TrainingRun) -> TrackerResult<TrackingRef> {
        let tracking_ref = TrackingRef::new();
        info!(
            model_id = %run.model_id,
            model_class = %run.model_class,
            version = run.version,
            metrics = ?run.metrics,
            tracking_ref = %tracking_ref,
            "recorded training run"
        );
        Ok(tracking_ref)
    }
}
