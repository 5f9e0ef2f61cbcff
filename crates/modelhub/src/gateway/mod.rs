//! Narrow interfaces to external collaborators: the dataset store and the
//! experiment tracker.

mod dataset;
mod tracker;

pub use dataset::{
    DatasetGateway, DatasetGatewayError, DatasetResult, InMemoryDatasetGateway,
    LocalDatasetGateway,
};
pub use tracker::{
    ExperimentTracker, LogTracker, TrackerError, TrackerResult, TrackingRef, TrainingRun,
};
