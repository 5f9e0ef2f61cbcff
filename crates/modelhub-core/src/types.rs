//! Common types for modelhub-core

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{CoreError, Result};

/// NewType pattern for Model ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(String);

impl ModelId {
    /// Create a new ModelId
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

impl Default for ModelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Learning task a model record is trained for. Immutable once first trained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Classification,
    Regression,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Classification => write!(f, "classification"),
            TaskType::Regression => write!(f, "regression"),
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "classification" => Ok(TaskType::Classification),
            "regression" => Ok(TaskType::Regression),
            other => Err(CoreError::Validation(format!(
                "unknown task type: {other}"
            ))),
        }
    }
}

/// Named hyperparameter values supplied at train/retrain time.
pub type Hyperparameters = HashMap<String, serde_json::Value>;

/// Named numeric metrics produced by a training run.
pub type Metrics = HashMap<String, f64>;

/// In-memory feature/label table resolved by a dataset gateway.
///
/// The last column of the source table is the label; everything before it
/// is a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingData {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
}

impl TrainingData {
    pub fn new(feature_names: Vec<String>, features: Vec<Vec<f64>>, labels: Vec<f64>) -> Self {
        Self {
            feature_names,
            features,
            labels,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.features.len()
    }

    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    /// Check the table is rectangular, non-empty and numeric.
    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(CoreError::Training("dataset is empty".to_string()));
        }
        if self.features.len() != self.labels.len() {
            return Err(CoreError::Training(format!(
                "feature/label row count mismatch: {} vs {}",
                self.features.len(),
                self.labels.len()
            )));
        }
        let width = self.features[0].len();
        if width == 0 {
            return Err(CoreError::Training(
                "dataset has no feature columns".to_string(),
            ));
        }
        for (i, row) in self.features.iter().enumerate() {
            if row.len() != width {
                return Err(CoreError::Training(format!(
                    "row {i} has {} features, expected {width}",
                    row.len()
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(CoreError::Training(format!(
                    "non-numeric feature value in row {i}"
                )));
            }
        }
        if let Some(i) = self.labels.iter().position(|v| !v.is_finite()) {
            return Err(CoreError::Training(format!(
                "non-numeric label value in row {i}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(features: Vec<Vec<f64>>, labels: Vec<f64>) -> TrainingData {
        TrainingData::new(vec!["a".to_string(), "b".to_string()], features, labels)
    }

    #[test]
    fn test_validate_ok() {
        let data = table(vec![vec![1.0, 2.0], vec![3.0, 4.0]], vec![0.0, 1.0]);
        assert!(data.validate().is_ok());
        assert_eq!(data.n_rows(), 2);
        assert_eq!(data.n_features(), 2);
    }

    #[test]
    fn test_validate_empty() {
        let data = table(vec![], vec![]);
        assert!(matches!(data.validate(), Err(CoreError::Training(_))));
    }

    #[test]
    fn test_validate_row_count_mismatch() {
        let data = table(vec![vec![1.0, 2.0]], vec![0.0, 1.0]);
        assert!(matches!(data.validate(), Err(CoreError::Training(_))));
    }

    #[test]
    fn test_validate_ragged_rows() {
        let data = table(vec![vec![1.0, 2.0], vec![3.0]], vec![0.0, 1.0]);
        assert!(matches!(data.validate(), Err(CoreError::Training(_))));
    }

    #[test]
    fn test_validate_non_finite() {
        let data = table(vec![vec![1.0, f64::NAN]], vec![0.0]);
        assert!(matches!(data.validate(), Err(CoreError::Training(_))));
    }

    #[test]
    fn test_task_type_round_trip() {
        assert_eq!(
            "classification".parse::<TaskType>().unwrap(),
            TaskType::Classification
        );
        assert_eq!(TaskType::Regression.to_string(), "regression");
        assert!("clustering".parse::<TaskType>().is_err());
    }
}
