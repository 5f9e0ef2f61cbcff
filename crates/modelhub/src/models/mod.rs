//! Built-in model families behind the adapter contract.

mod linear;
mod tree_ensemble;

pub use linear::LinearAdapter;
pub use tree_ensemble::TreeEnsembleAdapter;

use modelhub_core::{CoreError, Hyperparameters, ModelFactory, Result};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::sync::Arc;

/// Factory with the built-in model families registered.
pub fn default_factory() -> ModelFactory {
    let mut factory = ModelFactory::new();
    factory.register("linear", || Arc::new(LinearAdapter));
    factory.register("tree_ensemble", || Arc::new(TreeEnsembleAdapter));
    factory
}

/// Fixed seed so repeated trainings of the same data agree.
pub(crate) const TRAIN_SEED: u64 = 42;

/// Row indices of a seeded 80/20 train/holdout split. Datasets too small
/// for a holdout are evaluated on the training rows.
pub(crate) struct HoldoutSplit {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

pub(crate) fn holdout_split(n_rows: usize, seed: u64) -> HoldoutSplit {
    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let n_valid = n_rows / 5;
    if n_valid == 0 {
        return HoldoutSplit {
            train: indices.clone(),
            valid: indices,
        };
    }
    HoldoutSplit {
        train: indices[n_valid..].to_vec(),
        valid: indices[..n_valid].to_vec(),
    }
}

pub(crate) fn gather<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

pub(crate) fn train_matrix(rows: &[Vec<f64>]) -> Result<DenseMatrix<f64>> {
    DenseMatrix::from_2d_vec(&rows.to_vec())
        .map_err(|e| CoreError::Training(format!("failed to build feature matrix: {e}")))
}

pub(crate) fn predict_matrix(rows: &[Vec<f64>]) -> Result<DenseMatrix<f64>> {
    DenseMatrix::from_2d_vec(&rows.to_vec())
        .map_err(|e| CoreError::Validation(format!("failed to build feature matrix: {e}")))
}

/// Check predict input against the feature width observed at training
/// time.
pub(crate) fn validate_predict_rows(rows: &[Vec<f64>], feature_count: usize) -> Result<()> {
    for (i, row) in rows.iter().enumerate() {
        if row.len() != feature_count {
            return Err(CoreError::Validation(format!(
                "row {i} has {} features, model was trained with {feature_count}",
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::Validation(format!(
                "non-numeric feature value in row {i}"
            )));
        }
    }
    Ok(())
}

/// Distinct label values of a classification dataset, mapped to dense
/// class indices. Predictions are decoded back to the original values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClassLabels {
    values: Vec<f64>,
}

impl ClassLabels {
    pub fn fit(labels: &[f64]) -> (Self, Vec<u32>) {
        let mut values = labels.to_vec();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();
        let encoded = labels
            .iter()
            .map(|label| {
                values
                    .iter()
                    .position(|v| v == label)
                    .unwrap_or_default() as u32
            })
            .collect();
        (Self { values }, encoded)
    }

    pub fn decode(&self, class: u32) -> f64 {
        self.values.get(class as usize).copied().unwrap_or(f64::NAN)
    }
}

pub(crate) fn accuracy(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth
        .iter()
        .zip(predicted)
        .filter(|(t, p)| t == p)
        .count();
    hits as f64 / truth.len() as f64
}

pub(crate) fn mean_squared_error(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let sum: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    sum / truth.len() as f64
}

pub(crate) fn r2_score(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let mean: f64 = truth.iter().sum::<f64>() / truth.len() as f64;
    let ss_tot: f64 = truth.iter().map(|t| (t - mean) * (t - mean)).sum();
    let ss_res: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Reject hyperparameter names outside the family's declared schema.
pub(crate) fn check_schema_keys(hp: &Hyperparameters, allowed: &[&str]) -> Result<()> {
    for key in hp.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(CoreError::Training(format!(
                "hyperparameter {key:?} is not in this model class's schema"
            )));
        }
    }
    Ok(())
}

pub(crate) fn hp_usize(hp: &Hyperparameters, key: &str, default: usize) -> Result<usize> {
    match hp.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| {
                CoreError::Training(format!(
                    "hyperparameter {key:?} must be a non-negative integer"
                ))
            }),
    }
}

pub(crate) fn hp_opt_usize(hp: &Hyperparameters, key: &str) -> Result<Option<usize>> {
    match hp.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|v| Some(v as usize))
            .ok_or_else(|| {
                CoreError::Training(format!(
                    "hyperparameter {key:?} must be a non-negative integer"
                ))
            }),
    }
}

pub(crate) fn hp_f64(hp: &Hyperparameters, key: &str, default: f64) -> Result<f64> {
    match hp.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                CoreError::Training(format!("hyperparameter {key:?} must be a number"))
            }),
    }
}
