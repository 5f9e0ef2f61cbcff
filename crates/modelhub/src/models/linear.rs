//! Linear model family: logistic regression and ridge regression.

use modelhub_core::{
    CoreError, HyperparameterSpec, Hyperparameters, Metrics, ModelAdapter, ModelState, Result,
    TaskType, TrainingData,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};
use smartcore::linear::ridge_regression::{RidgeRegression, RidgeRegressionParameters};
use std::any::Any;

use super::{
    ClassLabels, TRAIN_SEED, accuracy, check_schema_keys, gather, holdout_split, hp_f64,
    mean_squared_error, predict_matrix, r2_score, train_matrix, validate_predict_rows,
};

/// Linear family: logistic regression for classification, ridge regression
/// for regression. The regularization strength is `1 / c`, matching the
/// usual inverse-regularization convention for `c`.
pub struct LinearAdapter;

enum LinearModel {
    Classifier {
        model: LogisticRegression<f64, u32, DenseMatrix<f64>, Vec<u32>>,
        labels: ClassLabels,
    },
    Regressor(RidgeRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>),
}

struct LinearState {
    model: LinearModel,
    feature_count: usize,
}

impl ModelState for LinearState {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn feature_count(&self) -> usize {
        self.feature_count
    }
}

impl ModelAdapter for LinearAdapter {
    fn train(
        &self,
        data: &TrainingData,
        hyperparameters: &Hyperparameters,
        task_type: TaskType,
    ) -> Result<(Box<dyn ModelState>, Metrics)> {
        data.validate()?;
        check_schema_keys(hyperparameters, &["c"])?;
        let c = hp_f64(hyperparameters, "c", 1.0)?;
        if c <= 0.0 {
            return Err(CoreError::Training("c must be positive".to_string()));
        }
        let alpha = 1.0 / c;

        let split = holdout_split(data.n_rows(), TRAIN_SEED);
        let train_x = train_matrix(&gather(&data.features, &split.train))?;
        let valid_x = train_matrix(&gather(&data.features, &split.valid))?;
        let valid_truth = gather(&data.labels, &split.valid);
        let mut metrics = Metrics::new();

        let model = match task_type {
            TaskType::Classification => {
                let (labels, encoded) = ClassLabels::fit(&data.labels);
                let train_y: Vec<u32> = gather(&encoded, &split.train);
                let params = LogisticRegressionParameters::default().with_alpha(alpha);
                let model = LogisticRegression::fit(&train_x, &train_y, params).map_err(|e| {
                    CoreError::Training(format!("logistic regression training failed: {e}"))
                })?;
                let predicted = model
                    .predict(&valid_x)
                    .map_err(|e| CoreError::Training(format!("holdout evaluation failed: {e}")))?;
                let decoded: Vec<f64> = predicted.iter().map(|c| labels.decode(*c)).collect();
                metrics.insert("accuracy".to_string(), accuracy(&valid_truth, &decoded));
                LinearModel::Classifier { model, labels }
            }
            TaskType::Regression => {
                let train_y: Vec<f64> = gather(&data.labels, &split.train);
                let params = RidgeRegressionParameters::default().with_alpha(alpha);
                let model = RidgeRegression::fit(&train_x, &train_y, params).map_err(|e| {
                    CoreError::Training(format!("ridge regression training failed: {e}"))
                })?;
                let predicted = model
                    .predict(&valid_x)
                    .map_err(|e| CoreError::Training(format!("holdout evaluation failed: {e}")))?;
                metrics.insert(
                    "mse".to_string(),
                    mean_squared_error(&valid_truth, &predicted),
                );
                metrics.insert("r2_score".to_string(), r2_score(&valid_truth, &predicted));
                LinearModel::Regressor(model)
            }
        };

        let state = LinearState {
            model,
            feature_count: data.n_features(),
        };
        Ok((Box::new(state), metrics))
    }

    fn predict(&self, state: &dyn ModelState, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        let state = state
            .as_any()
            .downcast_ref::<LinearState>()
            .ok_or_else(|| {
                CoreError::Validation(
                    "model state does not belong to the linear family".to_string(),
                )
            })?;
        validate_predict_rows(features, state.feature_count)?;
        if features.is_empty() {
            return Ok(Vec::new());
        }
        let x = predict_matrix(features)?;
        match &state.model {
            LinearModel::Classifier { model, labels } => {
                let classes = model
                    .predict(&x)
                    .map_err(|e| CoreError::Validation(format!("prediction failed: {e}")))?;
                Ok(classes.iter().map(|c| labels.decode(*c)).collect())
            }
            LinearModel::Regressor(model) => model
                .predict(&x)
                .map_err(|e| CoreError::Validation(format!("prediction failed: {e}"))),
        }
    }

    fn hyperparameter_schema(&self) -> Vec<HyperparameterSpec> {
        vec![HyperparameterSpec::new(
            "c",
            "Inverse regularization strength",
            serde_json::json!(1.0),
        )]
    }
}
