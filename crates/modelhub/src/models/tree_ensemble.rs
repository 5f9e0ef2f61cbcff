//! Tree-ensemble model family: random forest classifier and regressor.

use modelhub_core::{
    CoreError, HyperparameterSpec, Hyperparameters, Metrics, ModelAdapter, ModelState, Result,
    TaskType, TrainingData,
};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::any::Any;

use super::{
    ClassLabels, TRAIN_SEED, accuracy, check_schema_keys, gather, holdout_split, hp_opt_usize,
    hp_usize, mean_squared_error, predict_matrix, r2_score, train_matrix, validate_predict_rows,
};

/// Random forest, classification or regression depending on the record's
/// task type.
pub struct TreeEnsembleAdapter;

enum ForestModel {
    Classifier {
        model: RandomForestClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>,
        labels: ClassLabels,
    },
    Regressor(RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>),
}

struct TreeEnsembleState {
    model: ForestModel,
    feature_count: usize,
}

impl ModelState for TreeEnsembleState {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn feature_count(&self) -> usize {
        self.feature_count
    }
}

impl ModelAdapter for TreeEnsembleAdapter {
    fn train(
        &self,
        data: &TrainingData,
        hyperparameters: &Hyperparameters,
        task_type: TaskType,
    ) -> Result<(Box<dyn ModelState>, Metrics)> {
        data.validate()?;
        check_schema_keys(
            hyperparameters,
            &["n_estimators", "max_depth", "min_samples_split"],
        )?;
        let n_estimators = hp_usize(hyperparameters, "n_estimators", 100)?;
        if n_estimators == 0 || n_estimators > u16::MAX as usize {
            return Err(CoreError::Training(
                "n_estimators must be between 1 and 65535".to_string(),
            ));
        }
        let max_depth = hp_opt_usize(hyperparameters, "max_depth")?;
        if let Some(depth) = max_depth {
            if depth == 0 || depth > u16::MAX as usize {
                return Err(CoreError::Training(
                    "max_depth must be between 1 and 65535".to_string(),
                ));
            }
        }
        let min_samples_split = hp_usize(hyperparameters, "min_samples_split", 2)?;

        let split = holdout_split(data.n_rows(), TRAIN_SEED);
        let train_x = train_matrix(&gather(&data.features, &split.train))?;
        let valid_x = train_matrix(&gather(&data.features, &split.valid))?;
        let valid_truth = gather(&data.labels, &split.valid);
        let mut metrics = Metrics::new();

        let model = match task_type {
            TaskType::Classification => {
                let (labels, encoded) = ClassLabels::fit(&data.labels);
                let train_y: Vec<u32> = gather(&encoded, &split.train);
                let mut params = RandomForestClassifierParameters::default()
                    .with_n_trees(n_estimators as u16)
                    .with_min_samples_split(min_samples_split)
                    .with_seed(TRAIN_SEED);
                if let Some(depth) = max_depth {
                    params = params.with_max_depth(depth as u16);
                }
                let model = RandomForestClassifier::fit(&train_x, &train_y, params)
                    .map_err(|e| CoreError::Training(format!("random forest training failed: {e}")))?;
                let predicted = model
                    .predict(&valid_x)
                    .map_err(|e| CoreError::Training(format!("holdout evaluation failed: {e}")))?;
                let decoded: Vec<f64> = predicted.iter().map(|c| labels.decode(*c)).collect();
                metrics.insert("accuracy".to_string(), accuracy(&valid_truth, &decoded));
                ForestModel::Classifier { model, labels }
            }
            TaskType::Regression => {
                let train_y: Vec<f64> = gather(&data.labels, &split.train);
                let mut params = RandomForestRegressorParameters::default()
                    .with_n_trees(n_estimators)
                    .with_min_samples_split(min_samples_split)
                    .with_seed(TRAIN_SEED);
                if let Some(depth) = max_depth {
                    params = params.with_max_depth(depth as u16);
                }
                let model = RandomForestRegressor::fit(&train_x, &train_y, params)
                    .map_err(|e| CoreError::Training(format!("random forest training failed: {e}")))?;
                let predicted = model
                    .predict(&valid_x)
                    .map_err(|e| CoreError::Training(format!("holdout evaluation failed: {e}")))?;
                metrics.insert(
                    "mse".to_string(),
                    mean_squared_error(&valid_truth, &predicted),
                );
                metrics.insert("r2_score".to_string(), r2_score(&valid_truth, &predicted));
                ForestModel::Regressor(model)
            }
        };

        let state = TreeEnsembleState {
            model,
            feature_count: data.n_features(),
        };
        Ok((Box::new(state), metrics))
    }

    fn predict(&self, state: &dyn ModelState, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        let state = state
            .as_any()
            .downcast_ref::<TreeEnsembleState>()
            .ok_or_else(|| {
                CoreError::Validation(
                    "model state does not belong to the tree_ensemble family".to_string(),
                )
            })?;
        validate_predict_rows(features, state.feature_count)?;
        if features.is_empty() {
            return Ok(Vec::new());
        }
        let x = predict_matrix(features)?;
        match &state.model {
            ForestModel::Classifier { model, labels } => {
                let classes = model
                    .predict(&x)
                    .map_err(|e| CoreError::Validation(format!("prediction failed: {e}")))?;
                Ok(classes.iter().map(|c| labels.decode(*c)).collect())
            }
            ForestModel::Regressor(model) => model
                .predict(&x)
                .map_err(|e| CoreError::Validation(format!("prediction failed: {e}"))),
        }
    }

    fn hyperparameter_schema(&self) -> Vec<HyperparameterSpec> {
        vec![
            HyperparameterSpec::new(
                "n_estimators",
                "Number of trees in the forest",
                serde_json::json!(100),
            ),
            HyperparameterSpec::new(
                "max_depth",
                "Maximum tree depth; unlimited when null",
                serde_json::Value::Null,
            ),
            HyperparameterSpec::new(
                "min_samples_split",
                "Minimum samples required to split a node",
                serde_json::json!(2),
            ),
        ]
    }
}
