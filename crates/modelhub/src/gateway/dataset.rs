//! Dataset gateway: resolves a dataset name to an in-memory table.

use async_trait::async_trait;
use modelhub_core::TrainingData;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum DatasetGatewayError {
    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("Unsupported dataset format: {0}")]
    Unsupported(String),

    #[error("Failed to parse dataset {name}: {reason}")]
    Parse { name: String, reason: String },

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DatasetResult<T> = std::result::Result<T, DatasetGatewayError>;

/// Narrow interface to the dataset store. The core only consumes resolved
/// tables; dataset upload and version control stay with the store's own
/// tooling.
#[async_trait]
pub trait DatasetGateway: Send + Sync {
    /// Resolve a dataset name to a feature/label table. The last column is
    /// the label.
    async fn resolve(&self, name: &str) -> DatasetResult<TrainingData>;
}

/// Resolves dataset names against files in a local directory. Supports
/// `.csv` (header row, numeric cells) and `.json` (array of flat objects
/// with a `label` field).
pub struct LocalDatasetGateway {
    datasets_dir: PathBuf,
}

impl LocalDatasetGateway {
    pub fn new(datasets_dir: impl Into<PathBuf>) -> Self {
        Self {
            datasets_dir: datasets_dir.into(),
        }
    }
}

#[async_trait]
impl DatasetGateway for LocalDatasetGateway {
    async fn resolve(&self, name: &str) -> DatasetResult<TrainingData> {
        if name.contains('/') || name.contains('\\') {
            return Err(DatasetGatewayError::NotFound(name.to_string()));
        }
        let path = self.datasets_dir.join(name);
        if !tokio::fs::try_exists(&path).await? {
            return Err(DatasetGatewayError::NotFound(name.to_string()));
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let data = match extension(&path) {
            Some("csv") => parse_csv(name, &content)?,
            Some("json") => parse_json(name, &content)?,
            _ => return Err(DatasetGatewayError::Unsupported(name.to_string())),
        };
        info!(
            dataset = %name,
            rows = data.n_rows(),
            features = data.n_features(),
            "resolved dataset"
        );
        Ok(data)
    }
}

/// Named in-memory datasets, for tests and embedded use.
pub struct InMemoryDatasetGateway {
    datasets: RwLock<HashMap<String, TrainingData>>,
}

impl InMemoryDatasetGateway {
    pub fn new() -> Self {
        Self {
            datasets: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, name: impl Into<String>, data: TrainingData) {
        if let Ok(mut datasets) = self.datasets.write() {
            datasets.insert(name.into(), data);
        }
    }
}

impl Default for InMemoryDatasetGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatasetGateway for InMemoryDatasetGateway {
    async fn resolve(&self, name: &str) -> DatasetResult<TrainingData> {
        let datasets = self
            .datasets
            .read()
            .map_err(|e| DatasetGatewayError::Gateway(format!("failed to acquire lock: {e}")))?;
        datasets
            .get(name)
            .cloned()
            .ok_or_else(|| DatasetGatewayError::NotFound(name.to_string()))
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

fn parse_csv(name: &str, content: &str) -> DatasetResult<TrainingData> {
    let parse_err = |reason: String| DatasetGatewayError::Parse {
        name: name.to_string(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| parse_err(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.len() < 2 {
        return Err(parse_err(
            "need at least one feature column and a label column".to_string(),
        ));
    }

    let mut features = Vec::new();
    let mut labels = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|e| parse_err(e.to_string()))?;
        if record.len() != headers.len() {
            return Err(parse_err(format!(
                "row {i} has {} columns, expected {}",
                record.len(),
                headers.len()
            )));
        }
        let mut row = Vec::with_capacity(headers.len() - 1);
        for (j, cell) in record.iter().enumerate() {
            let value: f64 = cell
                .parse()
                .map_err(|_| parse_err(format!("non-numeric value {cell:?} at row {i}, column {j}")))?;
            if j + 1 == headers.len() {
                labels.push(value);
            } else {
                row.push(value);
            }
        }
        features.push(row);
    }

    let feature_names = headers[..headers.len() - 1].to_vec();
    Ok(TrainingData::new(feature_names, features, labels))
}

/// JSON datasets are an array of flat objects; the `label` key is the
/// target and every other key (in sorted order) is a feature.
fn parse_json(name: &str, content: &str) -> DatasetResult<TrainingData> {
    let parse_err = |reason: String| DatasetGatewayError::Parse {
        name: name.to_string(),
        reason,
    };

    let rows: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_str(content).map_err(|e| parse_err(e.to_string()))?;
    let first = rows
        .first()
        .ok_or_else(|| parse_err("dataset has no rows".to_string()))?;
    if !first.contains_key("label") {
        return Err(parse_err("rows must carry a \"label\" field".to_string()));
    }
    let mut feature_names: Vec<String> =
        first.keys().filter(|k| *k != "label").cloned().collect();
    feature_names.sort();
    if feature_names.is_empty() {
        return Err(parse_err("rows have no feature fields".to_string()));
    }

    let mut features = Vec::with_capacity(rows.len());
    let mut labels = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let mut values = Vec::with_capacity(feature_names.len());
        for key in &feature_names {
            let value = row
                .get(key)
                .and_then(serde_json::Value::as_f64)
                .ok_or_else(|| parse_err(format!("missing or non-numeric {key:?} at row {i}")))?;
            values.push(value);
        }
        let label = row
            .get("label")
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| parse_err(format!("missing or non-numeric label at row {i}")))?;
        features.push(values);
        labels.push(label);
    }

    Ok(TrainingData::new(feature_names, features, labels))
}
