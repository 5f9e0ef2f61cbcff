use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Modelhub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelHubConfig {
    /// Directory the local dataset gateway resolves names against
    pub datasets_dir: String,

    /// Log level
    pub log_level: String,

    /// Deadline for dataset gateway calls, in milliseconds
    pub dataset_timeout_ms: u64,

    /// Deadline for experiment tracker calls, in milliseconds
    pub tracker_timeout_ms: u64,
}

impl Default for ModelHubConfig {
    fn default() -> Self {
        Self {
            datasets_dir: "datasets".to_string(),
            log_level: "info".to_string(),
            dataset_timeout_ms: 30_000,
            tracker_timeout_ms: 5_000,
        }
    }
}

impl ModelHubConfig {
    /// Load from configuration file
    pub fn load_from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))
    }

    pub fn dataset_timeout(&self) -> Duration {
        Duration::from_millis(self.dataset_timeout_ms)
    }

    pub fn tracker_timeout(&self) -> Duration {
        Duration::from_millis(self.tracker_timeout_ms)
    }
}
