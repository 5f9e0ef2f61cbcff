//! The registry's unit of state for one trained-or-training model.

use modelhub_core::{Hyperparameters, Metrics, ModelId, ModelState, TaskType};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use strum_macros::{Display, EnumString};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Result, ServiceError};
use crate::gateway::TrackingRef;

/// Lifecycle state of a model record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    /// Record inserted, first training not finished yet
    Created,
    /// A training operation is in flight for this record
    Training,
    /// A trained snapshot is published and accepts predicts
    Ready,
    /// The most recent training failed
    Failed,
}

/// Point-in-time copy of a record's metadata, excluding the bulky trained
/// state. This is what `list`/`get` hand across the facade boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: ModelId,
    pub model_class: String,
    pub task_type: TaskType,
    pub status: ModelStatus,
    pub hyperparameters: Hyperparameters,
    pub metrics: Metrics,
    pub version: u64,
    pub tracking_ref: Option<TrackingRef>,
    pub created_at: String,
}

/// Immutable published view of a trained model: the state and the version
/// it corresponds to. Handed out by `Arc`, so deletion of the record never
/// invalidates a snapshot an in-flight predict is holding.
pub struct Snapshot {
    pub state: Box<dyn ModelState>,
    pub version: u64,
}

struct RecordMeta {
    task_type: TaskType,
    status: ModelStatus,
    hyperparameters: Hyperparameters,
    metrics: Metrics,
    version: u64,
    tracking_ref: Option<TrackingRef>,
    created_at: String,
}

/// Live registry entry for one model id.
///
/// Metadata and the published snapshot sit behind separate record-local
/// locks; both are held only for pointer-level reads and writes. The
/// `training` mutex is the per-record exclusive guard for mutating
/// operations (train, retrain, delete). Lock order is always meta before
/// published.
pub struct ModelEntry {
    id: ModelId,
    model_class: String,
    meta: RwLock<RecordMeta>,
    published: RwLock<Option<Arc<Snapshot>>>,
    training: Arc<Mutex<()>>,
}

impl ModelEntry {
    pub fn new(model_class: impl Into<String>, task_type: TaskType, hyperparameters: Hyperparameters) -> Self {
        Self {
            id: ModelId::new(),
            model_class: model_class.into(),
            meta: RwLock::new(RecordMeta {
                task_type,
                status: ModelStatus::Created,
                hyperparameters,
                metrics: Metrics::new(),
                version: 0,
                tracking_ref: None,
                created_at: chrono::Utc::now().to_rfc3339(),
            }),
            published: RwLock::new(None),
            training: Arc::new(Mutex::new(())),
        }
    }

    pub fn id(&self) -> &ModelId {
        &self.id
    }

    pub fn model_class(&self) -> &str {
        &self.model_class
    }

    /// Try to acquire the per-record exclusive guard without blocking.
    /// `None` means a mutating operation is already in flight.
    pub fn try_begin_mutation(&self) -> Option<OwnedMutexGuard<()>> {
        self.training.clone().try_lock_owned().ok()
    }

    pub fn status(&self) -> Result<ModelStatus> {
        Ok(self.read_meta()?.status)
    }

    pub fn set_status(&self, status: ModelStatus) -> Result<()> {
        self.write_meta()?.status = status;
        Ok(())
    }

    /// Mark the record failed, keeping the last-known-good snapshot,
    /// metrics and version untouched.
    pub fn mark_failed(&self) -> Result<()> {
        self.set_status(ModelStatus::Failed)
    }

    pub fn task_type(&self) -> Result<TaskType> {
        Ok(self.read_meta()?.task_type)
    }

    pub fn hyperparameters(&self) -> Result<Hyperparameters> {
        Ok(self.read_meta()?.hyperparameters.clone())
    }

    pub fn set_tracking_ref(&self, tracking_ref: TrackingRef) -> Result<()> {
        self.write_meta()?.tracking_ref = Some(tracking_ref);
        Ok(())
    }

    /// Status and published snapshot read as one consistent pair. Both
    /// reads happen under the meta read lock; `publish` holds the meta
    /// write lock across its snapshot swap, so a reader never observes
    /// `ready` paired with a missing snapshot.
    pub fn status_and_snapshot(&self) -> Result<(ModelStatus, Option<Arc<Snapshot>>)> {
        let meta = self.read_meta()?;
        let published = self.published.read().map_err(|e| {
            ServiceError::Registry(format!("failed to acquire snapshot read lock: {e}"))
        })?;
        Ok((meta.status, published.clone()))
    }

    /// Current published snapshot, if any. The read lock is released as
    /// soon as the `Arc` is cloned; inference never runs under it.
    pub fn snapshot(&self) -> Result<Option<Arc<Snapshot>>> {
        let published = self.published.read().map_err(|e| {
            ServiceError::Registry(format!("failed to acquire snapshot read lock: {e}"))
        })?;
        Ok(published.clone())
    }

    /// Atomically publish a successful training: bump the version, swap the
    /// snapshot in, record metrics and the hyperparameters that produced
    /// them, and flip the record to ready. Readers observe either the old
    /// snapshot or the new one, never an intermediate.
    pub fn publish(
        &self,
        state: Box<dyn ModelState>,
        metrics: Metrics,
        hyperparameters: Hyperparameters,
    ) -> Result<u64> {
        let mut meta = self.write_meta()?;
        let version = meta.version + 1;
        {
            let mut published = self.published.write().map_err(|e| {
                ServiceError::Registry(format!("failed to acquire snapshot write lock: {e}"))
            })?;
            *published = Some(Arc::new(Snapshot { state, version }));
        }
        meta.version = version;
        meta.metrics = metrics;
        meta.hyperparameters = hyperparameters;
        meta.tracking_ref = None;
        meta.status = ModelStatus::Ready;
        Ok(version)
    }

    /// Point-in-time metadata copy.
    pub fn record(&self) -> Result<ModelRecord> {
        let meta = self.read_meta()?;
        Ok(ModelRecord {
            id: self.id.clone(),
            model_class: self.model_class.clone(),
            task_type: meta.task_type,
            status: meta.status,
            hyperparameters: meta.hyperparameters.clone(),
            metrics: meta.metrics.clone(),
            version: meta.version,
            tracking_ref: meta.tracking_ref.clone(),
            created_at: meta.created_at.clone(),
        })
    }

    fn read_meta(&self) -> Result<std::sync::RwLockReadGuard<'_, RecordMeta>> {
        self.meta.read().map_err(|e| {
            ServiceError::Registry(format!("failed to acquire record read lock: {e}"))
        })
    }

    fn write_meta(&self) -> Result<std::sync::RwLockWriteGuard<'_, RecordMeta>> {
        self.meta.write().map_err(|e| {
            ServiceError::Registry(format!("failed to acquire record write lock: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    struct StubState(usize);

    impl ModelState for StubState {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn feature_count(&self) -> usize {
            self.0
        }
    }

    fn entry() -> ModelEntry {
        ModelEntry::new("tree_ensemble", TaskType::Classification, Hyperparameters::new())
    }

    #[test]
    fn test_new_entry_is_created_at_version_zero() {
        let entry = entry();
        let record = entry.record().unwrap();
        assert_eq!(record.status, ModelStatus::Created);
        assert_eq!(record.version, 0);
        assert!(entry.snapshot().unwrap().is_none());
    }

    #[test]
    fn test_publish_bumps_version_and_swaps_snapshot() {
        let entry = entry();
        let mut metrics = Metrics::new();
        metrics.insert("accuracy".to_string(), 0.9);

        let v1 = entry
            .publish(Box::new(StubState(4)), metrics.clone(), Hyperparameters::new())
            .unwrap();
        assert_eq!(v1, 1);
        assert_eq!(entry.status().unwrap(), ModelStatus::Ready);

        let old = entry.snapshot().unwrap().unwrap();
        assert_eq!(old.version, 1);

        let v2 = entry
            .publish(Box::new(StubState(4)), metrics, Hyperparameters::new())
            .unwrap();
        assert_eq!(v2, 2);
        // The snapshot handed out before the second publish is unaffected.
        assert_eq!(old.version, 1);
        assert_eq!(entry.snapshot().unwrap().unwrap().version, 2);
    }

    #[test]
    fn test_mark_failed_preserves_snapshot() {
        let entry = entry();
        entry
            .publish(Box::new(StubState(4)), Metrics::new(), Hyperparameters::new())
            .unwrap();
        entry.mark_failed().unwrap();

        assert_eq!(entry.status().unwrap(), ModelStatus::Failed);
        let snapshot = entry.snapshot().unwrap().unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(entry.record().unwrap().version, 1);
    }

    #[test]
    fn test_status_and_snapshot_pair_stays_consistent_under_publish() {
        // Race the paired read against concurrent publishes: ready must
        // never be observed alongside a missing snapshot.
        for _ in 0..500 {
            let entry = Arc::new(entry());
            let writer = {
                let entry = entry.clone();
                std::thread::spawn(move || {
                    entry
                        .publish(Box::new(StubState(4)), Metrics::new(), Hyperparameters::new())
                        .unwrap();
                })
            };
            let (status, snapshot) = entry.status_and_snapshot().unwrap();
            if status == ModelStatus::Ready {
                assert!(snapshot.is_some());
            }
            writer.join().unwrap();
        }
    }

    #[test]
    fn test_mutation_guard_is_exclusive() {
        let entry = entry();
        let guard = entry.try_begin_mutation().unwrap();
        assert!(entry.try_begin_mutation().is_none());
        drop(guard);
        assert!(entry.try_begin_mutation().is_some());
    }
}
