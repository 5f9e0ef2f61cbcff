//! In-memory map from model identity to live record.

use modelhub_core::{Hyperparameters, ModelId, TaskType};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::record::{ModelEntry, ModelRecord, ModelStatus};
use crate::error::{Result, ServiceError};

/// The central authority over model records.
///
/// The coarse map lock is held only for pointer-level insert, remove and
/// snapshot-copy; training and prediction work happen entirely outside it.
pub struct ModelRegistry {
    entries: RwLock<HashMap<String, Arc<ModelEntry>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate a fresh id and insert a record in `created` state. The id
    /// is handed back before training begins, so it survives a failed
    /// first training and supports retrain-by-id.
    pub fn create(
        &self,
        model_class: &str,
        task_type: TaskType,
        hyperparameters: Hyperparameters,
    ) -> Result<Arc<ModelEntry>> {
        let entry = Arc::new(ModelEntry::new(model_class, task_type, hyperparameters));
        let mut entries = self.write_entries()?;
        entries.insert(entry.id().as_str().to_string(), entry.clone());
        Ok(entry)
    }

    pub fn get(&self, id: &ModelId) -> Result<Arc<ModelEntry>> {
        let entries = self.read_entries()?;
        entries
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("model {id} not found")))
    }

    pub fn contains(&self, id: &ModelId) -> Result<bool> {
        Ok(self.read_entries()?.contains_key(id.as_str()))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read_entries()?.is_empty())
    }

    /// Point-in-time snapshot of every record's metadata, ordered by
    /// creation time. A record never appears half-written: each copy is
    /// taken under its own record lock after the map lock is released.
    pub fn list(&self) -> Result<Vec<ModelRecord>> {
        let entries: Vec<Arc<ModelEntry>> = {
            let map = self.read_entries()?;
            map.values().cloned().collect()
        };
        let mut records = entries
            .iter()
            .map(|entry| entry.record())
            .collect::<Result<Vec<_>>>()?;
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        Ok(records)
    }

    /// Remove a record. Permitted from `ready` or `failed`; a record whose
    /// training is in flight (or whose first training has not started) is
    /// a conflict. Holds the record's mutation guard across the status
    /// check and the removal so no training can begin mid-delete.
    /// Snapshots already handed out to in-flight predicts stay valid.
    pub fn remove(&self, id: &ModelId) -> Result<()> {
        let entry = self.get(id)?;
        let _guard = entry.try_begin_mutation().ok_or_else(|| {
            ServiceError::Conflict(format!("training in progress for model {id}"))
        })?;
        match entry.status()? {
            ModelStatus::Ready | ModelStatus::Failed => {}
            ModelStatus::Created | ModelStatus::Training => {
                return Err(ServiceError::Conflict(format!(
                    "model {id} cannot be deleted while its training is pending"
                )));
            }
        }
        let mut entries = self.write_entries()?;
        entries
            .remove(id.as_str())
            .ok_or_else(|| ServiceError::NotFound(format!("model {id} not found")))?;
        Ok(())
    }

    fn read_entries(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<ModelEntry>>>> {
        self.entries.read().map_err(|e| {
            ServiceError::Registry(format!("failed to acquire registry read lock: {e}"))
        })
    }

    fn write_entries(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<ModelEntry>>>> {
        self.entries.write().map_err(|e| {
            ServiceError::Registry(format!("failed to acquire registry write lock: {e}"))
        })
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelhub_core::Metrics;
    use modelhub_core::ModelState;
    use std::any::Any;

    struct StubState;

    impl ModelState for StubState {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn feature_count(&self) -> usize {
            1
        }
    }

    fn make_ready(entry: &ModelEntry) {
        entry
            .publish(Box::new(StubState), Metrics::new(), Hyperparameters::new())
            .unwrap();
    }

    #[test]
    fn test_create_and_get() {
        let registry = ModelRegistry::new();
        let entry = registry
            .create("linear", TaskType::Regression, Hyperparameters::new())
            .unwrap();

        let fetched = registry.get(entry.id()).unwrap();
        assert_eq!(fetched.id(), entry.id());
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn test_get_unknown_id() {
        let registry = ModelRegistry::new();
        assert!(matches!(
            registry.get(&ModelId::new()),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_is_a_copy() {
        let registry = ModelRegistry::new();
        let entry = registry
            .create("linear", TaskType::Regression, Hyperparameters::new())
            .unwrap();
        let listed = registry.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, ModelStatus::Created);

        make_ready(&entry);
        // The earlier copy is unaffected by later transitions.
        assert_eq!(listed[0].status, ModelStatus::Created);
    }

    #[test]
    fn test_remove_ready_record() {
        let registry = ModelRegistry::new();
        let entry = registry
            .create("linear", TaskType::Regression, Hyperparameters::new())
            .unwrap();
        make_ready(&entry);

        registry.remove(entry.id()).unwrap();
        assert!(matches!(
            registry.get(entry.id()),
            Err(ServiceError::NotFound(_))
        ));
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn test_remove_created_record_conflicts() {
        let registry = ModelRegistry::new();
        let entry = registry
            .create("linear", TaskType::Regression, Hyperparameters::new())
            .unwrap();
        assert!(matches!(
            registry.remove(entry.id()),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn test_remove_while_mutation_guard_held_conflicts() {
        let registry = ModelRegistry::new();
        let entry = registry
            .create("linear", TaskType::Regression, Hyperparameters::new())
            .unwrap();
        make_ready(&entry);

        let _guard = entry.try_begin_mutation().unwrap();
        assert!(matches!(
            registry.remove(entry.id()),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn test_remove_twice_reports_not_found() {
        let registry = ModelRegistry::new();
        let entry = registry
            .create("linear", TaskType::Regression, Hyperparameters::new())
            .unwrap();
        make_ready(&entry);

        registry.remove(entry.id()).unwrap();
        assert!(matches!(
            registry.remove(entry.id()),
            Err(ServiceError::NotFound(_))
        ));
    }
}
