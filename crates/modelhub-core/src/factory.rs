//! Maps model class names to adapter constructors.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapter::ModelAdapter;
use crate::error::{CoreError, Result};

type AdapterCtor = Box<dyn Fn() -> Arc<dyn ModelAdapter> + Send + Sync>;

/// Explicit registry of model families, built once at process start and
/// passed into the lifecycle service. New families register a constructor
/// here; there is no ambient global mapping.
#[derive(Default)]
pub struct ModelFactory {
    constructors: BTreeMap<String, AdapterCtor>,
}

impl ModelFactory {
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Register a constructor for a model class name.
    pub fn register(
        &mut self,
        class: impl Into<String>,
        ctor: impl Fn() -> Arc<dyn ModelAdapter> + Send + Sync + 'static,
    ) {
        self.constructors.insert(class.into(), Box::new(ctor));
    }

    /// Construct a fresh, untrained adapter for a model class.
    pub fn create(&self, class: &str) -> Result<Arc<dyn ModelAdapter>> {
        self.constructors
            .get(class)
            .map(|ctor| ctor())
            .ok_or_else(|| CoreError::UnknownModelClass(class.to_string()))
    }

    pub fn contains(&self, class: &str) -> bool {
        self.constructors.contains_key(class)
    }

    /// Registered class names, in lexicographic order.
    pub fn class_names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }
}
