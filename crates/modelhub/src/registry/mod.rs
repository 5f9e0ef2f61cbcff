//! The authoritative in-memory model registry.

mod record;
mod store;

pub use record::{ModelEntry, ModelRecord, ModelStatus, Snapshot};
pub use store::ModelRegistry;
