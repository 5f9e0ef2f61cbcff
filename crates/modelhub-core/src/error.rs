//! Error types for modelhub-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Training error: {0}")]
    Training(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown model class: {0}")]
    UnknownModelClass(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
