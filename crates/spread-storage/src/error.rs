//! Error types for the storage layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by both the relational store and the array store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A non-error `model_runs` row already exists for `(model_name, init_time)`.
    #[error("duplicate run for model '{model_name}' at {init_time}")]
    DuplicateRun {
        model_name: String,
        init_time: chrono::DateTime<chrono::Utc>,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("field codec error: {0}")]
    Codec(String),

    #[error("no object found for handle '{0}'")]
    NotFound(String),
}
