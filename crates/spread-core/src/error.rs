//! The orchestrator's error taxonomy: one enum covering idempotency
//! conflicts, fetch failures, kernel failures, and storage failures, each
//! section wrapping its crate's own error type.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpreadError>;

/// Errors `ingest_and_process` can return.
#[derive(Debug, Error)]
pub enum SpreadError {
    // === Idempotency-enforced conflicts ===
    /// A `pending` run already exists for `(model_name, init_time)` — the
    /// orchestrator's own pre-check, distinct from `DuplicateRun` (which
    /// surfaces the relational store's race-proof unique index instead).
    #[error("a run is already in progress for '{model_name}' at {init_time}")]
    ConcurrentRunInProgress {
        model_name: String,
        init_time: DateTime<Utc>,
    },

    /// A non-error `model_runs` row already exists for `(model_name,
    /// init_time)` — raised by the relational store's unique index when
    /// two `insert_run` calls race past the pre-check.
    #[error("duplicate run for '{model_name}' at {init_time}")]
    DuplicateRun {
        model_name: String,
        init_time: DateTime<Utc>,
    },

    /// No fetcher is registered for this model name.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// The run's `job_deadline_seconds` elapsed before the run could be
    /// finalized — the hard upper bound on a single ingestion job.
    #[error("job deadline exceeded for '{model_name}' at {init_time}")]
    JobDeadlineExceeded {
        model_name: String,
        init_time: DateTime<Utc>,
    },

    // === Fetcher-boundary errors ===
    #[error(transparent)]
    Fetch(#[from] spread_fetch::FetchError),

    // === Coordinate kernel errors ===
    #[error(transparent)]
    Kernel(#[from] spread_coords::KernelError),

    // === Storage failures ===
    #[error("storage failure: {0}")]
    Storage(spread_storage::StorageError),
}

impl From<spread_storage::StorageError> for SpreadError {
    fn from(err: spread_storage::StorageError) -> Self {
        match err {
            spread_storage::StorageError::DuplicateRun {
                model_name,
                init_time,
            } => SpreadError::DuplicateRun {
                model_name,
                init_time,
            },
            other => SpreadError::Storage(other),
        }
    }
}
