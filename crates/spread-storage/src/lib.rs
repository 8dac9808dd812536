//! Storage layer: a relational store (`model_runs` /
//! `point_metrics` / `grid_snapshots` via `sqlx`/Postgres) and an array
//! store (chunked-compressed 2-D float fields via `object_store`'s local
//! filesystem backend).
//!
//! Grounded on `storage::catalog::Catalog` and
//! `storage::object_store::ObjectStorage`, re-schema'd for this pipeline's
//! tables and handle layout instead of a WMS tile catalog.

mod array;
mod error;
mod relational;
mod traits;

#[cfg(feature = "test-support")]
mod fake;

pub use array::{handle_key, ArrayStore};
pub use error::{Result, StorageError};
pub use relational::{
    GridSnapshotRow, ModelRun, PointMetricRow, RelationalStore, RunStatus,
};
pub use traits::{ArrayBackend, RelationalBackend};

#[cfg(feature = "test-support")]
pub use fake::{FakeArrayStore, FakeRelationalStore};
