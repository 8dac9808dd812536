//! Capability interfaces for both halves of the storage layer —
//! `RelationalBackend` and `ArrayBackend` — so the orchestrator can be
//! driven by either the real `sqlx`/`object_store`-backed
//! implementations or an in-memory fake, per spec.md §9's "capability
//! abstractions, not inheritance" and the testing surface §8 asks for.
//! A small interface parameterized by the concrete backend, not a class
//! hierarchy.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use spread_coords::Field;
use uuid::Uuid;

use crate::error::Result;
use crate::relational::{GridSnapshotRow, ModelRun, PointMetricRow, RunStatus};

/// The relational store's operations, exactly per spec.md §4.4.
#[async_trait]
pub trait RelationalBackend: Send + Sync {
    async fn insert_run(&self, model_name: &str, init_time: DateTime<Utc>) -> Result<Uuid>;

    async fn find_run(
        &self,
        model_name: &str,
        init_time: DateTime<Utc>,
    ) -> Result<Option<ModelRun>>;

    async fn get_run(&self, run_id: Uuid) -> Result<Option<ModelRun>>;

    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        forecast_hours: &[u32],
    ) -> Result<()>;

    async fn insert_point_metrics(&self, rows: &[PointMetricRow]) -> Result<()>;

    async fn insert_grid_snapshot(&self, row: &GridSnapshotRow) -> Result<Uuid>;
}

/// The array store's operations, exactly per spec.md §4.4.
#[async_trait]
pub trait ArrayBackend: Send + Sync {
    async fn put(&self, handle_key: &str, field: &Field) -> Result<String>;

    async fn get(&self, handle: &str) -> Result<Field>;

    async fn exists(&self, handle: &str) -> Result<bool>;

    async fn drop_tree(&self, prefix: &str) -> Result<u64>;
}

// Blanket impls so a shared `Arc<FakeRelationalStore>`/`Arc<FakeArrayStore>`
// can be handed to `Orchestrator::new` directly while a test still holds
// its own clone for assertions — without these, `Arc<T>` wouldn't satisfy
// the trait bound even though `T` does.
#[async_trait]
impl<T: RelationalBackend + ?Sized> RelationalBackend for Arc<T> {
    async fn insert_run(&self, model_name: &str, init_time: DateTime<Utc>) -> Result<Uuid> {
        (**self).insert_run(model_name, init_time).await
    }

    async fn find_run(
        &self,
        model_name: &str,
        init_time: DateTime<Utc>,
    ) -> Result<Option<ModelRun>> {
        (**self).find_run(model_name, init_time).await
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<ModelRun>> {
        (**self).get_run(run_id).await
    }

    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        forecast_hours: &[u32],
    ) -> Result<()> {
        (**self).update_run_status(run_id, status, forecast_hours).await
    }

    async fn insert_point_metrics(&self, rows: &[PointMetricRow]) -> Result<()> {
        (**self).insert_point_metrics(rows).await
    }

    async fn insert_grid_snapshot(&self, row: &GridSnapshotRow) -> Result<Uuid> {
        (**self).insert_grid_snapshot(row).await
    }
}

#[async_trait]
impl<T: ArrayBackend + ?Sized> ArrayBackend for Arc<T> {
    async fn put(&self, handle_key: &str, field: &Field) -> Result<String> {
        (**self).put(handle_key, field).await
    }

    async fn get(&self, handle: &str) -> Result<Field> {
        (**self).get(handle).await
    }

    async fn exists(&self, handle: &str) -> Result<bool> {
        (**self).exists(handle).await
    }

    async fn drop_tree(&self, prefix: &str) -> Result<u64> {
        (**self).drop_tree(prefix).await
    }
}
