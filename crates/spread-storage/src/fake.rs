//! In-memory fakes for `RelationalBackend`/`ArrayBackend`, so the
//! orchestrator's idempotency, partial-failure, and companion-model
//! logic can be exercised without a live Postgres or filesystem —
//! grounded on the teacher's `test-utils` fixture style, generalized
//! from tile/path fixtures to fakes of the storage traits themselves.
//! Gated behind the `test-support` feature so it never ships in a
//! production binary.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use spread_coords::Field;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::relational::{GridSnapshotRow, ModelRun, PointMetricRow, RunStatus};
use crate::traits::{ArrayBackend, RelationalBackend};

/// An in-memory stand-in for `RelationalStore`, enforcing the same
/// `(model_name, init_time)` non-error uniqueness invariant.
#[derive(Default)]
pub struct FakeRelationalStore {
    runs: Mutex<Vec<ModelRun>>,
    point_metrics: Mutex<Vec<PointMetricRow>>,
    grid_snapshots: Mutex<Vec<GridSnapshotRow>>,
}

impl FakeRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn point_metric_count(&self) -> usize {
        self.point_metrics.lock().unwrap().len()
    }

    pub fn grid_snapshot_count(&self) -> usize {
        self.grid_snapshots.lock().unwrap().len()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

#[async_trait]
impl RelationalBackend for FakeRelationalStore {
    async fn insert_run(&self, model_name: &str, init_time: DateTime<Utc>) -> Result<Uuid> {
        let mut runs = self.runs.lock().unwrap();
        let duplicate = runs
            .iter()
            .any(|r| r.model_name == model_name && r.init_time == init_time && r.status != RunStatus::Error);
        if duplicate {
            return Err(StorageError::DuplicateRun {
                model_name: model_name.to_string(),
                init_time,
            });
        }

        let id = Uuid::new_v4();
        runs.push(ModelRun {
            id,
            model_name: model_name.to_string(),
            init_time,
            forecast_hours: Vec::new(),
            status: RunStatus::Pending,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn find_run(
        &self,
        model_name: &str,
        init_time: DateTime<Utc>,
    ) -> Result<Option<ModelRun>> {
        let runs = self.runs.lock().unwrap();
        Ok(runs
            .iter()
            .filter(|r| r.model_name == model_name && r.init_time == init_time && r.status != RunStatus::Error)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<ModelRun>> {
        Ok(self.runs.lock().unwrap().iter().find(|r| r.id == run_id).cloned())
    }

    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        forecast_hours: &[u32],
    ) -> Result<()> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| StorageError::NotFound(run_id.to_string()))?;
        run.status = status;
        run.forecast_hours = forecast_hours.iter().map(|&h| h as i32).collect();
        Ok(())
    }

    async fn insert_point_metrics(&self, rows: &[PointMetricRow]) -> Result<()> {
        self.point_metrics.lock().unwrap().extend_from_slice(rows);
        Ok(())
    }

    async fn insert_grid_snapshot(&self, row: &GridSnapshotRow) -> Result<Uuid> {
        self.grid_snapshots.lock().unwrap().push(row.clone());
        Ok(Uuid::new_v4())
    }
}

/// An in-memory stand-in for `ArrayStore`, holding decoded `Field`
/// values directly rather than round-tripping through the
/// bincode+flate2 wire codec — the codec itself is exercised by
/// `spread-storage`'s own `put`/`get` tests.
#[derive(Default)]
pub struct FakeArrayStore {
    objects: Mutex<HashMap<String, Field>>,
}

impl FakeArrayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ArrayBackend for FakeArrayStore {
    async fn put(&self, handle_key: &str, field: &Field) -> Result<String> {
        self.objects
            .lock()
            .unwrap()
            .insert(handle_key.to_string(), field.clone());
        Ok(handle_key.to_string())
    }

    async fn get(&self, handle: &str) -> Result<Field> {
        self.objects
            .lock()
            .unwrap()
            .get(handle)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(handle.to_string()))
    }

    async fn exists(&self, handle: &str) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(handle))
    }

    async fn drop_tree(&self, prefix: &str) -> Result<u64> {
        let mut objects = self.objects.lock().unwrap();
        let before = objects.len();
        objects.retain(|k, _| !k.starts_with(prefix));
        Ok((before - objects.len()) as u64)
    }
}
