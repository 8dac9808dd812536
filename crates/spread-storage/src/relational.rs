//! Relational store: `model_runs` / `point_metrics` / `grid_snapshots`,
//! grounded on `storage::catalog::Catalog`'s `PgPool` + embedded-schema-
//! migration pattern.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::traits::RelationalBackend;

/// Lifecycle state of a `model_runs` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Complete,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Complete => "complete",
            RunStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "complete" => Ok(RunStatus::Complete),
            "error" => Ok(RunStatus::Error),
            other => Err(StorageError::Codec(format!("unknown run status '{other}'"))),
        }
    }
}

/// A `model_runs` row.
#[derive(Debug, Clone)]
pub struct ModelRun {
    pub id: Uuid,
    pub model_name: String,
    pub init_time: DateTime<Utc>,
    pub forecast_hours: Vec<i32>,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
}

/// One row to insert into `point_metrics`.
#[derive(Debug, Clone)]
pub struct PointMetricRow {
    pub run_a_id: Uuid,
    pub run_b_id: Uuid,
    pub variable: String,
    pub lat: f64,
    pub lon: f64,
    pub lead_hour: i32,
    pub rmse: f64,
    pub bias: f64,
    pub spread: f64,
}

/// A `grid_snapshots` row to insert, `bbox` already serialized to JSON text.
#[derive(Debug, Clone)]
pub struct GridSnapshotRow {
    pub init_time: DateTime<Utc>,
    pub variable: String,
    pub lead_hour: i32,
    pub array_handle: String,
    pub bbox_json: String,
}

/// Database connection pool and `model_runs`/`point_metrics`/`grid_snapshots`
/// operations.
pub struct RelationalStore {
    pool: PgPool,
}

impl RelationalStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with_pool_size(database_url, 10).await
    }

    pub async fn connect_with_pool_size(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run the embedded schema migration. Safe to call repeatedly.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    /// Creates a pending run. Fails with `DuplicateRun` if a non-error row
    /// already exists for `(model_name, init_time)` — the partial unique
    /// index on `model_runs` is the actual race guard; this surfaces its
    /// violation as a typed error instead of a raw `sqlx::Error`.
    #[instrument(skip(self))]
    pub async fn insert_run(
        &self,
        model_name: &str,
        init_time: DateTime<Utc>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();

        let result = sqlx::query(
            "INSERT INTO model_runs (id, model_name, init_time, forecast_hours, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(model_name)
        .bind(init_time)
        .bind(Vec::<i32>::new())
        .bind(RunStatus::Pending.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(id),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StorageError::DuplicateRun {
                    model_name: model_name.to_string(),
                    init_time,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Idempotency probe: the most recent non-error run for this
    /// `(model_name, init_time)`, if one exists.
    #[instrument(skip(self))]
    pub async fn find_run(
        &self,
        model_name: &str,
        init_time: DateTime<Utc>,
    ) -> Result<Option<ModelRun>> {
        let row = sqlx::query_as::<_, ModelRunRow>(
            "SELECT id, model_name, init_time, forecast_hours, status, created_at \
             FROM model_runs \
             WHERE model_name = $1 AND init_time = $2 AND status <> 'error' \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(model_name)
        .bind(init_time)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Fetches a run by id regardless of status — used to return the
    /// terminal `ModelRun` row after a finalize-as-error path where
    /// `find_run` (which filters out `error` rows) can't be reused.
    #[instrument(skip(self))]
    pub async fn get_run(&self, run_id: Uuid) -> Result<Option<ModelRun>> {
        let row = sqlx::query_as::<_, ModelRunRow>(
            "SELECT id, model_name, init_time, forecast_hours, status, created_at \
             FROM model_runs WHERE id = $1",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// The latest run of any status for this model, used by the scheduler's
    /// overlap-prevention check.
    #[instrument(skip(self))]
    pub async fn find_latest_run(&self, model_name: &str) -> Result<Option<ModelRun>> {
        let row = sqlx::query_as::<_, ModelRunRow>(
            "SELECT id, model_name, init_time, forecast_hours, status, created_at \
             FROM model_runs WHERE model_name = $1 \
             ORDER BY init_time DESC LIMIT 1",
        )
        .bind(model_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self))]
    pub async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        forecast_hours: &[u32],
    ) -> Result<()> {
        let hours: Vec<i32> = forecast_hours.iter().map(|&h| h as i32).collect();
        sqlx::query("UPDATE model_runs SET status = $1, forecast_hours = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(hours)
            .bind(run_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Batch-inserts pairwise point metric rows for one orchestrator run.
    #[instrument(skip(self, rows), fields(count = rows.len()))]
    pub async fn insert_point_metrics(&self, rows: &[PointMetricRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO point_metrics \
                 (id, run_a_id, run_b_id, variable, lat, lon, lead_hour, rmse, bias, spread, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(Uuid::new_v4())
            .bind(row.run_a_id)
            .bind(row.run_b_id)
            .bind(&row.variable)
            .bind(row.lat)
            .bind(row.lon)
            .bind(row.lead_hour)
            .bind(row.rmse)
            .bind(row.bias)
            .bind(row.spread)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn insert_grid_snapshot(&self, row: &GridSnapshotRow) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO grid_snapshots (id, init_time, variable, lead_hour, array_handle, bbox, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6::jsonb, $7)",
        )
        .bind(id)
        .bind(row.init_time)
        .bind(&row.variable)
        .bind(row.lead_hour)
        .bind(&row.array_handle)
        .bind(&row.bbox_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Point metric rows within `±0.5°` of `(lat, lon)`, newest-first —
    /// the proximity filter + ordering an out-of-scope HTTP query layer
    /// would need.
    #[instrument(skip(self))]
    pub async fn find_point_metrics_near(
        &self,
        lat: f64,
        lon: f64,
        variable: &str,
    ) -> Result<Vec<PointMetricRow>> {
        let rows = sqlx::query_as::<_, PointMetricRowRecord>(
            "SELECT run_a_id, run_b_id, variable, lat, lon, lead_hour, rmse, bias, spread \
             FROM point_metrics \
             WHERE variable = $1 AND ABS(lat - $2) <= 0.5 AND ABS(lon - $3) <= 0.5 \
             ORDER BY created_at DESC",
        )
        .bind(variable)
        .bind(lat)
        .bind(lon)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Newest-first grid snapshot summary for a variable — the other
    /// HTTP-layer read query an out-of-scope query surface would need.
    #[instrument(skip(self))]
    pub async fn find_grid_snapshots(
        &self,
        variable: &str,
        limit: i64,
    ) -> Result<Vec<GridSnapshotRow>> {
        let rows = sqlx::query_as::<_, GridSnapshotRecord>(
            "SELECT init_time, variable, lead_hour, array_handle, bbox::text AS bbox_json \
             FROM grid_snapshots WHERE variable = $1 ORDER BY init_time DESC LIMIT $2",
        )
        .bind(variable)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl RelationalBackend for RelationalStore {
    async fn insert_run(&self, model_name: &str, init_time: DateTime<Utc>) -> Result<Uuid> {
        RelationalStore::insert_run(self, model_name, init_time).await
    }

    async fn find_run(
        &self,
        model_name: &str,
        init_time: DateTime<Utc>,
    ) -> Result<Option<ModelRun>> {
        RelationalStore::find_run(self, model_name, init_time).await
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<ModelRun>> {
        RelationalStore::get_run(self, run_id).await
    }

    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        forecast_hours: &[u32],
    ) -> Result<()> {
        RelationalStore::update_run_status(self, run_id, status, forecast_hours).await
    }

    async fn insert_point_metrics(&self, rows: &[PointMetricRow]) -> Result<()> {
        RelationalStore::insert_point_metrics(self, rows).await
    }

    async fn insert_grid_snapshot(&self, row: &GridSnapshotRow) -> Result<Uuid> {
        RelationalStore::insert_grid_snapshot(self, row).await
    }
}

#[derive(FromRow)]
struct ModelRunRow {
    id: Uuid,
    model_name: String,
    init_time: DateTime<Utc>,
    forecast_hours: Vec<i32>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ModelRunRow> for ModelRun {
    type Error = StorageError;

    fn try_from(row: ModelRunRow) -> Result<Self> {
        Ok(ModelRun {
            id: row.id,
            model_name: row.model_name,
            init_time: row.init_time,
            forecast_hours: row.forecast_hours,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct PointMetricRowRecord {
    run_a_id: Uuid,
    run_b_id: Uuid,
    variable: String,
    lat: f64,
    lon: f64,
    lead_hour: i32,
    rmse: f64,
    bias: f64,
    spread: f64,
}

impl From<PointMetricRowRecord> for PointMetricRow {
    fn from(r: PointMetricRowRecord) -> Self {
        PointMetricRow {
            run_a_id: r.run_a_id,
            run_b_id: r.run_b_id,
            variable: r.variable,
            lat: r.lat,
            lon: r.lon,
            lead_hour: r.lead_hour,
            rmse: r.rmse,
            bias: r.bias,
            spread: r.spread,
        }
    }
}

#[derive(FromRow)]
struct GridSnapshotRecord {
    init_time: DateTime<Utc>,
    variable: String,
    lead_hour: i32,
    array_handle: String,
    bbox_json: String,
}

impl From<GridSnapshotRecord> for GridSnapshotRow {
    fn from(r: GridSnapshotRecord) -> Self {
        GridSnapshotRow {
            init_time: r.init_time,
            variable: r.variable,
            lead_hour: r.lead_hour,
            array_handle: r.array_handle,
            bbox_json: r.bbox_json,
        }
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS model_runs (
    id UUID PRIMARY KEY,
    model_name VARCHAR(16) NOT NULL,
    init_time TIMESTAMPTZ NOT NULL,
    forecast_hours INTEGER[] NOT NULL DEFAULT '{}',
    status VARCHAR(10) NOT NULL DEFAULT 'pending',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_model_runs_model_name ON model_runs(model_name);
CREATE INDEX IF NOT EXISTS idx_model_runs_init_time ON model_runs(init_time);

CREATE UNIQUE INDEX IF NOT EXISTS idx_model_runs_active_unique
    ON model_runs(model_name, init_time) WHERE status <> 'error';

CREATE TABLE IF NOT EXISTS point_metrics (
    id UUID PRIMARY KEY,
    run_a_id UUID NOT NULL REFERENCES model_runs(id),
    run_b_id UUID NOT NULL REFERENCES model_runs(id),
    variable VARCHAR(32) NOT NULL,
    lat DOUBLE PRECISION NOT NULL,
    lon DOUBLE PRECISION NOT NULL,
    lead_hour INTEGER NOT NULL,
    rmse DOUBLE PRECISION NOT NULL,
    bias DOUBLE PRECISION NOT NULL,
    spread DOUBLE PRECISION NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_point_metrics_run_a ON point_metrics(run_a_id);
CREATE INDEX IF NOT EXISTS idx_point_metrics_run_b ON point_metrics(run_b_id);
CREATE INDEX IF NOT EXISTS idx_point_metrics_variable ON point_metrics(variable);
CREATE INDEX IF NOT EXISTS idx_point_metrics_lead_hour ON point_metrics(lead_hour);

CREATE TABLE IF NOT EXISTS grid_snapshots (
    id UUID PRIMARY KEY,
    init_time TIMESTAMPTZ NOT NULL,
    variable VARCHAR(32) NOT NULL,
    lead_hour INTEGER NOT NULL,
    array_handle VARCHAR(512) NOT NULL,
    bbox JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_grid_snapshots_init_time ON grid_snapshots(init_time);
CREATE INDEX IF NOT EXISTS idx_grid_snapshots_variable ON grid_snapshots(variable);
"#;
