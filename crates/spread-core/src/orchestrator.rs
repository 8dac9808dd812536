//! The per-(model, init-time) workflow: idempotency check, fetch, regrid,
//! compute, persist, finalize, as a multi-stage pipeline with per-stage
//! local error recovery and a relational run-row state machine driving
//! idempotency instead of an existence check against the array store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use spread_coords::{Field, FieldSet, Variable};
use spread_fetch::ModelFetcher;
use spread_metrics::{grid_divergence, point_metrics, MonitorPoint, PairPointMetric};
use spread_storage::{
    handle_key, ArrayBackend, GridSnapshotRow, ModelRun, PointMetricRow, RelationalBackend,
    RunStatus, StorageError,
};

use crate::error::{Result, SpreadError};
use crate::hook::PostIngestHook;

/// Grid divergence's regrid target resolution.
const GRID_CELL_STEP_DEGREES: f64 = 0.25;

/// Per-model state accumulated across the fetch stage: which relational
/// run this model's data belongs to, and what it returned per lead hour.
struct ModelContext {
    run_id: Uuid,
    hours: BTreeMap<u32, FieldSet>,
}

/// Owns the fetcher registry and both stores; one instance is shared
/// across every scheduled job, though multiple orchestrators may run
/// simultaneously against the same database without corrupting state.
pub struct Orchestrator {
    relational: Box<dyn RelationalBackend>,
    array_store: Box<dyn ArrayBackend>,
    fetchers: HashMap<String, Arc<dyn ModelFetcher>>,
    monitor_points: Vec<MonitorPoint>,
    job_deadline: Duration,
    hook: Option<Arc<dyn PostIngestHook>>,
}

impl Orchestrator {
    /// `relational`/`array_store` take anything implementing the storage
    /// capability traits — the real `sqlx`/`object_store`-backed types in
    /// production, an in-memory fake in tests (per spec.md §9's
    /// "capability abstractions, not inheritance").
    pub fn new(
        relational: impl RelationalBackend + 'static,
        array_store: impl ArrayBackend + 'static,
        fetchers: Vec<Arc<dyn ModelFetcher>>,
        monitor_points: Vec<MonitorPoint>,
        job_deadline: Duration,
    ) -> Self {
        let fetchers = fetchers
            .into_iter()
            .map(|f| (f.model_name().to_string(), f))
            .collect();

        Self {
            relational: Box::new(relational),
            array_store: Box::new(array_store),
            fetchers,
            monitor_points,
            job_deadline,
            hook: None,
        }
    }

    /// Registers the optional post-ingest hook.
    pub fn with_hook(mut self, hook: Arc<dyn PostIngestHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Runs the full 7-step orchestrator flow for one `(model_name,
    /// init_time)`, returning the terminal `ModelRun` row. `init_time`
    /// defaults to the latest 6-hour UTC cycle boundary when omitted.
    #[instrument(skip(self), fields(model_name, run_id))]
    pub async fn ingest_and_process(
        &self,
        model_name: &str,
        init_time: Option<DateTime<Utc>>,
    ) -> Result<ModelRun> {
        let init_time = init_time.unwrap_or_else(|| latest_cycle_boundary(Utc::now()));

        let fetcher = self
            .fetchers
            .get(model_name)
            .cloned()
            .ok_or_else(|| SpreadError::UnknownModel(model_name.to_string()))?;

        // Step 2: idempotency probe.
        if let Some(existing) = self.relational.find_run(model_name, init_time).await? {
            return match existing.status {
                RunStatus::Complete => Ok(existing),
                RunStatus::Pending => Err(SpreadError::ConcurrentRunInProgress {
                    model_name: model_name.to_string(),
                    init_time,
                }),
                RunStatus::Error => unreachable!("find_run never returns an error-status row"),
            };
        }

        // Step 3: create the run row.
        let run_id = self.relational.insert_run(model_name, init_time).await?;
        info!(%run_id, %init_time, "created run");

        match tokio::time::timeout(
            self.job_deadline,
            self.run_body(run_id, model_name, fetcher.as_ref(), init_time),
        )
        .await
        {
            Ok(Ok(run)) => Ok(run),
            Ok(Err(e)) => {
                warn!(%run_id, error = %e, "run failed, finalizing as error");
                self.finalize_as_error_best_effort(run_id).await;
                Err(e)
            }
            Err(_elapsed) => {
                warn!(%run_id, "job exceeded its deadline, finalizing as error");
                self.finalize_as_error_best_effort(run_id).await;
                Err(SpreadError::JobDeadlineExceeded {
                    model_name: model_name.to_string(),
                    init_time,
                })
            }
        }
    }

    async fn finalize_as_error_best_effort(&self, run_id: Uuid) {
        if let Err(e) = self
            .relational
            .update_run_status(run_id, RunStatus::Error, &[])
            .await
        {
            error!(%run_id, error = %e, "failed to finalize run as error after an earlier failure");
        }
    }

    /// Steps 4-7. Returns `Ok` for both the successful-completion path and
    /// the "zero primary hours" graceful-stop path (both are ordinary
    /// run outcomes, not exceptions); returns `Err` only for failures the
    /// caller must finalize-as-error and re-raise.
    async fn run_body(
        &self,
        run_id: Uuid,
        model_name: &str,
        fetcher: &dyn ModelFetcher,
        init_time: DateTime<Utc>,
    ) -> Result<ModelRun> {
        let variables = Variable::ALL;

        // Step 4: fetch primary.
        let primary_hours = match fetcher
            .fetch(init_time, &variables, fetcher.default_lead_hours())
            .await
        {
            Ok(hours) if !hours.is_empty() => hours,
            Ok(_) => {
                warn!(model_name, %init_time, "primary fetch returned zero lead hours");
                self.relational
                    .update_run_status(run_id, RunStatus::Error, &[])
                    .await?;
                return self.terminal_run(run_id).await;
            }
            Err(e) => {
                warn!(model_name, %init_time, error = %e, "primary fetch failed");
                self.relational
                    .update_run_status(run_id, RunStatus::Error, &[])
                    .await?;
                return self.terminal_run(run_id).await;
            }
        };

        let forecast_hours: Vec<u32> = primary_hours.iter().map(|(h, _)| *h).collect();
        self.relational
            .update_run_status(run_id, RunStatus::Pending, &forecast_hours)
            .await?;

        let mut runs: BTreeMap<String, ModelContext> = BTreeMap::new();
        runs.insert(
            model_name.to_string(),
            ModelContext {
                run_id,
                hours: primary_hours.into_iter().collect(),
            },
        );

        // Step 5: gather companions.
        for (other_name, other_fetcher) in self.fetchers.iter() {
            if other_name == model_name {
                continue;
            }

            let companion_run = match self.relational.find_run(other_name, init_time).await {
                Ok(Some(r)) if matches!(r.status, RunStatus::Complete) => r,
                Ok(_) => continue,
                Err(e) => {
                    warn!(model = %other_name, error = %e, "companion run lookup failed");
                    continue;
                }
            };

            match other_fetcher
                .fetch(init_time, &variables, other_fetcher.default_lead_hours())
                .await
            {
                Ok(hours) if !hours.is_empty() => {
                    runs.insert(
                        other_name.clone(),
                        ModelContext {
                            run_id: companion_run.id,
                            hours: hours.into_iter().collect(),
                        },
                    );
                }
                Ok(_) => {
                    info!(model = %other_name, "companion re-fetch returned zero hours");
                }
                Err(e) => {
                    warn!(model = %other_name, error = %e, "companion re-fetch failed");
                }
            }
        }

        // Step 6: compute & persist, ascending lead hour, canonical
        // variable order.
        let mut lead_hours = BTreeSet::new();
        for ctx in runs.values() {
            lead_hours.extend(ctx.hours.keys().copied());
        }

        let mut all_metrics = Vec::new();

        for lead_hour in lead_hours {
            let fieldsets: BTreeMap<String, FieldSet> = runs
                .iter()
                .filter_map(|(name, ctx)| {
                    ctx.hours.get(&lead_hour).map(|fs| (name.clone(), fs.clone()))
                })
                .collect();

            if fieldsets.len() < 2 {
                continue;
            }

            let metric_rows = point_metrics(&fieldsets, lead_hour, &self.monitor_points);
            match self.persist_point_metrics(&runs, &metric_rows).await {
                Ok(()) => all_metrics.extend(metric_rows),
                Err(e) => error!(lead_hour, error = %e, "failed to persist point metrics"),
            }

            for &variable in Variable::ALL.iter() {
                let fields: BTreeMap<String, &Field> = fieldsets
                    .iter()
                    .filter_map(|(name, fs)| fs.get(&variable).map(|f| (name.clone(), f)))
                    .collect();

                if fields.len() < 2 {
                    continue;
                }

                if let Err(e) = self
                    .persist_grid_divergence(init_time, lead_hour, variable, &fields)
                    .await
                {
                    error!(
                        lead_hour,
                        variable = variable.as_str(),
                        error = %e,
                        "failed to compute/persist grid divergence"
                    );
                }
            }
        }

        // Step 7: finalize.
        self.relational
            .update_run_status(run_id, RunStatus::Complete, &forecast_hours)
            .await?;
        let run = self.terminal_run(run_id).await?;

        if let Some(hook) = &self.hook {
            hook.on_complete(&run, &all_metrics).await;
        }

        Ok(run)
    }

    async fn terminal_run(&self, run_id: Uuid) -> Result<ModelRun> {
        self.relational
            .get_run(run_id)
            .await?
            .ok_or_else(|| SpreadError::Storage(StorageError::NotFound(run_id.to_string())))
    }

    async fn persist_point_metrics(
        &self,
        runs: &BTreeMap<String, ModelContext>,
        rows: &[PairPointMetric],
    ) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let run_a_id = runs
                .get(&row.model_a)
                .map(|c| c.run_id)
                .ok_or_else(|| SpreadError::UnknownModel(row.model_a.clone()))?;
            let run_b_id = runs
                .get(&row.model_b)
                .map(|c| c.run_id)
                .ok_or_else(|| SpreadError::UnknownModel(row.model_b.clone()))?;

            out.push(PointMetricRow {
                run_a_id,
                run_b_id,
                variable: row.variable.as_str().to_string(),
                lat: row.lat,
                lon: row.lon,
                lead_hour: row.lead_hour as i32,
                rmse: row.rmse,
                bias: row.bias,
                spread: row.spread,
            });
        }

        self.relational.insert_point_metrics(&out).await?;
        Ok(())
    }

    async fn persist_grid_divergence(
        &self,
        init_time: DateTime<Utc>,
        lead_hour: u32,
        variable: Variable,
        fields: &BTreeMap<String, &Field>,
    ) -> Result<()> {
        let divergence = match grid_divergence(fields, variable, lead_hour, GRID_CELL_STEP_DEGREES)
        {
            Some(d) => d,
            None => return Ok(()),
        };

        let key = handle_key(init_time, variable.as_str(), lead_hour);
        let field = Field::regular(
            divergence.lat_axis.clone(),
            divergence.lon_axis.clone(),
            divergence.values.clone(),
        )?;
        let handle = self.array_store.put(&key, &field).await?;

        let bbox_json = serde_json::to_string(&divergence.bbox)
            .map_err(|e| SpreadError::Storage(StorageError::Codec(e.to_string())))?;

        self.relational
            .insert_grid_snapshot(&GridSnapshotRow {
                init_time,
                variable: variable.as_str().to_string(),
                lead_hour: lead_hour as i32,
                array_handle: handle,
                bbox_json,
            })
            .await?;

        Ok(())
    }
}

/// The latest wall-clock 6-hour UTC cycle boundary at or before `now`.
fn latest_cycle_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    let cycle_hour = (now.hour() / 6) * 6;
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), cycle_hour, 0, 0)
        .single()
        .expect("cycle_hour is always a valid hour-of-day")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_down_to_nearest_six_hour_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 13, 45, 0).unwrap();
        assert_eq!(
            latest_cycle_boundary(now),
            Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn leaves_an_exact_boundary_unchanged() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 18, 0, 0).unwrap();
        assert_eq!(latest_cycle_boundary(now), now);
    }

    #[test]
    fn rounds_down_across_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 2, 0, 0).unwrap();
        assert_eq!(
            latest_cycle_boundary(now),
            Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap()
        );
    }
}
