//! Wall-clock cron: one job per model, each fired at its nominal
//! 00/06/12/18 UTC cycle boundary offset by that provider's typical
//! publication latency, dispatched into the orchestrator.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Timelike, Utc};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use spread_core::{ModelScheduleConfig, Orchestrator};

/// How often the scheduler wakes up to check whether any model's fire
/// time has arrived.
const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Dispatches `(model, latest_cycle)` jobs into the orchestrator on a
/// wall-clock cron, one job per configured model.
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    models: Vec<ModelScheduleConfig>,
    /// The cycle boundary each model was last dispatched for, so a tick
    /// that lands after the fire time doesn't re-fire the same cycle.
    last_fired_cycle: Mutex<HashMap<String, DateTime<Utc>>>,
    /// Models with a job currently in flight. A model's own job must not
    /// overlap its previous invocation, but that must not block other
    /// models' jobs from firing concurrently.
    in_flight: Mutex<HashSet<String>>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, models: Vec<ModelScheduleConfig>) -> Self {
        Self {
            orchestrator,
            models,
            last_fired_cycle: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Runs every enabled model's job once, unconditionally, for the
    /// latest cycle boundary — used by `--once` single-shot invocations.
    /// Jobs for distinct models run concurrently, same as the cron loop.
    pub async fn run_all_once(self: &Arc<Self>) {
        let mut tasks = JoinSet::new();
        for model in &self.models {
            if !model.enabled {
                info!(model = %model.model_name, "model disabled, skipping");
                continue;
            }
            let cycle = latest_cycle_boundary(Utc::now() - ChronoDuration::hours(model.cycle_offset_hours as i64));
            let scheduler = Arc::clone(self);
            let model_name = model.model_name.clone();
            tasks.spawn(async move { scheduler.dispatch(&model_name, cycle).await });
        }
        while tasks.join_next().await.is_some() {}
    }

    /// Runs a single named model's job once, for the latest cycle
    /// boundary its own offset resolves to.
    pub async fn run_model_once(&self, model_name: &str) -> anyhow::Result<()> {
        let model = self
            .models
            .iter()
            .find(|m| m.model_name == model_name)
            .ok_or_else(|| anyhow::anyhow!("no schedule config for model '{model_name}'"))?;

        let cycle = latest_cycle_boundary(Utc::now() - ChronoDuration::hours(model.cycle_offset_hours as i64));
        self.dispatch(&model.model_name, cycle).await;
        Ok(())
    }

    /// Polls forever, firing each model's job once its offset cycle
    /// boundary arrives, until `shutdown` fires. On shutdown, no new jobs
    /// are dispatched; jobs already in flight are allowed to reach a safe
    /// checkpoint before the loop itself returns. Distinct models' jobs
    /// run concurrently with each other — each is spawned rather than
    /// awaited in place, so a long-running job for one model never
    /// delays another model's fire time.
    pub async fn run_forever(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut tasks = JoinSet::new();

        loop {
            self.tick(&mut tasks).await;

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("scheduler shutting down, no new jobs will be dispatched");
                    break;
                }
                _ = tokio::time::sleep(TICK_INTERVAL) => {}
            }
        }

        info!(pending = tasks.len(), "waiting for in-flight jobs to reach a safe checkpoint");
        while tasks.join_next().await.is_some() {}
    }

    /// Checks every enabled model's fire time and spawns a dispatch task
    /// for any that are due and not already in flight. Spawned tasks are
    /// tracked in `tasks` so the caller can drain them on shutdown.
    async fn tick(self: &Arc<Self>, tasks: &mut JoinSet<()>) {
        let now = Utc::now();

        for model in &self.models {
            if !model.enabled {
                continue;
            }

            let fire_for = latest_cycle_boundary(now - ChronoDuration::hours(model.cycle_offset_hours as i64));

            let already_fired = {
                let fired = self.last_fired_cycle.lock().await;
                fired.get(&model.model_name) == Some(&fire_for)
            };
            if already_fired {
                continue;
            }

            let busy = self.in_flight.lock().await.contains(&model.model_name);
            if busy {
                // Coalesce-or-skip: the previous invocation for this
                // model hasn't reached a safe checkpoint yet.
                warn!(model = %model.model_name, "previous job still in flight, skipping this cycle");
                continue;
            }

            self.last_fired_cycle
                .lock()
                .await
                .insert(model.model_name.clone(), fire_for);

            let scheduler = Arc::clone(self);
            let model_name = model.model_name.clone();
            tasks.spawn(async move { scheduler.dispatch(&model_name, fire_for).await });
        }
    }

    #[instrument(skip(self))]
    async fn dispatch(&self, model_name: &str, cycle: DateTime<Utc>) {
        self.in_flight.lock().await.insert(model_name.to_string());

        info!(model = model_name, %cycle, "dispatching ingestion job");
        match self.orchestrator.ingest_and_process(model_name, Some(cycle)).await {
            Ok(run) => info!(model = model_name, %cycle, status = ?run.status, "job reached terminal status"),
            Err(e) => error!(model = model_name, %cycle, error = %e, "job failed"),
        }

        self.in_flight.lock().await.remove(model_name);
    }
}

/// The latest wall-clock 6-hour UTC cycle boundary at or before `at`
/// (mirrors `spread_core::Orchestrator`'s own resolution so the
/// scheduler and the orchestrator agree on cycle arithmetic).
fn latest_cycle_boundary(at: DateTime<Utc>) -> DateTime<Utc> {
    let cycle_hour = (at.hour() / 6) * 6;
    Utc.with_ymd_and_hms(at.year(), at.month(), at.day(), cycle_hour, 0, 0)
        .single()
        .expect("cycle_hour is always a valid hour-of-day")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_past_six_hours_still_resolves_the_earlier_cycle() {
        // ECMWF: offset 8h past its 00Z cycle: at 08:30Z the fire time has
        // arrived, but the cycle being fired for is still 00Z, not 06Z.
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 8, 30, 0).unwrap();
        let effective = now - ChronoDuration::hours(8);
        assert_eq!(
            latest_cycle_boundary(effective),
            Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn rounds_down_across_midnight() {
        let at = Utc.with_ymd_and_hms(2026, 7, 28, 1, 0, 0).unwrap();
        assert_eq!(
            latest_cycle_boundary(at),
            Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap()
        );
    }
}
