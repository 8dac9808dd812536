//! Configuration surface: a `clap::Parser` struct with `env` overrides
//! for the database/array-store locations, scheduler switch, monitor
//! points, and per-lead-hour/per-job timeouts, plus YAML loaders for the
//! monitor-point list and per-model schedule configs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use spread_metrics::MonitorPoint;
use tracing::{debug, info, warn};

/// Top-level configuration surface, env-overridable via `clap`'s `env`
/// attribute and loadable from a local `.env` file through `dotenvy`.
#[derive(Parser, Debug, Clone)]
#[command(name = "spread-core")]
pub struct SpreadConfig {
    /// Location/credentials of the relational store.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Root directory for the array store.
    #[arg(long, env = "DATA_STORE_PATH", default_value = "data/spread-store")]
    pub data_store_path: PathBuf,

    /// Master switch for the scheduler; when false, ingestion is
    /// CLI-triggered only.
    #[arg(long, env = "SCHEDULER_ENABLED", default_value = "true")]
    pub scheduler_enabled: bool,

    /// YAML file holding the ordered `(lat, lon, label)` monitor points
    /// the metric engine evaluates every run.
    #[arg(long, env = "MONITOR_POINTS_PATH", default_value = "config/monitor_points.yaml")]
    pub monitor_points_path: PathBuf,

    /// CORS allow-list, consumed by the (out-of-scope) HTTP layer — kept
    /// here only because it's part of the shared configuration surface.
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Per-lead-hour external fetch timeout.
    #[arg(long, env = "FETCH_TIMEOUT_SECONDS", default_value = "600")]
    pub fetch_timeout_seconds: u64,

    /// Per-orchestrator-run hard deadline.
    #[arg(long, env = "JOB_DEADLINE_SECONDS", default_value = "3600")]
    pub job_deadline_seconds: u64,

    /// Directory holding per-model schedule YAML files
    /// (`<config_dir>/models/*.yaml`).
    #[arg(long, env = "CONFIG_DIR", default_value = "config")]
    pub config_dir: PathBuf,
}

impl SpreadConfig {
    /// Parses CLI args, applying `.env` overrides first via
    /// `dotenvy::dotenv().ok()` before `Args::parse()`.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }

    pub fn monitor_points(&self) -> Result<Vec<MonitorPoint>> {
        load_monitor_points(&self.monitor_points_path)
    }
}

/// One row of the `monitor_points.yaml` file.
#[derive(Debug, Clone, Deserialize)]
struct MonitorPointEntry {
    lat: f64,
    lon: f64,
    label: String,
}

/// Loads the ordered monitor-point list the metric engine evaluates
/// every run, from the `monitor_points` configuration surface.
pub fn load_monitor_points(path: &Path) -> Result<Vec<MonitorPoint>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read monitor points file: {}", path.display()))?;
    let entries: Vec<MonitorPointEntry> = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse monitor points file: {}", path.display()))?;

    debug!(count = entries.len(), path = %path.display(), "loaded monitor points");

    Ok(entries
        .into_iter()
        .map(|e| MonitorPoint {
            lat: e.lat,
            lon: e.lon,
            label: e.label,
        })
        .collect())
}

/// Per-model scheduling parameters: how far past its nominal 00/06/12/18
/// UTC cycle this model's fire time is offset, and whether it's enabled
/// at all — per-model publication latency resolved as config rather
/// than constants.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelScheduleConfig {
    pub model_name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Hours past the nominal cycle boundary before this model's data is
    /// expected to be available (NOMADS models ~5h, ECMWF ~7-9h).
    pub cycle_offset_hours: u32,
}

fn default_enabled() -> bool {
    true
}

/// Loads every `<config_dir>/models/*.yaml` schedule file, skipping any
/// that fail to parse (logged, not fatal — one bad config file shouldn't
/// take down every other model's schedule).
pub fn load_model_schedule_configs(config_dir: &Path) -> Result<Vec<ModelScheduleConfig>> {
    let models_dir = config_dir.join("models");

    if !models_dir.exists() {
        warn!(path = %models_dir.display(), "model schedule config directory not found");
        return Ok(Vec::new());
    }

    let mut configs = Vec::new();
    for entry in std::fs::read_dir(&models_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == "yaml" || ext == "yml") {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            match serde_yaml::from_str::<ModelScheduleConfig>(&content) {
                Ok(config) => {
                    info!(model = %config.model_name, "loaded model schedule config");
                    configs.push(config);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to parse model schedule config");
                }
            }
        }
    }

    Ok(configs)
}
