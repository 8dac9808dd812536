//! Orchestrator: ties the fetcher registry, the metric engine, and both
//! stores together behind one `ingest_and_process` entry
//! point, plus the configuration surface and error taxonomy the rest of
//! the workspace consumes.

mod config;
mod error;
mod hook;
mod orchestrator;
mod registry;

pub use config::{load_model_schedule_configs, load_monitor_points, ModelScheduleConfig, SpreadConfig};
pub use error::{Result, SpreadError};
pub use hook::PostIngestHook;
pub use orchestrator::Orchestrator;
pub use registry::build_fetchers;

// Re-exported so downstream crates (the scheduler binary, tests) can name
// the canonical variable/fieldset types without depending on
// `spread-coords` directly.
pub use spread_coords::{FieldSet, Variable};
