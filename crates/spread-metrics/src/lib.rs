//! Metric Engine: stateless functions computing pairwise RMSE/bias,
//! ensemble spread (sample standard deviation, n-1), and per-grid-cell
//! divergence, layered as resample-then-compute over `spread-coords`
//! `Field` values. Nothing here does I/O — the orchestrator in
//! `spread-core` is responsible for handing this crate already-fetched
//! `FieldSet`s and persisting what it returns.

mod grid;
mod point;
mod stats;

pub use grid::{grid_divergence, GridDivergence};
pub use point::{point_metrics, MonitorPoint, PairPointMetric};
pub use stats::sample_stddev;
