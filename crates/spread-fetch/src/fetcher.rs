//! The `ModelFetcher` capability contract: a single async
//! `fetch(init_time, variables, lead_hours)` entry point every per-model
//! implementation satisfies.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use spread_coords::{FieldSet, Variable};

use crate::error::Result;

/// A polymorphic per-model data source. One impl per concrete model
/// (GFS, NAM CONUSNEST, ECMWF IFS, HRRR); extensible to more without
/// touching the orchestrator — a small interface parameterized by
/// model-specific config, not a class hierarchy.
#[async_trait]
pub trait ModelFetcher: Send + Sync {
    /// The canonical short model name stored on `ModelRun` (uppercase).
    fn model_name(&self) -> &'static str;

    /// The full lead-hour schedule this model publishes — the set the
    /// orchestrator requests by default when no caller-specified subset
    /// is given.
    fn default_lead_hours(&self) -> &'static [u32];

    /// Fetches the requested variables at the requested lead hours for
    /// one initialization time.
    ///
    /// `lead_hours` is caller-ordered; the returned sequence preserves
    /// ascending order and MAY be a subset — an hour this fetcher didn't
    /// successfully decode is simply absent, never a placeholder entry.
    /// `init_time` must already be timezone-stripped UTC by the caller.
    async fn fetch(
        &self,
        init_time: DateTime<Utc>,
        variables: &[Variable],
        lead_hours: &[u32],
    ) -> Result<Vec<(u32, FieldSet)>>;
}
