//! The optional post-ingest hook — the one alerting surface this
//! workspace ships, short of a standalone notification service.

use async_trait::async_trait;

use spread_metrics::PairPointMetric;
use spread_storage::ModelRun;

/// Invoked once per `ingest_and_process` run that reaches `complete`,
/// with the finalized run and every pairwise point metric it computed.
/// Hook failures are logged and never affect the run's own status.
#[async_trait]
pub trait PostIngestHook: Send + Sync {
    async fn on_complete(&self, run: &ModelRun, metrics: &[PairPointMetric]);
}
