//! Builds the fixed four-model fetcher registry, wiring the shared
//! `fetch_timeout_seconds` configuration value into each fetcher.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use spread_fetch::{EcmwfIfsFetcher, GfsFetcher, HrrrFetcher, ModelFetcher, NamConusNestFetcher};

/// One `reqwest::Client` shared by every fetcher, each wrapped with the
/// same `with_timeout` override.
pub fn build_fetchers(fetch_timeout_seconds: u64) -> Vec<Arc<dyn ModelFetcher>> {
    let client = Client::new();
    let timeout = Duration::from_secs(fetch_timeout_seconds);

    vec![
        Arc::new(GfsFetcher::new(client.clone()).with_timeout(timeout)),
        Arc::new(NamConusNestFetcher::new(client.clone()).with_timeout(timeout)),
        Arc::new(EcmwfIfsFetcher::new(client.clone()).with_timeout(timeout)),
        Arc::new(HrrrFetcher::new(client).with_timeout(timeout)),
    ]
}
