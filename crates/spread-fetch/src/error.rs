//! The fetcher-boundary error taxonomy.

use thiserror::Error;

/// Errors a `ModelFetcher` can raise. `Skipped` never escapes a fetcher
/// — it's caught at the per-lead-hour boundary and only contributes to
/// a log record and a narrowed `forecast_hours` list (per-hour
/// isolation — one bad lead hour doesn't sink the whole run).
#[derive(Error, Debug)]
pub enum FetchError {
    /// No lead hour could be downloaded (network/HTTP failure for all
    /// of them).
    #[error("source unavailable for {model}: {reason}")]
    SourceUnavailable { model: String, reason: String },

    /// Downloaded bytes could not be parsed as a valid message.
    #[error("decode failure for {model} lead hour {lead_hour}: {reason}")]
    DecodeFailure {
        model: String,
        lead_hour: u32,
        reason: String,
    },

    /// A required variable was absent from the decoded message set.
    #[error("unexpected schema for {model}: missing {variable}")]
    UnexpectedSchema { model: String, variable: String },

    /// Internal: one lead hour's decode failed and was caught. Never
    /// returned to the orchestrator — folded into the `Ok` result with
    /// that hour omitted.
    #[error("lead hour {lead_hour} skipped: {reason}")]
    Skipped { lead_hour: u32, reason: String },

    /// A decoded field's coordinates didn't form a valid regular or
    /// projected grid — surfaces as a decode failure for whichever hour
    /// built it.
    #[error("invalid grid while decoding: {0}")]
    InvalidGrid(#[from] spread_coords::KernelError),
}

pub type Result<T> = std::result::Result<T, FetchError>;
