//! GFS (Global Forecast System) fetcher: 0.25° regular lat/lon grid,
//! lead hours 0-120 step 6.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::Client;
use spread_coords::{Field, FieldSet, Variable};
use tracing::warn;

use crate::error::{FetchError, Result};
use crate::fetcher::ModelFetcher;
use crate::grib::{
    decode_regular, derive_wind_speed, LEVEL_HEIGHT_10M, LEVEL_ISOBARIC_500HPA,
    LEVEL_MEAN_SEA_LEVEL, LEVEL_SURFACE,
};
use crate::scratch::ScratchDir;
use crate::support::{download, fetch_per_hour};

const MODEL: &str = "GFS";
const LEAD_HOURS: [u32; 21] = [
    0, 6, 12, 18, 24, 30, 36, 42, 48, 54, 60, 66, 72, 78, 84, 90, 96, 102, 108, 114, 120,
];

pub struct GfsFetcher {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl GfsFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: "https://nomads.ncep.noaa.gov/cgi-bin/filter_gfs_0p25.pl".to_string(),
            timeout: Duration::from_secs(600),
        }
    }

    /// Overrides the per-lead-hour fetch timeout (wired from the
    /// `fetch_timeout_seconds` configuration surface).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// All 21 standard lead hours this model publishes out to +120h.
    pub fn default_lead_hours() -> &'static [u32] {
        &LEAD_HOURS
    }

    fn message_url(&self, init_time: DateTime<Utc>, lead_hour: u32) -> String {
        format!(
            "{}?file=gfs.t{:02}z.pgrb2.0p25.f{:03}&dir=%2Fgfs.{}%2F{:02}%2Fatmos",
            self.base_url,
            init_time.format("%H"),
            lead_hour,
            init_time.format("%Y%m%d"),
            init_time.format("%H"),
        )
    }

    async fn fetch_hour(
        &self,
        init_time: DateTime<Utc>,
        variables: &[Variable],
        scratch: &ScratchDir,
        lead_hour: u32,
    ) -> Result<FieldSet> {
        let url = self.message_url(init_time, lead_hour);
        let bytes = download(&self.client, MODEL, &url, self.timeout).await?;

        let path = scratch.message_path(lead_hour);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| FetchError::DecodeFailure {
                model: MODEL.to_string(),
                lead_hour,
                reason: format!("could not stage {path:?} in scratch dir: {e}"),
            })?;

        decode_hour(variables, &bytes, lead_hour)
    }
}

fn decode_variable(var: Variable, bytes: &Bytes, lead_hour: u32) -> Result<Field> {
    match var {
        Variable::Precip => {
            let d = decode_regular(
                MODEL,
                lead_hour,
                bytes,
                &["APCP"],
                LEVEL_SURFACE,
                var.canonical_unit(),
            )?;
            Ok(Field::regular(d.lat_axis, d.lon_axis, d.values)?)
        }
        Variable::Mslp => {
            let d = decode_regular(
                MODEL,
                lead_hour,
                bytes,
                &["PRMSL"],
                LEVEL_MEAN_SEA_LEVEL,
                var.canonical_unit(),
            )?;
            Ok(Field::regular(d.lat_axis, d.lon_axis, d.values)?)
        }
        Variable::Hgt500 => {
            let d = decode_regular(
                MODEL,
                lead_hour,
                bytes,
                &["HGT"],
                LEVEL_ISOBARIC_500HPA,
                var.canonical_unit(),
            )?;
            Ok(Field::regular(d.lat_axis, d.lon_axis, d.values)?)
        }
        Variable::WindSpeed => {
            let unit = var.canonical_unit();
            let u = decode_regular(MODEL, lead_hour, bytes, &["UGRD"], LEVEL_HEIGHT_10M, unit)?;
            let v = decode_regular(MODEL, lead_hour, bytes, &["VGRD"], LEVEL_HEIGHT_10M, unit)?;
            let speed = derive_wind_speed(&u.values, &v.values);
            Ok(Field::regular(u.lat_axis, u.lon_axis, speed)?)
        }
    }
}

/// Decodes every requested variable independently — one variable's
/// `UnexpectedSchema`/`DecodeFailure` is caught and logged rather than
/// aborting the whole lead hour, so a partial `FieldSet` still comes
/// back when some but not all variables decode (the metric engine
/// already tolerates a variable present in only some models, per §4.3).
/// Fails only when not a single requested variable decoded.
fn decode_hour(variables: &[Variable], bytes: &Bytes, lead_hour: u32) -> Result<FieldSet> {
    let mut fields = FieldSet::new();
    let mut last_err = None;

    for &var in variables {
        match decode_variable(var, bytes, lead_hour) {
            Ok(field) => {
                fields.insert(var, field);
            }
            Err(e) => {
                warn!(model = MODEL, lead_hour, variable = %var, error = %e, "variable skipped for this lead hour");
                last_err = Some(e);
            }
        }
    }

    if fields.is_empty() && !variables.is_empty() {
        return Err(last_err.expect("variables non-empty and fields empty implies a recorded error"));
    }

    Ok(fields)
}

#[async_trait]
impl ModelFetcher for GfsFetcher {
    fn model_name(&self) -> &'static str {
        MODEL
    }

    fn default_lead_hours(&self) -> &'static [u32] {
        &LEAD_HOURS
    }

    async fn fetch(
        &self,
        init_time: DateTime<Utc>,
        variables: &[Variable],
        lead_hours: &[u32],
    ) -> Result<Vec<(u32, FieldSet)>> {
        let scratch = ScratchDir::new(MODEL)?;
        fetch_per_hour(MODEL, lead_hours, |lh| {
            self.fetch_hour(init_time, variables, &scratch, lh)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn message_url_embeds_cycle_and_lead_hour() {
        let fetcher = GfsFetcher::new(Client::new());
        let init = Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap();
        let url = fetcher.message_url(init, 24);
        assert!(url.contains("f024"));
        assert!(url.contains("t12z"));
        assert!(url.contains("20260728"));
    }
}
