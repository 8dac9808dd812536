//! HRRR fetcher: 3-km Lambert Conformal projected grid, lead hours
//! 0-48 step 6.

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
    decode_values, derive_wind_speed, LEVEL_HEIGHT_10M, LEVEL_ISOBARIC_500HPA,
    LEVEL_MEAN_SEA_LEVEL, LEVEL_SURFACE,
};
use crate::lambert::LambertConformal;
use crate::scratch::ScratchDir;
use crate::support::{download, fetch_per_hour};

const MODEL: &str = "HRRR";
const LEAD_HOURS: [u32; 9] = [0, 6, 12, 18, 24, 30, 36, 42, 48];

pub struct HrrrFetcher {
    client: Client,
    base_url: String,
    timeout: Duration,
    projection: LambertConformal,
}

impl HrrrFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: "https://nomads.ncep.noaa.gov/cgi-bin/filter_hrrr_2d.pl".to_string(),
            timeout: Duration::from_secs(600),
            projection: LambertConformal::hrrr(),
        }
    }

    /// Overrides the per-lead-hour fetch timeout (wired from the
    /// `fetch_timeout_seconds` configuration surface).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn default_lead_hours() -> &'static [u32] {
        &LEAD_HOURS
    }

    fn message_url(&self, init_time: DateTime<Utc>, lead_hour: u32) -> String {
        format!(
            "{}?file=hrrr.t{:02}z.wrfsfcf{:02}.grib2&dir=%2Fhrrr.{}%2Fconus",
            self.base_url,
            init_time.format("%H"),
            lead_hour,
            init_time.format("%Y%m%d"),
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

        decode_hour(&self.projection, variables, &bytes, lead_hour)
    }
}

fn decode_variable(
    var: Variable,
    projection: &LambertConformal,
    bytes: &Bytes,
    lead_hour: u32,
) -> Result<Field> {
    let (lat_2d, lon_2d) = projection.build_latlon_grid();
    let ny = projection.ny;
    let nx = projection.nx;

    match var {
        Variable::Precip => {
            let values = decode_values(
                MODEL,
                lead_hour,
                bytes,
                &["APCP"],
                LEVEL_SURFACE,
                var.canonical_unit(),
            )?;
            Ok(Field::projected(lat_2d, lon_2d, ny, nx, values)?)
        }
        Variable::Mslp => {
            let values = decode_values(
                MODEL,
                lead_hour,
                bytes,
                &["MSLMA", "PRMSL"],
                LEVEL_MEAN_SEA_LEVEL,
                var.canonical_unit(),
            )?;
            Ok(Field::projected(lat_2d, lon_2d, ny, nx, values)?)
        }
        Variable::Hgt500 => {
            let values = decode_values(
                MODEL,
                lead_hour,
                bytes,
                &["HGT"],
                LEVEL_ISOBARIC_500HPA,
                var.canonical_unit(),
            )?;
            Ok(Field::projected(lat_2d, lon_2d, ny, nx, values)?)
        }
        Variable::WindSpeed => {
            let unit = var.canonical_unit();
            let u = decode_values(MODEL, lead_hour, bytes, &["UGRD"], LEVEL_HEIGHT_10M, unit)?;
            let v = decode_values(MODEL, lead_hour, bytes, &["VGRD"], LEVEL_HEIGHT_10M, unit)?;
            let speed = derive_wind_speed(&u, &v);
            Ok(Field::projected(lat_2d, lon_2d, ny, nx, speed)?)
        }
    }
}

/// Decodes every requested variable independently — one variable's
/// decode failure is caught and logged rather than aborting the whole
/// lead hour, so a partial `FieldSet` still comes back when some but
/// not all variables decode. Fails only when not a single requested
/// variable decoded.
fn decode_hour(
    projection: &LambertConformal,
    variables: &[Variable],
    bytes: &Bytes,
    lead_hour: u32,
) -> Result<FieldSet> {
    let mut fields = FieldSet::new();
    let mut last_err = None;

    for &var in variables {
        match decode_variable(var, projection, bytes, lead_hour) {
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
impl ModelFetcher for HrrrFetcher {
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
    fn message_url_embeds_cycle_and_two_digit_lead_hour() {
        let fetcher = HrrrFetcher::new(Client::new());
        let init = Utc.with_ymd_and_hms(2026, 7, 28, 18, 0, 0).unwrap();
        let url = fetcher.message_url(init, 6);
        assert!(url.contains("wrfsfcf06"));
        assert!(url.contains("t18z"));
    }
}
