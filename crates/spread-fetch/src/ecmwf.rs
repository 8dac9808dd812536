//! ECMWF IFS (HRES) fetcher: 0.25° regular lat/lon grid, lead hours
//! 0-120 step 6. Surface fields and the 500 hPa geopotential height come
//! from two separately published products and are merged into one
//! `FieldSet` per lead hour.

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

const MODEL: &str = "ECMWF";
const LEAD_HOURS: [u32; 21] = [
    0, 6, 12, 18, 24, 30, 36, 42, 48, 54, 60, 66, 72, 78, 84, 90, 96, 102, 108, 114, 120,
];

pub struct EcmwfIfsFetcher {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl EcmwfIfsFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: "https://data.ecmwf.int/forecasts".to_string(),
            timeout: Duration::from_secs(600),
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

    fn surface_url(&self, init_time: DateTime<Utc>, lead_hour: u32) -> String {
        format!(
            "{}/{}/{}z/ifs/0p25/oper/{}{}0000-{}h-oper-fc.sfc.grib2",
            self.base_url,
            init_time.format("%Y%m%d"),
            init_time.format("%H"),
            init_time.format("%Y%m%d"),
            init_time.format("%H"),
            lead_hour,
        )
    }

    fn pressure_level_url(&self, init_time: DateTime<Utc>, lead_hour: u32) -> String {
        format!(
            "{}/{}/{}z/ifs/0p25/oper/{}{}0000-{}h-oper-fc.pl.grib2",
            self.base_url,
            init_time.format("%Y%m%d"),
            init_time.format("%H"),
            init_time.format("%Y%m%d"),
            init_time.format("%H"),
            lead_hour,
        )
    }

    async fn stage(&self, scratch: &ScratchDir, lead_hour: u32, bytes: &Bytes) -> Result<()> {
        let path = scratch.message_path(lead_hour);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| FetchError::DecodeFailure {
                model: MODEL.to_string(),
                lead_hour,
                reason: format!("could not stage {path:?} in scratch dir: {e}"),
            })
    }

    async fn fetch_hour(
        &self,
        init_time: DateTime<Utc>,
        variables: &[Variable],
        scratch: &ScratchDir,
        lead_hour: u32,
    ) -> Result<FieldSet> {
        let needs_surface = variables
            .iter()
            .any(|v| matches!(v, Variable::Precip | Variable::WindSpeed | Variable::Mslp));
        let needs_pressure_level = variables.iter().any(|v| matches!(v, Variable::Hgt500));

        let mut fields = FieldSet::new();

        if needs_surface {
            match self.decode_surface_product(init_time, variables, scratch, lead_hour).await {
                Ok(surface_fields) => fields.extend(surface_fields),
                Err(e) => warn!(model = MODEL, lead_hour, error = %e, "surface product skipped for this lead hour"),
            }
        }

        if needs_pressure_level {
            match self.decode_pressure_level_product(init_time, scratch, lead_hour).await {
                Ok(field) => {
                    fields.insert(Variable::Hgt500, field);
                }
                Err(e) => warn!(model = MODEL, lead_hour, error = %e, "pressure-level product skipped for this lead hour"),
            }
        }

        if fields.is_empty() && !variables.is_empty() {
            return Err(FetchError::UnexpectedSchema {
                model: MODEL.to_string(),
                variable: "no requested variable decoded for this lead hour".to_string(),
            });
        }

        Ok(fields)
    }

    async fn decode_surface_product(
        &self,
        init_time: DateTime<Utc>,
        variables: &[Variable],
        scratch: &ScratchDir,
        lead_hour: u32,
    ) -> Result<FieldSet> {
        let url = self.surface_url(init_time, lead_hour);
        let bytes = download(&self.client, MODEL, &url, self.timeout).await?;
        self.stage(scratch, lead_hour, &bytes).await?;
        decode_surface(variables, &bytes, lead_hour)
    }

    async fn decode_pressure_level_product(
        &self,
        init_time: DateTime<Utc>,
        scratch: &ScratchDir,
        lead_hour: u32,
    ) -> Result<Field> {
        let url = self.pressure_level_url(init_time, lead_hour);
        let bytes = download(&self.client, MODEL, &url, self.timeout).await?;
        self.stage(scratch, lead_hour, &bytes).await?;
        let d = decode_regular(
            MODEL,
            lead_hour,
            &bytes,
            &["HGT", "GH"],
            LEVEL_ISOBARIC_500HPA,
            Variable::Hgt500.canonical_unit(),
        )?;
        Ok(Field::regular(d.lat_axis, d.lon_axis, d.values)?)
    }
}

/// Decodes every surface variable independently — one variable's decode
/// failure is caught and logged rather than aborting the whole product,
/// so a partial `FieldSet` still comes back when some but not all
/// surface variables decode. Fails only when not a single requested
/// surface variable decoded.
fn decode_surface(variables: &[Variable], bytes: &Bytes, lead_hour: u32) -> Result<FieldSet> {
    let mut fields = FieldSet::new();
    let mut last_err = None;
    let surface_variables: Vec<Variable> = variables
        .iter()
        .copied()
        .filter(|v| matches!(v, Variable::Precip | Variable::Mslp | Variable::WindSpeed))
        .collect();

    for var in &surface_variables {
        let result: Result<Field> = (|| match var {
            Variable::Precip => {
                let d = decode_regular(
                    MODEL,
                    lead_hour,
                    bytes,
                    &["APCP", "TP"],
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
                    &["PRMSL", "MSL"],
                    LEVEL_MEAN_SEA_LEVEL,
                    var.canonical_unit(),
                )?;
                Ok(Field::regular(d.lat_axis, d.lon_axis, d.values)?)
            }
            Variable::WindSpeed => {
                let unit = var.canonical_unit();
                let u = decode_regular(MODEL, lead_hour, bytes, &["UGRD", "10U"], LEVEL_HEIGHT_10M, unit)?;
                let v = decode_regular(MODEL, lead_hour, bytes, &["VGRD", "10V"], LEVEL_HEIGHT_10M, unit)?;
                let speed = derive_wind_speed(&u.values, &v.values);
                Ok(Field::regular(u.lat_axis, u.lon_axis, speed)?)
            }
            Variable::Hgt500 => unreachable!("filtered to surface variables above"),
        })();

        match result {
            Ok(field) => {
                fields.insert(*var, field);
            }
            Err(e) => {
                warn!(model = MODEL, lead_hour, variable = %var, error = %e, "variable skipped for this lead hour");
                last_err = Some(e);
            }
        }
    }

    if fields.is_empty() && !surface_variables.is_empty() {
        return Err(last_err.expect("surface_variables non-empty and fields empty implies a recorded error"));
    }

    Ok(fields)
}

#[async_trait]
impl ModelFetcher for EcmwfIfsFetcher {
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
    fn surface_and_pressure_level_urls_differ_only_by_product_suffix() {
        let fetcher = EcmwfIfsFetcher::new(Client::new());
        let init = Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap();
        let sfc = fetcher.surface_url(init, 48);
        let pl = fetcher.pressure_level_url(init, 48);
        assert!(sfc.ends_with(".sfc.grib2"));
        assert!(pl.ends_with(".pl.grib2"));
        assert!(sfc.contains("48h"));
    }
}
