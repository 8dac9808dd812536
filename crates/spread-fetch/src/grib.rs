//! Shared GRIB2 decode helpers built on the `grib2-parser` crate:
//! locate a message by parameter short name *and* vertical level,
//! unpack its data section, and (for regular grids) build the lat/lon
//! axes straight out of the grid-definition section.

use bytes::Bytes;
use grib2_parser::{Grib2Message, Grib2Reader};

use crate::error::FetchError;

/// A decoded message's grid definition, reduced to what the kernel
/// needs: either a regular axis pair or just the value count (the
/// Lambert-projected models build their own lat/lon arrays from fixed
/// per-model constants, see `lambert.rs`).
pub struct DecodedRegular {
    pub lat_axis: Vec<f64>,
    pub lon_axis: Vec<f64>,
    pub values: Vec<f64>,
}

/// `(level_type, level_value)` as GRIB2's product definition template 4
/// encodes the first fixed surface. A file carries the same parameter at
/// many vertical levels (GFS's `pgrb2.0p25` has `HGT` at ~25 isobaric
/// levels; ECMWF's `.pl.grib2` has `GH` at every pressure level), so
/// matching on parameter name alone silently binds to whichever level
/// happens to come first in the file.
pub type Level = (u8, u32);

/// Isobaric surface (level type 100), 500 hPa. GRIB2's scaled value for
/// this level type is in Pa.
pub const LEVEL_ISOBARIC_500HPA: Level = (100, 50_000);

/// Specified height above ground (level type 103), 10 m — the 10-m wind
/// components every model's `wind_speed` derives from.
pub const LEVEL_HEIGHT_10M: Level = (103, 10);

/// Ground/water surface (level type 1) — the accumulated-precipitation
/// field.
pub const LEVEL_SURFACE: Level = (1, 0);

/// Mean sea level (level type 101) — the MSLP field.
pub const LEVEL_MEAN_SEA_LEVEL: Level = (101, 0);

/// The physical unit a decoded GRIB2 parameter short name is known to
/// carry. `None` for a parameter this table doesn't recognize at all —
/// that's always a schema mismatch regardless of which variable asked
/// for it.
///
/// `HGT`'s scaled value is geopotential height in gpm, which this
/// pipeline treats as numerically equal to the canonical metre (matching
/// how every source publishes it); a raw geopotential field in m^2/s^2
/// would decode to `P0_3_4` under this table (category 3, number 4 has
/// no short-name mapping) rather than `HGT`, so it never reaches this
/// point silently mislabelled as height — see spec.md §9's "unit
/// conventions between providers" note.
fn source_unit(param: &str) -> Option<&'static str> {
    match param.to_ascii_uppercase().as_str() {
        "APCP" | "TP" => Some("mm"),
        "UGRD" | "10U" | "VGRD" | "10V" => Some("m/s"),
        "PRMSL" | "MSLET" | "MSLMA" | "MSL" => Some("Pa"),
        "HGT" => Some("m"),
        _ => None,
    }
}

/// Asserts the decoded parameter's known unit matches what the caller
/// expects before its values are accepted, per spec.md §9's "add
/// explicit unit assertions at the fetcher boundary" — a `GH`/`Z`
/// geopotential field publishing its values in a different unit than
/// canonical `hgt_500` meters would be caught here instead of flowing
/// silently into the metric engine.
fn assert_unit(model: &str, param: &str, expected_unit: &str) -> Result<(), FetchError> {
    match source_unit(param) {
        Some(unit) if unit == expected_unit => Ok(()),
        Some(unit) => Err(FetchError::UnexpectedSchema {
            model: model.to_string(),
            variable: format!(
                "decoded parameter '{param}' has unit '{unit}', expected '{expected_unit}'"
            ),
        }),
        None => Err(FetchError::UnexpectedSchema {
            model: model.to_string(),
            variable: format!("no known unit mapping for decoded parameter '{param}'"),
        }),
    }
}

fn find_message(
    model: &str,
    lead_hour: u32,
    data: &Bytes,
    param_matches: &[&str],
    level: Level,
    expected_unit: &str,
) -> Result<Grib2Message, FetchError> {
    let mut reader = Grib2Reader::new(data.clone());
    loop {
        match reader.next_message() {
            Ok(Some(msg)) => {
                let param_hit = param_matches
                    .iter()
                    .any(|p| msg.parameter().eq_ignore_ascii_case(p));
                let level_hit = msg.product_definition.level_type == level.0
                    && msg.product_definition.level_value == level.1;
                if param_hit && level_hit {
                    assert_unit(model, msg.parameter(), expected_unit)?;
                    return Ok(msg);
                }
            }
            Ok(None) => break,
            Err(e) => {
                return Err(FetchError::DecodeFailure {
                    model: model.to_string(),
                    lead_hour,
                    reason: e.to_string(),
                })
            }
        }
    }
    Err(FetchError::UnexpectedSchema {
        model: model.to_string(),
        variable: format!(
            "{} @ level type {} value {}",
            param_matches.join("/"),
            level.0,
            level.1
        ),
    })
}

/// Decode a regular-grid message's values plus the lat/lon axes built
/// from its grid-definition section (strictly monotonic 1-D axes).
pub fn decode_regular(
    model: &str,
    lead_hour: u32,
    data: &Bytes,
    param_matches: &[&str],
    level: Level,
    expected_unit: &str,
) -> Result<DecodedRegular, FetchError> {
    let msg = find_message(model, lead_hour, data, param_matches, level, expected_unit)?;
    let gd = &msg.grid_definition;

    let to_deg = |millideg: i32| millideg as f64 / 1000.0;
    let lat1 = to_deg(gd.first_latitude_millidegrees);
    let lat2 = to_deg(gd.last_latitude_millidegrees);
    let lon1 = to_deg(gd.first_longitude_millidegrees);
    let lon2 = to_deg(gd.last_longitude_millidegrees);
    let ny = gd.num_points_latitude as usize;
    let nx = gd.num_points_longitude as usize;

    if ny < 2 || nx < 2 {
        return Err(FetchError::DecodeFailure {
            model: model.to_string(),
            lead_hour,
            reason: "grid definition has fewer than 2 points on an axis".to_string(),
        });
    }

    let lat_step = (lat2 - lat1) / (ny as f64 - 1.0);
    let lon_step = (lon2 - lon1) / (nx as f64 - 1.0);
    let lat_axis: Vec<f64> = (0..ny).map(|i| lat1 + lat_step * i as f64).collect();
    let lon_axis: Vec<f64> = (0..nx).map(|j| lon1 + lon_step * j as f64).collect();

    let values = msg
        .unpack_data()
        .map_err(|e| FetchError::DecodeFailure {
            model: model.to_string(),
            lead_hour,
            reason: e.to_string(),
        })?
        .into_iter()
        .map(|v| v as f64)
        .collect();

    Ok(DecodedRegular {
        lat_axis,
        lon_axis,
        values,
    })
}

/// Decode a projected-grid message's raw value array only — the caller
/// supplies the lat/lon auxiliary arrays from the model's fixed Lambert
/// Conformal parameters (NAM/HRRR's grid definition doesn't carry the
/// projection constants in a form this decoder resolves generically).
pub fn decode_values(
    model: &str,
    lead_hour: u32,
    data: &Bytes,
    param_matches: &[&str],
    level: Level,
    expected_unit: &str,
) -> Result<Vec<f64>, FetchError> {
    let msg = find_message(model, lead_hour, data, param_matches, level, expected_unit)?;
    Ok(msg
        .unpack_data()
        .map_err(|e| FetchError::DecodeFailure {
            model: model.to_string(),
            lead_hour,
            reason: e.to_string(),
        })?
        .into_iter()
        .map(|v| v as f64)
        .collect())
}

/// Wind speed is always derived from the U/V 10-m components; raw U/V
/// are never exposed past the fetcher boundary.
pub fn derive_wind_speed(u: &[f64], v: &[f64]) -> Vec<f64> {
    u.iter()
        .zip(v.iter())
        .map(|(&u, &v)| (u * u + v * v).sqrt())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_wind_speed_matches_pythagorean_magnitude() {
        let u = vec![3.0, 0.0];
        let v = vec![4.0, 5.0];
        assert_eq!(derive_wind_speed(&u, &v), vec![5.0, 5.0]);
    }
}
