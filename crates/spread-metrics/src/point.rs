//! Per-point pairwise RMSE/bias and ensemble spread.

use std::collections::BTreeMap;

use spread_coords::{extract_point, FieldSet, Variable};

use crate::stats::sample_stddev;

/// A fixed `(lat, lon, label)` the metric engine evaluates on every run,
/// loaded from the `monitor_points` configuration surface.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorPoint {
    pub lat: f64,
    pub lon: f64,
    pub label: String,
}

/// One pairwise metric row for a `(variable, point, lead_hour)` and an
/// unordered model pair `(model_a, model_b)` with `model_a < model_b`
/// lexicographically.
#[derive(Debug, Clone, PartialEq)]
pub struct PairPointMetric {
    pub variable: Variable,
    pub lat: f64,
    pub lon: f64,
    pub lead_hour: u32,
    pub model_a: String,
    pub model_b: String,
    pub rmse: f64,
    pub bias: f64,
    pub spread: f64,
}

/// Computes every pairwise point metric for one lead hour across every
/// canonical variable and monitor point.
///
/// `fieldsets` maps `model_name -> FieldSet` for a single lead hour — a
/// `BTreeMap` so iteration (and therefore the `model_a < model_b`
/// pairing) is already in lexicographic model-name order without an
/// extra sort. Models whose extracted value at a point is `NaN` (the
/// nearest cell is missing) are treated as not holding data at that
/// point, same as not having the variable at all — a model contributes
/// a value only when it actually has one.
pub fn point_metrics(
    fieldsets: &BTreeMap<String, FieldSet>,
    lead_hour: u32,
    monitor_points: &[MonitorPoint],
) -> Vec<PairPointMetric> {
    let mut out = Vec::new();

    for &variable in Variable::ALL.iter() {
        for point in monitor_points {
            let values: Vec<(&str, f64)> = fieldsets
                .iter()
                .filter_map(|(model, fieldset)| {
                    let field = fieldset.get(&variable)?;
                    let v = extract_point(field, point.lat, point.lon);
                    if v.is_nan() {
                        None
                    } else {
                        Some((model.as_str(), v))
                    }
                })
                .collect();

            if values.len() < 2 {
                continue;
            }

            let spread =
                sample_stddev(&values.iter().map(|(_, v)| *v).collect::<Vec<_>>()).unwrap_or(0.0);

            for i in 0..values.len() {
                for j in (i + 1)..values.len() {
                    let (model_a, va) = values[i];
                    let (model_b, vb) = values[j];
                    out.push(PairPointMetric {
                        variable,
                        lat: point.lat,
                        lon: point.lon,
                        lead_hour,
                        model_a: model_a.to_string(),
                        model_b: model_b.to_string(),
                        rmse: (va - vb).abs(),
                        bias: va - vb,
                        spread,
                    });
                }
            }
        }
    }

    out
}
