//! Per-grid-cell divergence: regrid every participating model's field
//! onto a shared regular axis over their common bbox, then take the
//! per-cell sample std-dev across models.

use std::collections::BTreeMap;

use spread_coords::{common_bbox, make_axis, regrid_to_regular, BoundingBox, Field, Variable};

use crate::stats::sample_stddev;

/// A computed divergence field: per-cell sample std-dev across the
/// models in `fields`, regridded onto a shared `0.25°` axis over their
/// common bbox. Cells where fewer than two models had non-NaN data are
/// `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct GridDivergence {
    pub variable: Variable,
    pub lead_hour: u32,
    pub bbox: BoundingBox,
    pub lat_axis: Vec<f64>,
    pub lon_axis: Vec<f64>,
    pub values: Vec<f64>,
}

/// Computes grid divergence for one `(variable, lead_hour)`.
///
/// `fields` maps `model_name -> &Field`, already narrowed by the caller
/// to the models holding `variable` at `lead_hour`. Returns `None` when
/// fewer than two models are given (spec: "for each (variable,
/// lead_hour) where >= 2 models have data") or when the common bbox is
/// empty (e.g. disjoint domains) or too small to hold even one target
/// cell.
pub fn grid_divergence(
    fields: &BTreeMap<String, &Field>,
    variable: Variable,
    lead_hour: u32,
    cell_step: f64,
) -> Option<GridDivergence> {
    if fields.len() < 2 {
        return None;
    }

    let field_refs: Vec<&Field> = fields.values().copied().collect();
    let bbox = common_bbox(&field_refs)?;

    let lat_axis = make_axis(bbox.min_lat, bbox.max_lat, cell_step);
    let lon_axis = make_axis(bbox.min_lon, bbox.max_lon, cell_step);
    if lat_axis.is_empty() || lon_axis.is_empty() {
        return None;
    }

    let regridded: Vec<Field> = field_refs
        .iter()
        .map(|f| regrid_to_regular(f, &lat_axis, &lon_axis))
        .collect::<Result<_, _>>()
        .ok()?;

    let ncells = lat_axis.len() * lon_axis.len();
    let mut values = vec![f64::NAN; ncells];

    for (idx, cell) in values.iter_mut().enumerate() {
        let cell_values: Vec<f64> = regridded
            .iter()
            .filter_map(|f| match f {
                Field::Regular { values, .. } => {
                    let v = values[idx];
                    if v.is_nan() {
                        None
                    } else {
                        Some(v)
                    }
                }
                Field::Projected { .. } => None,
            })
            .collect();
        if let Some(s) = sample_stddev(&cell_values) {
            *cell = s;
        }
    }

    Some(GridDivergence {
        variable,
        lead_hour,
        bbox,
        lat_axis,
        lon_axis,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s2_three_model_grid_cell_divergence() {
        let a = Field::regular(vec![0.0, 1.0], vec![0.0, 1.0], vec![10.0, 10.0, 10.0, 10.0])
            .unwrap();
        let b = Field::regular(vec![0.0, 1.0], vec![0.0, 1.0], vec![12.0, 12.0, 12.0, 12.0])
            .unwrap();
        let c = Field::regular(vec![0.0, 1.0], vec![0.0, 1.0], vec![8.0, 8.0, 8.0, 8.0]).unwrap();

        let mut fields = BTreeMap::new();
        fields.insert("A".to_string(), &a);
        fields.insert("B".to_string(), &b);
        fields.insert("C".to_string(), &c);

        let result = grid_divergence(&fields, Variable::Precip, 0, 1.0).unwrap();
        assert!(result.values.iter().all(|v| (v - 2.0).abs() < 1e-9));
    }

    #[test]
    fn single_model_returns_none() {
        let a = Field::regular(vec![0.0, 1.0], vec![0.0, 1.0], vec![1.0; 4]).unwrap();
        let mut fields = BTreeMap::new();
        fields.insert("A".to_string(), &a);
        assert!(grid_divergence(&fields, Variable::Precip, 0, 1.0).is_none());
    }

    #[test]
    fn cells_with_one_model_missing_are_nan() {
        // Axes [0,1,2,3] on both models; `make_axis(0, 3, 1)` lands the
        // target grid exactly on source indices 0..3, so target cell
        // (0, 1) reads straight from source flat index 1.
        let axis = vec![0.0, 1.0, 2.0, 3.0];
        let a = Field::regular(axis.clone(), axis.clone(), vec![1.0; 16]).unwrap();
        let mut b_values = vec![2.0; 16];
        b_values[1] = f64::NAN;
        let b = Field::regular(axis.clone(), axis, b_values).unwrap();

        let mut fields = BTreeMap::new();
        fields.insert("A".to_string(), &a);
        fields.insert("B".to_string(), &b);

        let result = grid_divergence(&fields, Variable::Precip, 0, 1.0).unwrap();
        assert_eq!(result.lat_axis, vec![0.0, 1.0, 2.0]);
        assert!(result.values[1].is_nan());
        assert!(!result.values[0].is_nan());
    }
}
