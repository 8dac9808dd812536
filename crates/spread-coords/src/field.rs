//! The `Field` tagged variant and the four Coordinate/Array Kernel
//! operations: `extract_point`, `regrid_to_regular`, `common_bbox`, and
//! `make_axis`.
//!
//! `Regular` and `Projected` are kept as sibling data shapes rather than
//! an inheritance tree — the kernel dispatches on the tag instead of
//! asking either shape to behave like the other.

use crate::bbox::BoundingBox;
use crate::error::{KernelError, Result};

/// A 2-D floating-point field on one of two coordinate shapes.
///
/// `values` is always row-major against `(ny, nx)`, where `ny`/`nx` come
/// from the axis lengths (`Regular`) or the auxiliary coordinate arrays'
/// shape (`Projected`). Missing cells are `f64::NAN`.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Independent, strictly monotonic 1-D lat/lon axes.
    Regular {
        lat_axis: Vec<f64>,
        lon_axis: Vec<f64>,
        values: Vec<f64>,
    },
    /// 2-D auxiliary coordinate arrays, same shape as `values` (e.g. a
    /// Lambert Conformal grid).
    Projected {
        lat_2d: Vec<f64>,
        lon_2d: Vec<f64>,
        ny: usize,
        nx: usize,
        values: Vec<f64>,
    },
}

impl Field {
    /// Construct a regular-grid field, validating axis monotonicity and
    /// that `values.len() == lat_axis.len() * lon_axis.len()`.
    pub fn regular(lat_axis: Vec<f64>, lon_axis: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if !is_strictly_monotonic(&lat_axis) || !is_strictly_monotonic(&lon_axis) {
            return Err(KernelError::invalid_grid(
                "regular field axes must be strictly monotonic",
            ));
        }
        if values.len() != lat_axis.len() * lon_axis.len() {
            return Err(KernelError::shape_mismatch(format!(
                "values has {} cells, axes imply {}",
                values.len(),
                lat_axis.len() * lon_axis.len()
            )));
        }
        Ok(Field::Regular {
            lat_axis,
            lon_axis,
            values,
        })
    }

    /// Construct a projected-grid field, validating that all three
    /// arrays agree on shape.
    pub fn projected(
        lat_2d: Vec<f64>,
        lon_2d: Vec<f64>,
        ny: usize,
        nx: usize,
        values: Vec<f64>,
    ) -> Result<Self> {
        let expected = ny * nx;
        if lat_2d.len() != expected || lon_2d.len() != expected || values.len() != expected {
            return Err(KernelError::shape_mismatch(format!(
                "projected field shape ({ny}, {nx}) implies {expected} cells, got lat={}, lon={}, values={}",
                lat_2d.len(),
                lon_2d.len(),
                values.len()
            )));
        }
        Ok(Field::Projected {
            lat_2d,
            lon_2d,
            ny,
            nx,
            values,
        })
    }

    /// Cell count of the field, regardless of coordinate shape.
    pub fn len(&self) -> usize {
        match self {
            Field::Regular { values, .. } => values.len(),
            Field::Projected { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The axis-aligned lat/lon extent of this field's coordinates.
    pub fn bbox(&self) -> BoundingBox {
        match self {
            Field::Regular {
                lat_axis, lon_axis, ..
            } => BoundingBox::new(
                lat_axis.iter().cloned().fold(f64::INFINITY, f64::min),
                lat_axis.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                lon_axis.iter().cloned().fold(f64::INFINITY, f64::min),
                lon_axis.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            ),
            Field::Projected { lat_2d, lon_2d, .. } => BoundingBox::new(
                lat_2d.iter().cloned().fold(f64::INFINITY, f64::min),
                lat_2d.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                lon_2d.iter().cloned().fold(f64::INFINITY, f64::min),
                lon_2d.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            ),
        }
    }
}

fn is_strictly_monotonic(axis: &[f64]) -> bool {
    if axis.len() < 2 {
        return !axis.is_empty();
    }
    let increasing = axis.windows(2).all(|w| w[1] > w[0]);
    let decreasing = axis.windows(2).all(|w| w[1] < w[0]);
    increasing || decreasing
}

/// Nearest-index search on a (possibly descending) monotonic axis.
fn nearest_index(axis: &[f64], target: f64) -> usize {
    let mut best = 0usize;
    let mut best_dist = f64::INFINITY;
    for (i, &v) in axis.iter().enumerate() {
        let d = (v - target).abs();
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Returns the value at the grid cell nearest to `(lat, lon)`.
///
/// For `Regular` fields, independent nearest-index search is done on
/// each axis. For `Projected` fields, squared Euclidean distance in
/// degrees is computed across the full 2-D coordinate arrays and the
/// argmin is picked, ties broken by lowest flat index. NaN cells are
/// valid candidates only if no non-NaN cell is nearer — `extract_point`
/// itself doesn't filter by value, so a NaN result is returned when the
/// single nearest cell happens to be missing.
pub fn extract_point(field: &Field, lat: f64, lon: f64) -> f64 {
    match field {
        Field::Regular {
            lat_axis,
            lon_axis,
            values,
        } => {
            let i = nearest_index(lat_axis, lat);
            let j = nearest_index(lon_axis, lon);
            values[i * lon_axis.len() + j]
        }
        Field::Projected {
            lat_2d,
            lon_2d,
            values,
            ..
        } => {
            let mut best = 0usize;
            let mut best_dist = f64::INFINITY;
            for i in 0..lat_2d.len() {
                let dlat = lat_2d[i] - lat;
                let dlon = lon_2d[i] - lon;
                let d = dlat * dlat + dlon * dlon;
                if d < best_dist {
                    best_dist = d;
                    best = i;
                }
            }
            values[best]
        }
    }
}

/// Regrids `field` onto `(target_lat_axis, target_lon_axis)` by nearest
/// neighbour. For `Projected` inputs, source cells are flattened, NaN
/// cells dropped, and each target point looked up against the remaining
/// (finite-coordinate) source cells — a k-d-tree-style nearest lookup
/// substituted here by a linear scan, since the source field sizes this
/// pipeline operates on (model grids regridded onto a single common
/// 0.25° bbox) don't warrant the tree's bookkeeping.
pub fn regrid_to_regular(
    field: &Field,
    target_lat_axis: &[f64],
    target_lon_axis: &[f64],
) -> Result<Field> {
    if target_lat_axis.is_empty() || target_lon_axis.is_empty() {
        return Err(KernelError::invalid_grid("target axes must be non-empty"));
    }

    let ny = target_lat_axis.len();
    let nx = target_lon_axis.len();
    let mut out = vec![f64::NAN; ny * nx];

    match field {
        Field::Regular {
            lat_axis,
            lon_axis,
            values,
        } => {
            for (ti, &tlat) in target_lat_axis.iter().enumerate() {
                let si = nearest_index(lat_axis, tlat);
                for (tj, &tlon) in target_lon_axis.iter().enumerate() {
                    let sj = nearest_index(lon_axis, tlon);
                    out[ti * nx + tj] = values[si * lon_axis.len() + sj];
                }
            }
        }
        Field::Projected {
            lat_2d,
            lon_2d,
            values,
            ..
        } => {
            let source: Vec<(f64, f64, f64)> = lat_2d
                .iter()
                .zip(lon_2d.iter())
                .zip(values.iter())
                .filter(|((_, _), v)| !v.is_nan())
                .map(|((&la, &lo), &v)| (la, lo, v))
                .collect();

            for (ti, &tlat) in target_lat_axis.iter().enumerate() {
                for (tj, &tlon) in target_lon_axis.iter().enumerate() {
                    if let Some(&(_, _, v)) = source.iter().min_by(|a, b| {
                        let da = (a.0 - tlat).powi(2) + (a.1 - tlon).powi(2);
                        let db = (b.0 - tlat).powi(2) + (b.1 - tlon).powi(2);
                        da.partial_cmp(&db).unwrap()
                    }) {
                        out[ti * nx + tj] = v;
                    }
                }
            }
        }
    }

    Field::regular(target_lat_axis.to_vec(), target_lon_axis.to_vec(), out)
}

/// The tightest axis-aligned bbox contained in every input field's
/// extent — the intersection of all of them.
pub fn common_bbox(fields: &[&Field]) -> Option<BoundingBox> {
    let mut iter = fields.iter();
    let first = iter.next()?.bbox();
    iter.try_fold(first, |acc, f| acc.intersection(&f.bbox()))
}

/// Produces cell centres `low, low+step, …` strictly less than `high`.
pub fn make_axis(low: f64, high: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || low >= high {
        return Vec::new();
    }
    let n = ((high - low) / step).ceil() as usize;
    (0..n)
        .map(|i| low + step * i as f64)
        .take_while(|&v| v < high)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular_3x3() -> Field {
        Field::regular(
            vec![0.0, 1.0, 2.0],
            vec![10.0, 11.0, 12.0],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
        )
        .unwrap()
    }

    #[test]
    fn extract_point_regular_exact_cell() {
        let f = regular_3x3();
        assert_eq!(extract_point(&f, 1.0, 11.0), 5.0);
    }

    #[test]
    fn extract_point_regular_nearest() {
        let f = regular_3x3();
        assert_eq!(extract_point(&f, 0.4, 10.4), 1.0);
        assert_eq!(extract_point(&f, 0.6, 10.6), 5.0);
    }

    #[test]
    fn extract_point_projected_exact_cell() {
        // 2x2 projected grid; query the exact centre of cell (1, 0).
        let lat_2d = vec![40.0, 40.5, 41.0, 41.5];
        let lon_2d = vec![-100.0, -99.5, -100.2, -99.7];
        let values = vec![1.0, 2.0, 3.0, 4.0];
        let f = Field::projected(lat_2d, lon_2d, 2, 2, values).unwrap();
        assert_eq!(extract_point(&f, 41.0, -100.2), 3.0);
    }

    #[test]
    fn extract_point_regular_does_not_skip_nan_cells() {
        let f = Field::regular(vec![0.0, 1.0], vec![0.0], vec![f64::NAN, 5.0]).unwrap();
        // A NaN cell is a valid nearest-neighbour candidate — it's only
        // passed over when a non-NaN cell is strictly nearer.
        assert!(extract_point(&f, 0.1, 0.0).is_nan());
        assert_eq!(extract_point(&f, 0.9, 0.0), 5.0);
    }

    #[test]
    fn regrid_regular_to_regular() {
        let f = regular_3x3();
        let out = regrid_to_regular(&f, &[0.0, 2.0], &[10.0, 12.0]).unwrap();
        match out {
            Field::Regular { values, .. } => {
                assert_eq!(values, vec![1.0, 3.0, 7.0, 9.0]);
            }
            _ => panic!("expected regular output"),
        }
    }

    #[test]
    fn common_bbox_is_tightest_intersection() {
        let a = Field::regular(vec![0.0, 10.0], vec![0.0, 10.0], vec![1.0; 4]).unwrap();
        let b = Field::regular(vec![5.0, 15.0], vec![5.0, 15.0], vec![1.0; 4]).unwrap();
        let bbox = common_bbox(&[&a, &b]).unwrap();
        assert_eq!(bbox, BoundingBox::new(5.0, 10.0, 5.0, 10.0));
    }

    #[test]
    fn common_bbox_of_single_field_is_its_own_bbox() {
        let a = Field::regular(vec![0.0, 10.0], vec![0.0, 10.0], vec![1.0; 4]).unwrap();
        assert_eq!(common_bbox(&[&a]).unwrap(), a.bbox());
    }

    #[test]
    fn make_axis_excludes_high() {
        let axis = make_axis(0.0, 1.0, 0.25);
        assert_eq!(axis, vec![0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn make_axis_empty_when_step_non_positive() {
        assert!(make_axis(0.0, 1.0, 0.0).is_empty());
    }

    #[test]
    fn regular_rejects_non_monotonic_axis() {
        let err = Field::regular(vec![0.0, 0.0, 1.0], vec![0.0, 1.0], vec![0.0; 6]);
        assert!(err.is_err());
    }

    #[test]
    fn regular_rejects_shape_mismatch() {
        let err = Field::regular(vec![0.0, 1.0], vec![0.0, 1.0], vec![0.0; 3]);
        assert!(err.is_err());
    }
}
