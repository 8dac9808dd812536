//! Geographic bounding boxes in WGS84 degrees.

use serde::{Deserialize, Serialize};

/// An axis-aligned lat/lon bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.max_lat < other.min_lat
            || self.min_lat > other.max_lat
            || self.max_lon < other.min_lon
            || self.min_lon > other.max_lon)
    }

    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }
        Some(BoundingBox {
            min_lat: self.min_lat.max(other.min_lat),
            max_lat: self.max_lat.min(other.max_lat),
            min_lon: self.min_lon.max(other.min_lon),
            max_lon: self.max_lon.min(other.max_lon),
        })
    }

    pub fn contains_point(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Whether `other` matches this bbox to within `tol` degrees on every
    /// edge — used to check the grid-snapshot invariant that a catalog
    /// row's bbox matches its array object's axes to within one cell.
    pub fn approx_eq(&self, other: &BoundingBox, tol: f64) -> bool {
        (self.min_lat - other.min_lat).abs() <= tol
            && (self.max_lat - other.max_lat).abs() <= tol
            && (self.min_lon - other.min_lon).abs() <= tol
            && (self.max_lon - other.max_lon).abs() <= tol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_of_overlapping_boxes() {
        let a = BoundingBox::new(0.0, 10.0, 0.0, 10.0);
        let b = BoundingBox::new(5.0, 15.0, 5.0, 15.0);
        let i = a.intersection(&b).unwrap();
        assert_eq!(i, BoundingBox::new(5.0, 10.0, 5.0, 10.0));
    }

    #[test]
    fn disjoint_boxes_have_no_intersection() {
        let a = BoundingBox::new(0.0, 1.0, 0.0, 1.0);
        let b = BoundingBox::new(10.0, 11.0, 10.0, 11.0);
        assert!(a.intersection(&b).is_none());
    }

    #[test]
    fn contains_point_is_inclusive_of_edges() {
        let a = BoundingBox::new(0.0, 10.0, 0.0, 10.0);
        assert!(a.contains_point(0.0, 0.0));
        assert!(a.contains_point(10.0, 10.0));
        assert!(!a.contains_point(10.1, 0.0));
    }
}
