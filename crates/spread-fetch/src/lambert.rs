//! Lambert Conformal Conic projection math for NAM CONUSNEST and HRRR.
//!
//! Folded in from a standalone projection crate (see DESIGN.md) —
//! there's no generic-projection API surface left once the only two
//! consumers are these fixed-constant model grids, so the
//! params struct and `grid_to_geo` conversion live here instead,
//! generalized just enough to synthesize the 2-D auxiliary lat/lon
//! coordinate arrays `spread-coords::Field::Projected` needs.

use std::f64::consts::PI;

#[derive(Debug, Clone, Copy)]
pub struct LambertConformal {
    lon0: f64,
    lat1: f64,
    lon1: f64,
    latin1: f64,
    latin2: f64,
    dx: f64,
    dy: f64,
    pub nx: usize,
    pub ny: usize,
    earth_radius: f64,
    n: f64,
    f: f64,
    rho0: f64,
}

impl LambertConformal {
    /// Build projection parameters from the GRIB2 grid-definition
    /// quantities a Lambert Conformal message carries (all in degrees /
    /// metres).
    pub fn from_grib2(
        lat1_deg: f64,
        lon1_deg: f64,
        lov_deg: f64,
        latin1_deg: f64,
        latin2_deg: f64,
        dx: f64,
        dy: f64,
        nx: usize,
        ny: usize,
    ) -> Self {
        let to_rad = PI / 180.0;
        let lat1 = lat1_deg * to_rad;
        let lon1 = lon1_deg * to_rad;
        let lon0 = lov_deg * to_rad;
        let latin1 = latin1_deg * to_rad;
        let latin2 = latin2_deg * to_rad;
        let earth_radius = 6_371_229.0;

        let n = if (latin1 - latin2).abs() < 1e-10 {
            latin1.sin()
        } else {
            let ln_ratio = (latin1.cos() / latin2.cos()).ln();
            let tan_ratio =
                ((PI / 4.0 + latin2 / 2.0).tan() / (PI / 4.0 + latin1 / 2.0).tan()).ln();
            ln_ratio / tan_ratio
        };

        let f = (latin1.cos() * (PI / 4.0 + latin1 / 2.0).tan().powf(n)) / n;
        let rho0 = earth_radius * f / (PI / 4.0 + lat1 / 2.0).tan().powf(n);

        Self {
            lon0,
            lat1,
            lon1,
            latin1,
            latin2,
            dx,
            dy,
            nx,
            ny,
            earth_radius,
            n,
            f,
            rho0,
        }
    }

    /// HRRR's standard CONUS Lambert Conformal parameters (3-km grid,
    /// 1799x1059).
    pub fn hrrr() -> Self {
        Self::from_grib2(
            21.138123,
            -122.719528,
            -97.5,
            38.5,
            38.5,
            3000.0,
            3000.0,
            1799,
            1059,
        )
    }

    /// NAM CONUSNEST's Lambert Conformal parameters (3-km grid,
    /// 1299x919 over a slightly different CONUS-nest extent than HRRR).
    pub fn nam_conusnest() -> Self {
        Self::from_grib2(
            21.821, -122.72, -97.5, 38.5, 38.5, 3000.0, 3000.0, 1299, 919,
        )
    }

    pub fn grid_to_geo(&self, i: f64, j: f64) -> (f64, f64) {
        let to_deg = 180.0 / PI;

        let mut dlon0 = self.lon1 - self.lon0;
        while dlon0 > PI {
            dlon0 -= 2.0 * PI;
        }
        while dlon0 < -PI {
            dlon0 += 2.0 * PI;
        }
        let theta0 = self.n * dlon0;
        let x0 = self.rho0 * theta0.sin();
        let y0 = self.rho0 - self.rho0 * theta0.cos();

        let x = x0 + i * self.dx;
        let y = y0 + j * self.dy;

        let rho = (x * x + (self.rho0 - y) * (self.rho0 - y)).sqrt();
        let rho = if self.n < 0.0 { -rho } else { rho };
        let theta = (x / (self.rho0 - y)).atan();

        let lat = 2.0 * ((self.earth_radius * self.f / rho).powf(1.0 / self.n)).atan() - PI / 2.0;
        let lon = self.lon0 + theta / self.n;

        (lat * to_deg, lon * to_deg)
    }

    /// Builds the full `(ny * nx)` row-major auxiliary lat/lon arrays for
    /// this grid, matching the value array's scan order used when
    /// decoding the GRIB2 data section.
    pub fn build_latlon_grid(&self) -> (Vec<f64>, Vec<f64>) {
        let mut lat = Vec::with_capacity(self.ny * self.nx);
        let mut lon = Vec::with_capacity(self.ny * self.nx);
        for j in 0..self.ny {
            for i in 0..self.nx {
                let (la, lo) = self.grid_to_geo(i as f64, j as f64);
                lat.push(la);
                lon.push(lo);
            }
        }
        (lat, lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hrrr_first_grid_point_matches_known_origin() {
        let proj = LambertConformal::hrrr();
        let (lat, lon) = proj.grid_to_geo(0.0, 0.0);
        assert!((lat - 21.138123).abs() < 0.01);
        assert!((lon - (-122.719528)).abs() < 0.01);
    }

    #[test]
    fn build_latlon_grid_has_expected_shape() {
        let proj = LambertConformal::from_grib2(21.0, -123.0, -97.5, 38.5, 38.5, 3000.0, 3000.0, 4, 3);
        let (lat, lon) = proj.build_latlon_grid();
        assert_eq!(lat.len(), 12);
        assert_eq!(lon.len(), 12);
    }
}
