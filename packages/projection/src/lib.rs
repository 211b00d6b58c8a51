#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Forward transverse Mercator projection for building query bounding
//! boxes.
//!
//! Several land value services only accept bounding boxes in ETRS89 / UTM
//! (EPSG:25832 or EPSG:25833). [`project`] converts a WGS84 point into the
//! requested system using the Krüger series, and [`bbox_around`] builds the
//! small square query box around it.
//!
//! ETRS89 and WGS84 differ by well under a meter in Germany, so WGS84 input
//! is treated as ETRS89 directly. Only the forward direction is provided.

use geo::Point;
use land_value_models::{BoundingBox, Crs};

/// Meters per degree of latitude, used for WGS84 bounding boxes.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Reference ellipsoid parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis in meters.
    pub a: f64,
    /// Flattening.
    pub f: f64,
}

impl Ellipsoid {
    /// GRS80, the ellipsoid of ETRS89.
    pub const GRS80: Self = Self {
        a: 6_378_137.0,
        f: 1.0 / 298.257_222_101,
    };

    /// Third flattening `n = f / (2 - f)`.
    #[must_use]
    pub fn third_flattening(&self) -> f64 {
        self.f / (2.0 - self.f)
    }

    /// Rectifying radius `A`, the meridian arc length per radian.
    #[must_use]
    pub fn rectifying_radius(&self) -> f64 {
        let n = self.third_flattening();
        let n2 = n * n;
        self.a / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0)
    }

    /// Meridian arc length from the equator to `lat_deg`, in meters.
    ///
    /// Helmert's expansion in the third flattening, carried to third order.
    #[must_use]
    pub fn meridian_arc(&self, lat_deg: f64) -> f64 {
        let n = self.third_flattening();
        let n2 = n * n;
        let n3 = n2 * n;
        let phi = lat_deg.to_radians();

        self.a / (1.0 + n)
            * ((1.0 + n2 / 4.0 + n2 * n2 / 64.0) * phi
                - 1.5 * (n - n3 / 8.0) * (2.0 * phi).sin()
                + 15.0 / 16.0 * (n2 - n2 * n2 / 4.0) * (4.0 * phi).sin()
                - 35.0 / 48.0 * n3 * (6.0 * phi).sin())
    }
}

/// A transverse Mercator projection definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    /// Reference ellipsoid.
    pub ellipsoid: Ellipsoid,
    /// Longitude of the central meridian in degrees.
    pub central_meridian: f64,
    /// Scale factor on the central meridian.
    pub scale: f64,
    /// False easting in meters.
    pub false_easting: f64,
    /// False northing in meters.
    pub false_northing: f64,
}

impl TransverseMercator {
    /// ETRS89 / UTM projection for the given northern-hemisphere zone.
    #[must_use]
    pub fn utm(zone: u8) -> Self {
        Self {
            ellipsoid: Ellipsoid::GRS80,
            central_meridian: f64::from(zone) * 6.0 - 183.0,
            scale: 0.9996,
            false_easting: 500_000.0,
            false_northing: 0.0,
        }
    }

    /// Projects a WGS84 point (`x` = longitude, `y` = latitude) to
    /// easting/northing.
    #[must_use]
    pub fn forward(&self, point: Point<f64>) -> Point<f64> {
        let n = self.ellipsoid.third_flattening();
        let n2 = n * n;
        let n3 = n2 * n;
        let big_a = self.ellipsoid.rectifying_radius();

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
            61.0 * n3 / 240.0,
        ];

        let phi = point.y().to_radians();
        let lambda = (point.x() - self.central_meridian).to_radians();

        // Conformal latitude
        let c = 2.0 * n.sqrt() / (1.0 + n);
        let t = (phi.sin().atanh() - c * (c * phi.sin()).atanh()).sinh();

        let xi_prime = t.atan2(lambda.cos());
        let eta_prime = (lambda.sin() / t.hypot(1.0)).atanh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (j, a_j) in alpha.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let k = 2.0 * (j + 1) as f64;
            xi += a_j * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += a_j * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        Point::new(
            self.false_easting + self.scale * big_a * eta,
            self.false_northing + self.scale * big_a * xi,
        )
    }
}

/// Converts a WGS84 coordinate into `crs`, returning `(x, y)`.
///
/// For [`Crs::Wgs84`] this returns `(lon, lat)` unchanged.
#[must_use]
pub fn project(crs: Crs, lat: f64, lon: f64) -> (f64, f64) {
    match crs.utm_zone() {
        Some(zone) => {
            let projected = TransverseMercator::utm(zone).forward(Point::new(lon, lat));
            (projected.x(), projected.y())
        }
        None => (lon, lat),
    }
}

/// Builds a square bounding box of half-width `radius_m` meters around a
/// WGS84 point, expressed in `crs`.
#[must_use]
pub fn bbox_around(crs: Crs, lat: f64, lon: f64, radius_m: f64) -> BoundingBox {
    if crs.is_projected() {
        let (x, y) = project(crs, lat, lon);
        return BoundingBox {
            min_x: x - radius_m,
            min_y: y - radius_m,
            max_x: x + radius_m,
            max_y: y + radius_m,
            crs,
        };
    }

    let d_lat = radius_m / METERS_PER_DEGREE;
    let d_lon = radius_m / (METERS_PER_DEGREE * lat.to_radians().cos().max(1e-6));
    BoundingBox {
        min_x: lon - d_lon,
        min_y: lat - d_lat,
        max_x: lon + d_lon,
        max_y: lat + d_lat,
        crs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_within_meter(actual: (f64, f64), expected: (f64, f64)) {
        assert!(
            (actual.0 - expected.0).abs() < 1.0 && (actual.1 - expected.1).abs() < 1.0,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn meridian_arc_matches_reference_at_45_degrees() {
        let arc = Ellipsoid::GRS80.meridian_arc(45.0);
        assert!((arc - 4_984_944.378).abs() < 0.01, "arc = {arc}");
    }

    #[test]
    fn central_meridian_point_projects_to_scaled_arc() {
        let (e, n) = project(Crs::Etrs89Utm32, 45.0, 9.0);
        assert!((e - 500_000.0).abs() < 1e-6);
        assert_within_meter((e, n), (500_000.0, 4_982_950.400));
    }

    #[test]
    fn cologne_cathedral_in_utm32() {
        let projected = project(Crs::Etrs89Utm32, 50.941_278, 6.958_281);
        assert_within_meter(projected, (356_558.858, 5_645_279.727));
    }

    #[test]
    fn brandenburg_gate_in_utm33() {
        let projected = project(Crs::Etrs89Utm33, 52.516_275, 13.377_704);
        assert_within_meter(projected, (389_918.042, 5_819_699.132));
    }

    #[test]
    fn hamburg_town_hall_in_utm32() {
        let projected = project(Crs::Etrs89Utm32, 53.550_556, 9.993_333);
        assert_within_meter(projected, (565_810.894, 5_933_977.093));
    }

    #[test]
    fn projection_is_deterministic() {
        let a = project(Crs::Etrs89Utm33, 51.050_407, 13.737_262);
        let b = project(Crs::Etrs89Utm33, 51.050_407, 13.737_262);
        assert_eq!(a, b);
        assert_within_meter(a, (411_491.718, 5_656_188.918));
    }

    #[test]
    fn wgs84_is_passthrough() {
        assert_eq!(project(Crs::Wgs84, 50.0, 8.0), (8.0, 50.0));
    }

    #[test]
    fn projected_bbox_is_centered_square() {
        let bbox = bbox_around(Crs::Etrs89Utm32, 50.941_278, 6.958_281, 25.0);
        let (cx, cy) = bbox.center();
        assert_within_meter((cx, cy), (356_558.858, 5_645_279.727));
        assert!((bbox.width() - 50.0).abs() < 1e-9);
        assert!((bbox.height() - 50.0).abs() < 1e-9);
        assert_eq!(bbox.crs, Crs::Etrs89Utm32);
    }

    #[test]
    fn wgs84_bbox_widens_longitude_with_latitude() {
        let bbox = bbox_around(Crs::Wgs84, 60.0, 10.0, 111.32);
        assert!((bbox.height() - 0.002).abs() < 1e-9);
        assert!((bbox.width() - 0.004).abs() < 1e-6);
    }
}
