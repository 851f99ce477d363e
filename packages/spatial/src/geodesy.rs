//! Great-circle distances on a spherical Earth.

use geo::Point;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between two `(latitude, longitude)` pairs
/// given in degrees.
///
/// Out-of-range coordinates are not rejected; callers validate upstream.
#[must_use]
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    // Rounding can push `a` just past 1 for antipodal points.
    let a = ((d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2))
    .clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Haversine distance in meters between two lon/lat points
/// (x = longitude, y = latitude).
#[must_use]
pub fn point_distance_m(from: Point<f64>, to: Point<f64>) -> f64 {
    distance_m(from.y(), from.x(), to.y(), to.x())
}

/// Position of a lon/lat point on the unit sphere.
///
/// The straight-line distance between two such vectors grows with their
/// great-circle distance, so Euclidean nearest-neighbour search over them
/// finds the same point as a haversine scan.
#[must_use]
pub fn unit_vector(point: Point<f64>) -> [f64; 3] {
    let (lat, lon) = (point.y().to_radians(), point.x().to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISBON: (f64, f64) = (38.7223, -9.1393);
    const PORTO: (f64, f64) = (41.1579, -8.6291);

    #[test]
    fn distance_zero() {
        assert!(distance_m(0.0, 0.0, 0.0, 0.0).abs() < 1e-6);
        assert!(distance_m(LISBON.0, LISBON.1, LISBON.0, LISBON.1).abs() < 1e-6);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (LISBON, PORTO),
            ((0.0, 0.0), (0.0, 180.0)),
            ((-33.86, 151.21), (51.5, -0.12)),
            ((89.9, 10.0), (-89.9, -170.0)),
        ];
        for (a, b) in pairs {
            let ab = distance_m(a.0, a.1, b.0, b.1);
            let ba = distance_m(b.0, b.1, a.0, a.1);
            assert!((ab - ba).abs() < 1e-6, "{a:?} <-> {b:?}: {ab} != {ba}");
        }
    }

    #[test]
    fn lisbon_to_porto() {
        let d = distance_m(LISBON.0, LISBON.1, PORTO.0, PORTO.1);
        assert!((272_000.0..277_000.0).contains(&d), "got {d}");
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = distance_m(0.0, 0.0, 1.0, 0.0);
        let expected = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn point_variant_swaps_axes() {
        let from = Point::new(LISBON.1, LISBON.0);
        let to = Point::new(PORTO.1, PORTO.0);
        let d = point_distance_m(from, to);
        assert!((d - distance_m(LISBON.0, LISBON.1, PORTO.0, PORTO.1)).abs() < 1e-9);
    }

    #[test]
    fn unit_vectors_lie_on_the_sphere() {
        for (lat, lon) in [LISBON, PORTO, (0.0, 0.0), (-89.0, 179.0)] {
            let [x, y, z] = unit_vector(Point::new(lon, lat));
            assert!(((x * x + y * y + z * z) - 1.0).abs() < 1e-12);
        }
        let [x, y, z] = unit_vector(Point::new(0.0, 90.0));
        assert!(x.abs() < 1e-12 && y.abs() < 1e-12 && (z - 1.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_input_is_finite() {
        assert!(distance_m(120.0, 400.0, -95.0, -361.0).is_finite());
    }
}
