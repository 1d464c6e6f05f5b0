//! Ellipsoidal distance between coordinates.
//!
//! Distances are geodesics on the WGS84 ellipsoid (Karney's algorithm via
//! the `geo` crate), in meters.

use geo::{Distance, Geodesic, Point};

use crate::error::CoreError;
use crate::types::Coordinate;

/// WGS84 semi-major axis in meters.
pub const WGS84_SEMI_MAJOR_M: f64 = 6_378_137.0;

/// WGS84 flattening.
pub const WGS84_FLATTENING: f64 = 1.0 / 298.257_223_563;

/// WGS84 semi-minor (polar) axis in meters.
pub const WGS84_SEMI_MINOR_M: f64 = WGS84_SEMI_MAJOR_M * (1.0 - WGS84_FLATTENING);

/// Geodesic distance in meters between two coordinates.
///
/// Symmetric by construction: the pair is put in a canonical order before
/// the inverse problem is solved, so `distance_m(a, b)` and
/// `distance_m(b, a)` are bit-identical. Identical points yield `0.0`.
pub fn distance_m(a: &Coordinate, b: &Coordinate) -> Result<f64, CoreError> {
    a.validate()?;
    b.validate()?;

    if a == b {
        return Ok(0.0);
    }

    let (first, second) = if canonical_key(a) <= canonical_key(b) {
        (a, b)
    } else {
        (b, a)
    };

    let origin = Point::new(first.longitude, first.latitude);
    let destination = Point::new(second.longitude, second.latitude);
    Ok(Geodesic::distance(origin, destination))
}

fn canonical_key(c: &Coordinate) -> (u64, u64) {
    (c.latitude.to_bits(), c.longitude.to_bits())
}

/// Unit vector pointing from the Earth's centre to the coordinate on the
/// WGS84 surface (geocentric direction, not the geodetic normal).
///
/// The angle between two such vectors, times [`WGS84_SEMI_MINOR_M`], is a
/// lower bound on the geodesic distance between the coordinates: the
/// ellipsoid encloses the polar-radius sphere, and radial projection onto
/// that sphere never lengthens a path.
pub fn geocentric_unit_vector(c: &Coordinate) -> [f64; 3] {
    let e2 = WGS84_FLATTENING * (2.0 - WGS84_FLATTENING);
    let lat = c.latitude.to_radians();
    let lon = c.longitude.to_radians();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();

    let prime_vertical = WGS84_SEMI_MAJOR_M / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let x = prime_vertical * cos_lat * cos_lon;
    let y = prime_vertical * cos_lat * sin_lon;
    let z = prime_vertical * (1.0 - e2) * sin_lat;

    let norm = (x * x + y * y + z * z).sqrt();
    [x / norm, y / norm, z / norm]
}
