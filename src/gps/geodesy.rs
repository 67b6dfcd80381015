// src/gps/geodesy.rs
//! Great-circle distance and bearing helpers

use super::data::LatLon;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two coordinates in kilometers
pub fn distance_km(p1: LatLon, p2: LatLon) -> f64 {
    let d_lat = (p2.lat - p1.lat).to_radians();
    let d_lon = (p2.lon - p1.lon).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + p1.lat.to_radians().cos() * p2.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Initial bearing from `p1` to `p2`, normalized to [0, 360).
///
/// Identical points yield 0 since `atan2(0, 0) == 0`.
pub fn bearing_degrees(p1: LatLon, p2: LatLon) -> f64 {
    let phi1 = p1.lat.to_radians();
    let phi2 = p2.lat.to_radians();
    let d_lambda = (p2.lon - p1.lon).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();

    normalize_degrees(y.atan2(x).to_degrees())
}

/// Circular mean of a set of bearings, normalized to [0, 360).
///
/// An empty slice yields 0; callers that need to distinguish "no heading"
/// must check for emptiness themselves.
pub fn average_bearing(bearings: &[f64]) -> f64 {
    let (sum_x, sum_y) = bearings.iter().fold((0.0, 0.0), |(x, y), b| {
        let rad = b.to_radians();
        (x + rad.cos(), y + rad.sin())
    });

    normalize_degrees(sum_y.atan2(sum_x).to_degrees())
}

/// Map any angle in degrees into [0, 360)
pub fn normalize_degrees(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}
