//! Great-circle distance and small geometric helpers shared by the
//! assembler (endpoint distance), segmenter (midpoints) and the
//! external-wetness filter (pixel projection).

/// Mean Earth radius used throughout the pipeline, matching the library
/// constant the original implementation tabulates its k-R coefficients
/// against.
pub const EARTH_RADIUS_KM: f64 = 6373.0;

/// Great-circle distance between two (lat, lon) points in decimal degrees,
/// via the haversine formula.
///
/// Symmetric in its two arguments and zero (within floating point error)
/// for coincident points.
pub fn haversine_km(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let lat_a_r = lat_a.to_radians();
    let lat_b_r = lat_b.to_radians();
    let dlat = (lat_b - lat_a).to_radians();
    let dlon = (lon_b - lon_a).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat_a_r.cos() * lat_b_r.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Midpoint of a straight segment in decimal degrees (simple arithmetic
/// mean, matching the central-point segmenter of §4.5 — not a true
/// great-circle midpoint, since link spans are short enough that the
/// difference is immaterial).
pub fn midpoint(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> (f64, f64) {
    ((lat_a + lat_b) / 2.0, (lon_a + lon_b) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_is_symmetric() {
        let d1 = haversine_km(50.0, 14.0, 48.0, 16.0);
        let d2 = haversine_km(48.0, 16.0, 50.0, 14.0);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn haversine_zero_for_equal_points() {
        let d = haversine_km(50.0, 14.0, 50.0, 14.0);
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn haversine_known_value() {
        // ~71.49 km between (50.0, 14.0) and (50.0, 15.0)
        let d = haversine_km(50.0, 14.0, 50.0, 15.0);
        assert!((d - 71.49).abs() < 0.05, "got {d}");
    }

    #[test]
    fn midpoint_is_arithmetic_mean() {
        let (lat, lon) = midpoint(50.0, 14.0, 50.2, 14.4);
        assert!((lat - 50.1).abs() < 1e-9);
        assert!((lon - 14.2).abs() < 1e-9);
    }
}
