//! # Datum Correction
//!
//! Converts raw GPS coordinates (WGS-84) into the GCJ-02 datum used by
//! mainland Chinese map providers.
//!
//! GCJ-02 applies a deliberately obfuscated, non-linear offset to every point
//! inside a rough bounding region around China. Tiles served in that datum are
//! shifted by up to several hundred meters relative to raw GPS, so tracks must
//! be corrected before they are drawn. Outside the region the datum is
//! identical to WGS-84 and points pass through untouched.
//!
//! The correction is one-way. There is no closed-form inverse, and this module
//! does not attempt an iterative one.
//!
//! ## Example
//!
//! ```rust
//! use activity_map::coord::wgs84_to_gcj02;
//!
//! // Tiananmen Square moves by a few hundred meters
//! let (lat, lng) = wgs84_to_gcj02(39.9042, 116.4074);
//! assert!((lat - 39.9042).abs() > 0.0005);
//! assert!((lng - 116.4074).abs() > 0.0005);
//!
//! // London is outside the region and unchanged
//! assert_eq!(wgs84_to_gcj02(51.5074, -0.1278), (51.5074, -0.1278));
//! ```

use std::f64::consts::PI;

use crate::{GpsPoint, MapPoint};

/// Semi-major axis of the Krasovsky 1940 ellipsoid (meters).
pub const A: f64 = 6378245.0;

/// First eccentricity squared of the Krasovsky 1940 ellipsoid.
pub const EE: f64 = 0.00669342162296594323;

// Correction region (degrees)
const REGION_MIN_LNG: f64 = 72.004;
const REGION_MAX_LNG: f64 = 137.8347;
const REGION_MIN_LAT: f64 = 0.8293;
const REGION_MAX_LAT: f64 = 55.8271;

/// Returns true when the point lies inside the region where the GCJ-02 offset
/// applies. Boundary values count as inside.
#[inline]
pub fn in_correction_region(lat: f64, lng: f64) -> bool {
    (REGION_MIN_LNG..=REGION_MAX_LNG).contains(&lng)
        && (REGION_MIN_LAT..=REGION_MAX_LAT).contains(&lat)
}

/// Convert a WGS-84 coordinate to GCJ-02.
///
/// Returns `(latitude, longitude)`. Points outside the correction region are
/// returned bit-for-bit unchanged.
pub fn wgs84_to_gcj02(lat: f64, lng: f64) -> (f64, f64) {
    if !in_correction_region(lat, lng) {
        return (lat, lng);
    }

    let mut d_lat = transform_lat(lng - 105.0, lat - 35.0);
    let mut d_lng = transform_lng(lng - 105.0, lat - 35.0);

    let rad_lat = lat / 180.0 * PI;
    let sin_lat = rad_lat.sin();
    let magic = 1.0 - EE * sin_lat * sin_lat;
    let sqrt_magic = magic.sqrt();

    d_lat = (d_lat * 180.0) / ((A * (1.0 - EE)) / (magic * sqrt_magic) * PI);
    d_lng = (d_lng * 180.0) / (A / sqrt_magic * rad_lat.cos() * PI);

    (lat + d_lat, lng + d_lng)
}

/// Latitude offset series, in the shifted frame `x = lng - 105`, `y = lat - 35`.
fn transform_lat(x: f64, y: f64) -> f64 {
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

/// Longitude offset series, same frame as [`transform_lat`].
fn transform_lng(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}

impl GpsPoint {
    /// Project this raw GPS point into the display datum.
    #[inline]
    pub fn to_display(&self) -> MapPoint {
        let (latitude, longitude) = wgs84_to_gcj02(self.latitude, self.longitude);
        MapPoint { latitude, longitude }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_outside_region() {
        let samples = [
            (51.5074, -0.1278),   // London
            (40.7128, -74.0060),  // New York
            (-33.8688, 151.2093), // Sydney
            (0.5, 100.0),         // just south of the region
            (56.0, 100.0),        // just north
            (30.0, 71.9),         // just west
            (30.0, 138.0),        // just east
        ];
        for (lat, lng) in samples {
            assert_eq!(wgs84_to_gcj02(lat, lng), (lat, lng), "({lat}, {lng})");
        }
    }

    #[test]
    fn test_known_offset_beijing() {
        // Reference value from the widely published algorithm
        let (lat, lng) = wgs84_to_gcj02(39.915, 116.404);
        assert!((lat - 39.91640428150164).abs() < 1e-6, "lat = {lat}");
        assert!((lng - 116.41024449916938).abs() < 1e-6, "lng = {lng}");
    }

    #[test]
    fn test_offset_magnitude_is_small() {
        for &(lat, lng) in &[(22.5431, 114.0579), (31.2304, 121.4737), (30.5728, 104.0668)] {
            let (g_lat, g_lng) = wgs84_to_gcj02(lat, lng);
            // GCJ-02 never moves a point by more than about a kilometer
            assert!((g_lat - lat).abs() < 0.01);
            assert!((g_lng - lng).abs() < 0.01);
            assert!((g_lat, g_lng) != (lat, lng));
        }
    }

    #[test]
    fn test_deterministic() {
        let a = wgs84_to_gcj02(39.9, 116.4);
        let b = wgs84_to_gcj02(39.9, 116.4);
        assert_eq!(a.0.to_bits(), b.0.to_bits());
        assert_eq!(a.1.to_bits(), b.1.to_bits());
    }

    #[test]
    fn test_region_boundary_inclusive() {
        assert!(in_correction_region(REGION_MIN_LAT, REGION_MIN_LNG));
        assert!(in_correction_region(REGION_MAX_LAT, REGION_MAX_LNG));
        assert!(!in_correction_region(REGION_MAX_LAT + 1e-9, 100.0));
    }

    #[test]
    fn test_gps_point_to_display() {
        let raw = GpsPoint::new(39.9, 116.4);
        let shown = raw.to_display();
        let (lat, lng) = wgs84_to_gcj02(39.9, 116.4);
        assert_eq!(shown, MapPoint::new(lat, lng));
    }
}
