//! # Geographic Utilities
//!
//! Small geographic helpers shared by the geometry, viewport and heatmap
//! modules. Everything is generic over [`LatLng`] so the same code measures
//! raw GPS tracks and display-datum paths.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points |
//! | [`polyline_length`] | Total length of a path in meters |
//! | [`compute_bounds`] | Bounding box of a set of points |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//!
//! ## Example
//!
//! ```rust
//! use activity_map::{GpsPoint, geo_utils};
//!
//! let track = vec![
//!     GpsPoint::new(39.9000, 116.3900),
//!     GpsPoint::new(39.9010, 116.3910),
//!     GpsPoint::new(39.9020, 116.3925),
//! ];
//!
//! let length = geo_utils::polyline_length(&track);
//! assert!(length > 200.0 && length < 400.0);
//!
//! let bounds = geo_utils::compute_bounds(&track).unwrap();
//! assert_eq!(bounds.max_lat, 39.9020);
//! ```
//!
//! Distances use the haversine formula on a spherical Earth (radius 6,371 km)
//! via the `geo` crate, accurate to within about 0.3% for running tracks.

use geo::{Distance, Haversine, Point};

use crate::{Bounds, LatLng};

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Great-circle distance between two points in meters.
#[inline]
pub fn haversine_distance<P: LatLng>(p1: &P, p2: &P) -> f64 {
    let point1 = Point::new(p1.lng(), p1.lat());
    let point2 = Point::new(p2.lng(), p2.lat());
    Haversine::distance(point1, point2)
}

/// Total length of a path in meters. Empty or single-point paths return 0.0.
pub fn polyline_length<P: LatLng>(points: &[P]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Convert meters to approximate degrees of longitude at a given latitude.
///
/// The cosine is floored at 0.1 so that conversions near the poles stay
/// finite. Used to size heatmap cells.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = METERS_PER_DEGREE * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

/// Bounding box of a set of points.
///
/// Invalid points (non-finite or out of lat/lng range) are ignored, so one
/// corrupt sample cannot blow a viewport up to the whole planet. Returns
/// `None` when no valid point remains.
pub fn compute_bounds<'a, P, I>(points: I) -> Option<Bounds>
where
    P: LatLng + 'a,
    I: IntoIterator<Item = &'a P>,
{
    let mut min_lat = f64::INFINITY;
    let mut max_lat = f64::NEG_INFINITY;
    let mut min_lng = f64::INFINITY;
    let mut max_lng = f64::NEG_INFINITY;
    let mut seen = false;

    for p in points.into_iter().filter(|p| p.is_valid()) {
        seen = true;
        min_lat = min_lat.min(p.lat());
        max_lat = max_lat.max(p.lat());
        min_lng = min_lng.min(p.lng());
        max_lng = max_lng.max(p.lng());
    }

    seen.then_some(Bounds { min_lat, max_lat, min_lng, max_lng })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GpsPoint, MapPoint};

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GpsPoint::new(39.9, 116.4);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // Beijing to Shanghai is roughly 1,067 km
        let beijing = GpsPoint::new(39.9042, 116.4074);
        let shanghai = GpsPoint::new(31.2304, 121.4737);
        let dist = haversine_distance(&beijing, &shanghai);
        assert!(approx_eq(dist, 1_067_000.0, 10_000.0));
    }

    #[test]
    fn test_polyline_length_short_inputs() {
        let empty: Vec<MapPoint> = vec![];
        assert_eq!(polyline_length(&empty), 0.0);
        assert_eq!(polyline_length(&[MapPoint::new(39.9, 116.4)]), 0.0);
    }

    #[test]
    fn test_polyline_length_two_points() {
        // 0.001 degrees of latitude is about 111m
        let track = vec![GpsPoint::new(39.900, 116.4), GpsPoint::new(39.901, 116.4)];
        assert!(approx_eq(polyline_length(&track), 111.2, 1.0));
    }

    #[test]
    fn test_compute_bounds_skips_invalid() {
        let points = vec![
            MapPoint::new(39.90, 116.30),
            MapPoint::new(f64::NAN, 116.35),
            MapPoint::new(95.0, 116.35),
            MapPoint::new(39.95, 116.40),
        ];
        let bounds = compute_bounds(&points).unwrap();
        assert_eq!(bounds.min_lat, 39.90);
        assert_eq!(bounds.max_lat, 39.95);
    }

    #[test]
    fn test_compute_bounds_all_invalid() {
        let points = vec![MapPoint::new(f64::NAN, 0.0)];
        assert!(compute_bounds(&points).is_none());
    }

    #[test]
    fn test_meters_to_degrees() {
        let deg = meters_to_degrees(METERS_PER_DEGREE, 0.0);
        assert!(approx_eq(deg, 1.0, 0.01));

        // At higher latitude, same distance = more degrees
        assert!(meters_to_degrees(METERS_PER_DEGREE, 40.0) > 1.0);
    }
}
