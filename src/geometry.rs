//! # Geometry Builder
//!
//! Turns an ordered list of activities into display-datum paths, one per
//! activity that carries location data.
//!
//! ## Path sources
//!
//! 1. The encoded polyline (`summary_polyline`), decoded with the Google
//!    polyline algorithm at precision 5.
//! 2. Otherwise the explicit start coordinate, as a single-point path.
//!
//! A record whose polyline fails to decode is skipped, as is one that fails
//! [`ActivityRecord::validate`] or ends up with no points. None of these abort
//! the batch. Every surviving point goes through the datum correction exactly
//! once.
//!
//! Output order always matches input order, including in the parallel build.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ActivityMapError, Result};
use crate::{geo_utils, ActivityRecord, GpsPoint, MapPoint};

/// Precision of encoded polylines in the archive (1e5).
pub const POLYLINE_PRECISION: u32 = 5;

/// One activity's route in the display datum. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PathGeometry {
    /// Activity this path was built from
    pub activity_id: i64,
    /// Points in display datum, in recorded order
    pub points: Vec<MapPoint>,
}

impl PathGeometry {
    /// Path length in meters.
    pub fn length_meters(&self) -> f64 {
        geo_utils::polyline_length(&self.points)
    }
}

/// Ordered collection of paths, as handed to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GeometryCollection {
    pub paths: Vec<PathGeometry>,
}

impl GeometryCollection {
    pub fn new(paths: Vec<PathGeometry>) -> Self {
        Self { paths }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// All points of all paths, in order.
    pub fn points(&self) -> impl Iterator<Item = &MapPoint> {
        self.paths.iter().flat_map(|p| p.points.iter())
    }

    /// Total number of points across all paths.
    pub fn point_count(&self) -> usize {
        self.paths.iter().map(|p| p.points.len()).sum()
    }

    /// Export as a GeoJSON `FeatureCollection` of `LineString` features.
    ///
    /// Coordinates are `[lng, lat]` per RFC 7946. Single-point paths
    /// are emitted as `Point` features since a one-vertex `LineString` is
    /// invalid GeoJSON.
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .paths
            .iter()
            .map(|path| {
                let coords: Vec<[f64; 2]> =
                    path.points.iter().map(|p| [p.longitude, p.latitude]).collect();
                let geometry = if coords.len() == 1 {
                    json!({ "type": "Point", "coordinates": coords[0] })
                } else {
                    json!({ "type": "LineString", "coordinates": coords })
                };
                json!({
                    "type": "Feature",
                    "geometry": geometry,
                    "properties": { "run_id": path.activity_id },
                })
            })
            .collect();

        json!({ "type": "FeatureCollection", "features": features })
    }
}

/// Decode a Google encoded polyline into source-datum points.
pub fn decode_path(encoded: &str) -> std::result::Result<Vec<GpsPoint>, String> {
    let line = polyline::decode_polyline(encoded, POLYLINE_PRECISION).map_err(|e| e.to_string())?;
    // geo coordinates are (x, y) = (lng, lat)
    Ok(line.coords().map(|c| GpsPoint::new(c.y, c.x)).collect())
}

/// Encode source-datum points as a Google polyline.
pub fn encode_path(points: &[GpsPoint]) -> String {
    let line: geo::LineString<f64> = points.iter().map(|p| (p.longitude, p.latitude)).collect();
    polyline::encode_coordinates(line, POLYLINE_PRECISION).unwrap_or_default()
}

/// Raw source-datum path for one record.
///
/// `Ok(vec![])` means the record simply has no location data.
pub fn raw_path(record: &ActivityRecord) -> Result<Vec<GpsPoint>> {
    if let Some(encoded) = record.encoded_path() {
        return decode_path(encoded).map_err(|message| ActivityMapError::InvalidPolyline {
            id: record.id,
            message,
        });
    }
    Ok(record.start_point().into_iter().collect())
}

/// Build the display path for one record, or `None` if it contributes nothing.
pub fn path_for_record(record: &ActivityRecord) -> Option<PathGeometry> {
    if !record.is_renderable() {
        return None;
    }

    let raw = match raw_path(record) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("[ActivityMap] Skipping geometry: {}", e);
            return None;
        }
    };

    let points: Vec<MapPoint> = raw.iter().map(GpsPoint::to_display).collect();
    if points.is_empty() {
        return None;
    }

    Some(PathGeometry { activity_id: record.id, points })
}

/// Build the geometry collection for an ordered activity list.
///
/// # Example
/// ```
/// use activity_map::{build_geometry, ActivityRecord};
///
/// let records = ActivityRecord::parse_archive(r#"[
///     {"run_id": 1, "distance": 3000, "start_date": "2024-05-01 06:30:00",
///      "summary_polyline": "_p~iF~ps|U_ulLnnqC_mqNvxq`@"},
///     {"run_id": 2, "distance": 3000, "start_date": "2024-05-02 06:30:00"}
/// ]"#).unwrap();
///
/// let geometry = build_geometry(&records);
/// assert_eq!(geometry.len(), 1); // run 2 has no location data
/// assert_eq!(geometry.paths[0].points.len(), 3);
/// ```
pub fn build_geometry(ordered: &[ActivityRecord]) -> GeometryCollection {
    #[cfg(feature = "parallel")]
    let paths: Vec<PathGeometry> = {
        use rayon::prelude::*;
        // collect into Vec keeps input order
        ordered.par_iter().filter_map(path_for_record).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let paths: Vec<PathGeometry> = ordered.iter().filter_map(path_for_record).collect();

    GeometryCollection { paths }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Google's reference polyline: (38.5, -120.2), (40.7, -120.95), (43.252, -126.453)
    const REFERENCE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

    fn record(id: i64) -> ActivityRecord {
        ActivityRecord {
            id,
            name: String::new(),
            sport_type: None,
            distance: 4000.0,
            start_date: "2024-05-01 06:30:00".to_string(),
            start_date_local: None,
            location_country: None,
            start_latlng: None,
            summary_polyline: None,
        }
    }

    #[test]
    fn test_decode_reference_polyline() {
        let points = decode_path(REFERENCE).unwrap();
        assert_eq!(points.len(), 3);
        assert!((points[0].latitude - 38.5).abs() < 1e-9);
        assert!((points[0].longitude + 120.2).abs() < 1e-9);
        assert!((points[2].latitude - 43.252).abs() < 1e-9);
        assert!((points[2].longitude + 126.453).abs() < 1e-9);
    }

    #[test]
    fn test_encode_decode_china_track() {
        let track = vec![
            GpsPoint::new(39.90000, 116.40000),
            GpsPoint::new(39.90100, 116.40150),
        ];
        let decoded = decode_path(&encode_path(&track)).unwrap();
        assert_eq!(decoded.len(), 2);
        assert!((decoded[1].latitude - 39.901).abs() < 1e-5);
        assert!((decoded[1].longitude - 116.4015).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_polyline_is_skipped() {
        let mut bad = record(1);
        // characters below '?' are outside the polyline alphabet
        bad.summary_polyline = Some("!!!!".to_string());
        assert!(matches!(
            raw_path(&bad),
            Err(ActivityMapError::InvalidPolyline { id: 1, .. })
        ));

        let mut good = record(2);
        good.summary_polyline = Some(REFERENCE.to_string());

        let geometry = build_geometry(&[bad, good]);
        assert_eq!(geometry.len(), 1);
        assert_eq!(geometry.paths[0].activity_id, 2);
    }

    #[test]
    fn test_start_point_fallback_is_transformed() {
        let mut r = record(1);
        r.start_latlng = Some([39.9, 116.4]);
        let geometry = build_geometry(&[r]);
        assert_eq!(geometry.len(), 1);
        assert_eq!(geometry.paths[0].points, vec![GpsPoint::new(39.9, 116.4).to_display()]);
    }

    #[test]
    fn test_polyline_preferred_over_start_point() {
        let mut r = record(1);
        r.start_latlng = Some([39.9, 116.4]);
        r.summary_polyline = Some(REFERENCE.to_string());
        let geometry = build_geometry(&[r]);
        assert_eq!(geometry.paths[0].points.len(), 3);
    }

    #[test]
    fn test_invalid_records_excluded() {
        let mut bad_date = record(1);
        bad_date.start_date = "??".to_string();
        bad_date.start_latlng = Some([39.9, 116.4]);

        let mut no_distance = record(2);
        no_distance.distance = 0.0;
        no_distance.start_latlng = Some([39.9, 116.4]);

        let no_location = record(3);

        assert!(build_geometry(&[bad_date, no_distance, no_location]).is_empty());
    }

    #[test]
    fn test_order_preserved() {
        let records: Vec<ActivityRecord> = (0..50)
            .map(|i| {
                let mut r = record(i);
                r.start_latlng = Some([30.0 + i as f64 * 0.01, 110.0]);
                r
            })
            .collect();
        let geometry = build_geometry(&records);
        let ids: Vec<i64> = geometry.paths.iter().map(|p| p.activity_id).collect();
        assert_eq!(ids, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_geojson_export() {
        let mut line = record(1);
        line.summary_polyline = Some(REFERENCE.to_string());
        let mut point = record(2);
        point.start_latlng = Some([51.5, -0.12]);

        let geojson = build_geometry(&[line, point]).to_geojson();
        assert_eq!(geojson["type"], "FeatureCollection");
        let features = geojson["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["geometry"]["type"], "LineString");
        assert_eq!(features[0]["properties"]["run_id"], 1);
        assert_eq!(features[1]["geometry"]["type"], "Point");
        // [lng, lat] ordering, identity outside the correction region
        assert_eq!(features[1]["geometry"]["coordinates"][0], -0.12);
        assert_eq!(features[1]["geometry"]["coordinates"][1], 51.5);
    }

    #[test]
    fn test_path_length() {
        let path = PathGeometry {
            activity_id: 1,
            points: vec![MapPoint::new(39.900, 116.4), MapPoint::new(39.901, 116.4)],
        };
        assert!((path.length_meters() - 111.2).abs() < 1.0);
    }
}
