//! Heatmap generation.
//!
//! Each renderable activity of the selected year contributes one sample at
//! its start location, weighted by distance in kilometers and capped so a
//! handful of ultras cannot wash out everything else.
//!
//! For very large archives the samples can additionally be binned into a
//! sparse grid of meter-sized cells ([`aggregate_heatmap`]), which keeps the
//! renderer's point count bounded.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityRecord, TOTAL_YEAR};
use crate::geometry::decode_path;
use crate::{geo_utils, Bounds, GpsPoint, LatLng, MapPoint};

/// Configuration for heatmap generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct HeatmapConfig {
    /// Upper bound on a single sample's weight (default: 20.0, i.e. 20 km)
    pub max_weight: f64,
    /// Grid cell size in meters for aggregation (default: 500m)
    pub cell_size_meters: f64,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            max_weight: 20.0,
            cell_size_meters: 500.0,
        }
    }
}

/// Which years contribute to the heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum YearFilter {
    All,
    Year(i32),
}

impl YearFilter {
    /// Parse a year key as used by the filter surface. `"Total"` means all
    /// years; anything that is not a number matches nothing.
    pub fn from_key(key: &str) -> Option<Self> {
        if key == TOTAL_YEAR {
            return Some(YearFilter::All);
        }
        key.trim().parse().ok().map(YearFilter::Year)
    }

    pub fn matches(&self, year: i32) -> bool {
        match self {
            YearFilter::All => true,
            YearFilter::Year(y) => *y == year,
        }
    }
}

/// A weighted sample for the density overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct HeatmapPoint {
    /// Sample location in display datum
    pub location: MapPoint,
    /// Weight in `[0, max_weight]`
    pub weight: f64,
}

/// Representative source-datum point: explicit start, else first path point.
fn representative_point(record: &ActivityRecord) -> Option<GpsPoint> {
    if let Some(start) = record.start_point() {
        return Some(start);
    }
    let encoded = record.encoded_path()?;
    match decode_path(encoded) {
        Ok(points) => points.first().copied(),
        Err(e) => {
            debug!("[ActivityMap] Heatmap skipping {}: {}", record.id, e);
            None
        }
    }
}

/// Derive heatmap samples for every renderable activity of the given year.
///
/// # Example
/// ```
/// use activity_map::{derive_heatmap, ActivityRecord, HeatmapConfig, YearFilter};
///
/// let records = ActivityRecord::parse_archive(r#"[
///     {"run_id": 1, "distance": 25000, "start_date": "2024-05-01 06:30:00",
///      "start_latlng": [39.9, 116.4]},
///     {"run_id": 2, "distance": 8000, "start_date": "2023-05-01 06:30:00",
///      "start_latlng": [39.9, 116.4]}
/// ]"#).unwrap();
///
/// let points = derive_heatmap(&records, YearFilter::Year(2024), &HeatmapConfig::default());
/// assert_eq!(points.len(), 1);
/// assert_eq!(points[0].weight, 20.0);
/// ```
pub fn derive_heatmap(
    activities: &[ActivityRecord],
    year_filter: YearFilter,
    config: &HeatmapConfig,
) -> Vec<HeatmapPoint> {
    activities
        .iter()
        .filter(|a| a.is_renderable())
        .filter(|a| a.year().is_some_and(|y| year_filter.matches(y)))
        .filter_map(|a| {
            let point = representative_point(a)?;
            Some(HeatmapPoint {
                location: point.to_display(),
                weight: (a.distance / 1000.0).min(config.max_weight),
            })
        })
        .collect()
}

// ============================================================================
// Grid aggregation
// ============================================================================

/// A single non-empty cell of the aggregated heatmap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct HeatmapCell {
    /// Grid row index
    pub row: i32,
    /// Grid column index
    pub col: i32,
    /// Cell center for rendering
    pub center: MapPoint,
    /// Sum of sample weights in this cell
    pub weight: f64,
    /// Normalized weight (0.0-1.0) for color mapping
    pub density: f32,
    /// Number of samples that fell in this cell
    pub sample_count: u32,
}

/// Aggregated heatmap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct HeatmapGrid {
    /// Non-empty cells only (sparse representation), ordered by row then column
    pub cells: Vec<HeatmapCell>,
    /// Extent of the samples; `None` when there were none
    pub bounds: Option<Bounds>,
    /// Cell size used
    pub cell_size_meters: f64,
    /// Heaviest cell weight, used for normalization
    pub max_weight: f64,
}

/// Grid coordinate
type CellCoord = (i32, i32);

#[derive(Debug, Default)]
struct CellBuilder {
    weight: f64,
    sample_count: u32,
}

/// Grid projection anchored at a reference latitude.
struct GridProjection {
    ref_lat: f64,
    lat_step: f64,
    lng_step: f64,
}

impl GridProjection {
    fn new(ref_lat: f64, cell_size_meters: f64) -> Self {
        Self {
            ref_lat,
            lat_step: cell_size_meters / geo_utils::METERS_PER_DEGREE,
            lng_step: geo_utils::meters_to_degrees(cell_size_meters, ref_lat),
        }
    }

    fn cell_of(&self, point: &MapPoint) -> CellCoord {
        let row = ((point.latitude - self.ref_lat) / self.lat_step).floor() as i32;
        let col = (point.longitude / self.lng_step).floor() as i32;
        (row, col)
    }

    fn cell_center(&self, (row, col): CellCoord) -> MapPoint {
        MapPoint::new(
            self.ref_lat + (row as f64 + 0.5) * self.lat_step,
            (col as f64 + 0.5) * self.lng_step,
        )
    }
}

/// Bin samples into a sparse grid, summing weights per cell.
///
/// The grid is anchored at the mean latitude of the samples so cells stay
/// roughly square across the area being drawn.
pub fn aggregate_heatmap(points: &[HeatmapPoint], config: &HeatmapConfig) -> HeatmapGrid {
    let locations: Vec<MapPoint> = points.iter().map(|p| p.location).collect();
    let bounds = geo_utils::compute_bounds(&locations);

    let empty = HeatmapGrid {
        cells: vec![],
        bounds,
        cell_size_meters: config.cell_size_meters,
        max_weight: 0.0,
    };
    if bounds.is_none() || !(config.cell_size_meters > 0.0) {
        return empty;
    }

    let valid: Vec<&HeatmapPoint> = points.iter().filter(|p| p.location.is_valid()).collect();
    let ref_lat = valid.iter().map(|p| p.location.latitude).sum::<f64>() / valid.len() as f64;
    let projection = GridProjection::new(ref_lat, config.cell_size_meters);

    let mut cells: HashMap<CellCoord, CellBuilder> = HashMap::new();
    for p in valid {
        let cell = cells.entry(projection.cell_of(&p.location)).or_default();
        cell.weight += p.weight;
        cell.sample_count += 1;
    }

    let max_weight = cells.values().map(|c| c.weight).fold(0.0, f64::max);

    let mut out: Vec<HeatmapCell> = cells
        .into_iter()
        .map(|(coord, builder)| HeatmapCell {
            row: coord.0,
            col: coord.1,
            center: projection.cell_center(coord),
            weight: builder.weight,
            density: if max_weight > 0.0 {
                (builder.weight / max_weight) as f32
            } else {
                0.0
            },
            sample_count: builder.sample_count,
        })
        .collect();
    out.sort_by_key(|c| (c.row, c.col));

    HeatmapGrid {
        cells: out,
        max_weight,
        ..empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: i64, date: &str, distance: f64, start: Option<[f64; 2]>) -> ActivityRecord {
        ActivityRecord {
            id,
            name: String::new(),
            sport_type: None,
            distance,
            start_date: date.to_string(),
            start_date_local: None,
            location_country: None,
            start_latlng: start,
            summary_polyline: None,
        }
    }

    #[test]
    fn test_weight_capped() {
        let records = vec![run(1, "2024-05-01 06:30:00", 25_000.0, Some([39.9, 116.4]))];
        let points = derive_heatmap(&records, YearFilter::Year(2024), &HeatmapConfig::default());
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].weight, 20.0);
    }

    #[test]
    fn test_weight_in_kilometers() {
        let records = vec![run(1, "2024-05-01 06:30:00", 5_250.0, Some([39.9, 116.4]))];
        let points = derive_heatmap(&records, YearFilter::All, &HeatmapConfig::default());
        assert!((points[0].weight - 5.25).abs() < 1e-12);
    }

    #[test]
    fn test_location_is_display_datum() {
        let records = vec![run(1, "2024-05-01 06:30:00", 5_000.0, Some([39.9, 116.4]))];
        let points = derive_heatmap(&records, YearFilter::All, &HeatmapConfig::default());
        assert_eq!(points[0].location, GpsPoint::new(39.9, 116.4).to_display());
    }

    #[test]
    fn test_year_filter() {
        let records = vec![
            run(1, "2024-05-01 06:30:00", 5_000.0, Some([39.9, 116.4])),
            run(2, "2023-05-01 06:30:00", 5_000.0, Some([39.9, 116.4])),
        ];
        let config = HeatmapConfig::default();
        assert_eq!(derive_heatmap(&records, YearFilter::Year(2023), &config).len(), 1);
        assert_eq!(derive_heatmap(&records, YearFilter::All, &config).len(), 2);
        assert!(derive_heatmap(&records, YearFilter::Year(2020), &config).is_empty());
    }

    #[test]
    fn test_invalid_records_excluded() {
        let records = vec![
            run(1, "not-a-date", 5_000.0, Some([39.9, 116.4])),
            run(2, "2024-05-01 06:30:00", 0.0, Some([39.9, 116.4])),
            run(3, "2024-05-01 06:30:00", -10.0, Some([39.9, 116.4])),
            run(4, "2024-05-01 06:30:00", 5_000.0, None),
        ];
        assert!(derive_heatmap(&records, YearFilter::All, &HeatmapConfig::default()).is_empty());
    }

    #[test]
    fn test_falls_back_to_first_path_point() {
        let mut r = run(1, "2024-05-01 06:30:00", 5_000.0, None);
        r.summary_polyline = Some("_p~iF~ps|U_ulLnnqC_mqNvxq`@".to_string());
        let points = derive_heatmap(&[r], YearFilter::All, &HeatmapConfig::default());
        assert_eq!(points.len(), 1);
        assert!((points[0].location.latitude - 38.5).abs() < 1e-9);
        assert!((points[0].location.longitude + 120.2).abs() < 1e-9);
    }

    #[test]
    fn test_year_filter_from_key() {
        assert_eq!(YearFilter::from_key("Total"), Some(YearFilter::All));
        assert_eq!(YearFilter::from_key("2024"), Some(YearFilter::Year(2024)));
        assert_eq!(YearFilter::from_key("Beijing"), None);
    }

    #[test]
    fn test_aggregate_empty() {
        let grid = aggregate_heatmap(&[], &HeatmapConfig::default());
        assert!(grid.cells.is_empty());
        assert!(grid.bounds.is_none());
        assert_eq!(grid.max_weight, 0.0);
    }

    #[test]
    fn test_aggregate_sums_nearby_samples() {
        let here = MapPoint::new(39.9000, 116.4000);
        let close = MapPoint::new(39.9001, 116.4001);
        let far = MapPoint::new(39.9500, 116.4500);
        let points = vec![
            HeatmapPoint { location: here, weight: 5.0 },
            HeatmapPoint { location: close, weight: 3.0 },
            HeatmapPoint { location: far, weight: 2.0 },
        ];
        let grid = aggregate_heatmap(&points, &HeatmapConfig::default());

        let total: f64 = grid.cells.iter().map(|c| c.weight).sum();
        assert!((total - 10.0).abs() < 1e-12);
        assert_eq!(grid.cells.iter().map(|c| c.sample_count).sum::<u32>(), 3);
        assert!(grid.cells.len() >= 2);

        let heaviest = grid.cells.iter().find(|c| c.density == 1.0).unwrap();
        assert!(heaviest.weight >= 5.0);
        assert_eq!(grid.max_weight, heaviest.weight);
    }

    #[test]
    fn test_cell_center_is_near_samples() {
        let points = vec![HeatmapPoint { location: MapPoint::new(31.23, 121.47), weight: 1.0 }];
        let grid = aggregate_heatmap(&points, &HeatmapConfig::default());
        assert_eq!(grid.cells.len(), 1);
        let center = grid.cells[0].center;
        // Half a 500m cell is well under 0.01 degrees
        assert!((center.latitude - 31.23).abs() < 0.01);
        assert!((center.longitude - 121.47).abs() < 0.01);
    }
}
