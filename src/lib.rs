//! # Activity Map
//!
//! Geospatial aggregation pipeline for rendering a personal running archive on
//! an interactive map.
//!
//! This library provides:
//! - WGS-84 to GCJ-02 datum correction for tracks drawn on Chinese map tiles
//! - Year / city / title filtering with a stable, reproducible ordering
//! - Route geometry built from encoded polylines or start coordinates
//! - Viewport fitting (center + zoom) for any geometry collection
//! - Distance-weighted heatmap samples
//! - A tick-driven reveal animation that is safe against stale timers
//!
//! Everything here is renderer-agnostic: the output is plain data that a map
//! SDK (web, iOS, Android) draws however it likes.
//!
//! ## Features
//!
//! - **`parallel`** - Build geometry for large archives with rayon
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`cli`** - Build the `activity-map-cli` debug tool
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use activity_map::{ActivityRecord, MapConfig, MapSession};
//!
//! let json = r#"[
//!     {"run_id": 1, "name": "Morning Run", "distance": 5200.0,
//!      "start_date": "2024-03-02 07:10:00", "start_date_local": "2024-03-02 15:10:00",
//!      "location_country": "Beijing", "start_latlng": [39.9, 116.4],
//!      "summary_polyline": "_p~iF~ps|U_ulLnnqC_mqNvxq`@"}
//! ]"#;
//!
//! let activities = ActivityRecord::parse_archive(json).unwrap();
//! let mut session = MapSession::new(activities, MapConfig::default()).unwrap();
//!
//! // Selecting a year starts a reveal animation; drive it with the returned token
//! let mut frame = session.select_year("2024");
//! while let Some(token) = frame.next_tick {
//!     frame = session.tick(token).unwrap();
//! }
//! assert_eq!(frame.geometry.len(), 1);
//! assert_eq!(frame.heatmap.len(), 1);
//! ```

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{ActivityMapError, Result};

// Datum correction
pub mod coord;
pub use coord::{in_correction_region, wgs84_to_gcj02};

pub mod geo_utils;

// Activity records, filtering and ordering
pub mod activity;
pub use activity::{
    available_years, filter_and_sort, filter_city_runs, filter_title_runs, filter_year_runs,
    sort_by_date_desc, title_for_show, ActivityFilter, ActivityRecord, TOTAL_YEAR,
};

// Route geometry
pub mod geometry;
pub use geometry::{build_geometry, decode_path, encode_path, GeometryCollection, PathGeometry};

// Viewport fitting
pub mod viewport;
pub use viewport::{compute_viewport, zoom_for_spread, Viewport, ViewportConfig, ZoomThreshold};

// Heatmap generation
pub mod heatmap;
pub use heatmap::{
    aggregate_heatmap, derive_heatmap, HeatmapCell, HeatmapConfig, HeatmapGrid, HeatmapPoint,
    YearFilter,
};

// Reveal animation
pub mod animation;
pub use animation::{
    slice_size, AnimationConfig, AnimationPhase, AnimationSequencer, AnimationState, Snapshot,
    TickToken,
};

// Filter control surface
pub mod session;
pub use session::{MapConfig, MapSession, RenderFrame};

#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("ActivityMapRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// Read access to a latitude/longitude pair, whatever its datum.
///
/// Geometry helpers that only care about the numbers (bounds, distances) are
/// generic over this trait so they work on both [`GpsPoint`] and [`MapPoint`]
/// without erasing which datum a value is in.
pub trait LatLng {
    fn lat(&self) -> f64;
    fn lng(&self) -> f64;

    /// Check if the point has valid coordinates.
    fn is_valid(&self) -> bool {
        let (lat, lng) = (self.lat(), self.lng());
        lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng)
    }
}

/// A raw GPS coordinate in the source datum (WGS-84).
///
/// # Example
/// ```
/// use activity_map::GpsPoint;
/// let point = GpsPoint::new(39.9042, 116.4074); // Beijing
/// let shown = point.to_display();
/// assert_ne!(shown.latitude, point.latitude);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl LatLng for GpsPoint {
    #[inline]
    fn lat(&self) -> f64 {
        self.latitude
    }
    #[inline]
    fn lng(&self) -> f64 {
        self.longitude
    }
}

/// A coordinate in the display datum (GCJ-02), ready to hand to the renderer.
///
/// Only [`GpsPoint::to_display`] produces these from raw data, so a value of
/// this type has always been through the datum correction exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct MapPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl MapPoint {
    /// Create a display-datum point from coordinates that are already corrected.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl LatLng for MapPoint {
    #[inline]
    fn lat(&self) -> f64 {
        self.latitude
    }
    #[inline]
    fn lng(&self) -> f64 {
        self.longitude
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points. Returns `None` for empty input.
    pub fn from_points<P: LatLng>(points: &[P]) -> Option<Self> {
        geo_utils::compute_bounds(points.iter())
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> MapPoint {
        MapPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Latitude extent in degrees.
    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Longitude extent in degrees.
    pub fn lng_span(&self) -> f64 {
        self.max_lng - self.min_lng
    }

    /// Whether the point lies inside or on the edge of the box.
    pub fn contains<P: LatLng>(&self, point: &P) -> bool {
        point.lat() >= self.min_lat
            && point.lat() <= self.max_lat
            && point.lng() >= self.min_lng
            && point.lng() <= self.max_lng
    }
}

// ============================================================================
// Tests
// ============================================================================
