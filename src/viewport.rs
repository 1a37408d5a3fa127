//! # Bounds Calculator
//!
//! Fits a camera (center + zoom) to a geometry collection.
//!
//! ## Algorithm
//! 1. Bounding box over every valid point of every path (points outside
//!    lat ±90 / lng ±180 are treated as corrupt and ignored)
//! 2. Any axis with zero extent is padded by a fixed epsilon each side
//! 3. Center = midpoint of the box
//! 4. `spread = max(lng_span, lat_span)` is looked up in an ordered threshold
//!    table, smaller spread giving a higher zoom
//!
//! An empty collection (or one with no valid points) gets the configured
//! fallback camera.

use serde::{Deserialize, Serialize};

use crate::error::{ActivityMapError, Result};
use crate::{geo_utils, Bounds, GeometryCollection, MapPoint};

/// One row of the zoom table: spreads strictly below `max_spread` get `zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ZoomThreshold {
    /// Upper bound (exclusive) on the spread in degrees
    pub max_spread: f64,
    /// Zoom level used below that bound
    pub zoom: u8,
}

/// Configuration for viewport fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ViewportConfig {
    /// Camera center when there is nothing to fit.
    /// Default: Beijing (39.90923, 116.397428)
    pub fallback_center: MapPoint,

    /// Zoom used with the fallback center. Default: 10
    pub fallback_zoom: u8,

    /// Spread → zoom table, ordered by increasing `max_spread`.
    /// Default: <0.01 → 16, <0.1 → 13, <1 → 10
    pub zoom_thresholds: Vec<ZoomThreshold>,

    /// Zoom for spreads beyond the last threshold. Default: 7
    pub min_zoom: u8,

    /// Padding in degrees applied to each side of a zero-extent axis.
    /// Default: 0.0005 (~55 meters)
    pub degenerate_padding: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            fallback_center: MapPoint::new(39.90923, 116.397428),
            fallback_zoom: 10,
            zoom_thresholds: vec![
                ZoomThreshold { max_spread: 0.01, zoom: 16 },
                ZoomThreshold { max_spread: 0.1, zoom: 13 },
                ZoomThreshold { max_spread: 1.0, zoom: 10 },
            ],
            min_zoom: 7,
            degenerate_padding: 0.0005,
        }
    }
}

impl ViewportConfig {
    /// Check the zoom table is monotonic: spreads strictly increasing, zooms
    /// never increasing, and `min_zoom` no higher than the last row.
    pub fn validate(&self) -> Result<()> {
        if self.zoom_thresholds.is_empty() {
            return Err(ActivityMapError::InvalidConfig(
                "at least one threshold is required".to_string(),
            ));
        }
        if !(self.degenerate_padding > 0.0) {
            return Err(ActivityMapError::InvalidConfig(format!(
                "degenerate padding must be positive, got {}",
                self.degenerate_padding
            )));
        }
        for pair in self.zoom_thresholds.windows(2) {
            if !(pair[1].max_spread > pair[0].max_spread) {
                return Err(ActivityMapError::InvalidConfig(format!(
                    "spreads must increase ({} then {})",
                    pair[0].max_spread, pair[1].max_spread
                )));
            }
            if pair[1].zoom > pair[0].zoom {
                return Err(ActivityMapError::InvalidConfig(format!(
                    "zoom must not increase with spread ({} then {})",
                    pair[0].zoom, pair[1].zoom
                )));
            }
        }
        let last = self.zoom_thresholds[self.zoom_thresholds.len() - 1];
        if self.min_zoom > last.zoom {
            return Err(ActivityMapError::InvalidConfig(format!(
                "min_zoom {} exceeds last threshold zoom {}",
                self.min_zoom, last.zoom
            )));
        }
        Ok(())
    }
}

/// Camera placement for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Viewport {
    pub center: MapPoint,
    pub zoom: u8,
    /// Padded box the camera was fitted to; `None` for the fallback camera
    pub bounds: Option<Bounds>,
}

/// Zoom level for a spread in degrees.
pub fn zoom_for_spread(spread: f64, config: &ViewportConfig) -> u8 {
    config
        .zoom_thresholds
        .iter()
        .find(|t| spread < t.max_spread)
        .map_or(config.min_zoom, |t| t.zoom)
}

/// Fit a viewport to every valid point of the collection.
///
/// # Example
/// ```
/// use activity_map::{compute_viewport, GeometryCollection, MapPoint, PathGeometry, ViewportConfig};
///
/// let collection = GeometryCollection::new(vec![PathGeometry {
///     activity_id: 1,
///     points: vec![MapPoint::new(39.90, 116.40), MapPoint::new(39.95, 116.45)],
/// }]);
///
/// let viewport = compute_viewport(&collection, &ViewportConfig::default());
/// assert_eq!(viewport.zoom, 13);
/// assert!((viewport.center.latitude - 39.925).abs() < 1e-9);
/// ```
pub fn compute_viewport(collection: &GeometryCollection, config: &ViewportConfig) -> Viewport {
    let Some(bounds) = geo_utils::compute_bounds(collection.points()) else {
        return Viewport {
            center: config.fallback_center,
            zoom: config.fallback_zoom,
            bounds: None,
        };
    };

    let bounds = pad_degenerate(bounds, config.degenerate_padding);
    let spread = bounds.lng_span().max(bounds.lat_span());

    Viewport {
        center: bounds.center(),
        zoom: zoom_for_spread(spread, config),
        bounds: Some(bounds),
    }
}

fn pad_degenerate(mut bounds: Bounds, padding: f64) -> Bounds {
    if bounds.min_lat == bounds.max_lat {
        bounds.min_lat -= padding;
        bounds.max_lat += padding;
    }
    if bounds.min_lng == bounds.max_lng {
        bounds.min_lng -= padding;
        bounds.max_lng += padding;
    }
    bounds
}
