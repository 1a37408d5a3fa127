//! FFI bindings for mobile platforms (iOS/Android).
//!
//! The host app keeps one map session alive in Rust and drives it through the
//! `session_*` functions; the stateless pipeline stages are exported as
//! plain functions. The host owns the animation timer: it waits
//! `next_tick.delay_ms` and then calls [`session_tick`] with the token.

use std::sync::{Mutex, MutexGuard};

use log::{info, warn};

use crate::{
    build_geometry, compute_viewport, derive_heatmap, init_logging, ActivityRecord,
    GeometryCollection, GpsPoint, HeatmapPoint, MapConfig, MapPoint, MapSession, RenderFrame,
    TickToken, Viewport, ViewportConfig, YearFilter,
};

static SESSION: Mutex<Option<MapSession>> = Mutex::new(None);

fn lock_session() -> MutexGuard<'static, Option<MapSession>> {
    match SESSION.lock() {
        Ok(guard) => guard,
        // A panic mid-update leaves plain data behind; keep serving it
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Run `f` against the loaded session. `None` if no session is loaded.
fn with_session<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut MapSession) -> R,
{
    lock_session().as_mut().map(f)
}

// ============================================================================
// Session
// ============================================================================

/// Load an archive (JSON array of runs) and replace any existing session.
///
/// Returns the initial frame, or `None` if the archive or config is invalid.
#[uniffi::export]
pub fn session_load(archive_json: String, config: MapConfig) -> Option<RenderFrame> {
    init_logging();
    if let Err(e) = config.validate() {
        warn!("[ActivityMap] Rejected config: {}", e);
        return None;
    }
    let session = match MapSession::from_json(&archive_json, config) {
        Ok(session) => session,
        Err(e) => {
            warn!("[ActivityMap] Failed to load archive: {}", e);
            return None;
        }
    };
    let frame = session.frame();
    *lock_session() = Some(session);
    Some(frame)
}

/// Drop the current session.
#[uniffi::export]
pub fn session_clear() {
    init_logging();
    *lock_session() = None;
    info!("[ActivityMap] Session cleared");
}

#[uniffi::export]
pub fn session_frame() -> Option<RenderFrame> {
    with_session(|s| s.frame())
}

#[uniffi::export]
pub fn session_select_year(year: String) -> Option<RenderFrame> {
    init_logging();
    with_session(|s| s.select_year(&year))
}

#[uniffi::export]
pub fn session_select_city(city: String) -> Option<RenderFrame> {
    init_logging();
    with_session(|s| s.select_city(&city))
}

#[uniffi::export]
pub fn session_select_title(title: String) -> Option<RenderFrame> {
    init_logging();
    with_session(|s| s.select_title(&title))
}

/// Focus on the given runs of the current selection (empty = all).
#[uniffi::export]
pub fn session_locate(run_ids: Vec<i64>) -> Option<RenderFrame> {
    init_logging();
    with_session(|s| s.locate(&run_ids)).flatten()
}

/// Deliver a scheduled tick. `None` when the token is stale.
#[uniffi::export]
pub fn session_tick(token: TickToken) -> Option<RenderFrame> {
    with_session(|s| s.tick(token)).flatten()
}

#[uniffi::export]
pub fn session_available_years() -> Vec<i32> {
    with_session(|s| s.available_years()).unwrap_or_default()
}

// ============================================================================
// Stateless pipeline
// ============================================================================

#[uniffi::export]
pub fn default_map_config() -> MapConfig {
    MapConfig::default()
}

/// Convert a source-datum coordinate to the display datum.
#[uniffi::export]
pub fn ffi_to_display(point: GpsPoint) -> MapPoint {
    point.to_display()
}

/// Build geometry for an archive in the given order.
#[uniffi::export]
pub fn ffi_build_geometry(archive_json: String) -> GeometryCollection {
    init_logging();
    match ActivityRecord::parse_archive(&archive_json) {
        Ok(records) => build_geometry(&records),
        Err(e) => {
            warn!("[ActivityMap] ffi_build_geometry: {}", e);
            GeometryCollection::default()
        }
    }
}

#[uniffi::export]
pub fn ffi_compute_viewport(geometry: GeometryCollection, config: ViewportConfig) -> Viewport {
    compute_viewport(&geometry, &config)
}

/// Heatmap samples for a year key (`"Total"` for all years).
#[uniffi::export]
pub fn ffi_derive_heatmap(archive_json: String, year: String, config: MapConfig) -> Vec<HeatmapPoint> {
    init_logging();
    let Some(year_filter) = YearFilter::from_key(&year) else {
        return vec![];
    };
    match ActivityRecord::parse_archive(&archive_json) {
        Ok(records) => derive_heatmap(&records, year_filter, &config.heatmap),
        Err(e) => {
            warn!("[ActivityMap] ffi_derive_heatmap: {}", e);
            vec![]
        }
    }
}

/// GeoJSON `FeatureCollection` text for a geometry collection.
#[uniffi::export]
pub fn ffi_geometry_to_geojson(geometry: GeometryCollection) -> String {
    geometry.to_geojson().to_string()
}
