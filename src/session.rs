//! # Map Session
//!
//! The filter control surface: holds the archive and the current selection,
//! and turns user actions into [`RenderFrame`]s.
//!
//! | Action | Effect |
//! |--------|--------|
//! | [`MapSession::select_year`] | Year filter, title unchanged, animation restarts |
//! | [`MapSession::select_city`] | City filter, year back to the current year, animation restarts |
//! | [`MapSession::select_title`] | Title filter, year back to the current year, animation restarts |
//! | [`MapSession::locate`] | Show a subset of the current runs at once, animation stops |
//! | [`MapSession::tick`] | Advance the running animation |
//!
//! A filter change always replaces the previous geometry; paths from an
//! earlier selection never linger on the map.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::activity::{available_years, sort_by_date_desc, title_for_show, TOTAL_YEAR};
use crate::animation::{AnimationConfig, AnimationPhase, AnimationSequencer, Snapshot, TickToken};
use crate::error::Result;
use crate::geometry::build_geometry;
use crate::heatmap::{derive_heatmap, HeatmapConfig, HeatmapPoint, YearFilter};
use crate::viewport::{compute_viewport, Viewport, ViewportConfig};
use crate::{ActivityFilter, ActivityRecord, GeometryCollection};

/// All tunables of a map session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct MapConfig {
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub heatmap: HeatmapConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
}

impl MapConfig {
    /// Parse a config from JSON; missing sections take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: MapConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.viewport.validate()?;
        self.animation.validate()
    }
}

/// Everything the renderer needs to draw one state of the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RenderFrame {
    /// Map caption; empty until a city/title filter or a locate sets one
    pub title: String,
    /// Selected year key (a year or `"Total"`)
    pub year: String,
    /// Paths to draw right now (a prefix while animating)
    pub geometry: GeometryCollection,
    pub viewport: Viewport,
    /// Heatmap samples for the selected year
    pub heatmap: Vec<HeatmapPoint>,
    pub phase: AnimationPhase,
    /// Token to deliver after `delay_ms`, while animating
    pub next_tick: Option<TickToken>,
    /// Set when a single run is located
    pub single_run_id: Option<i64>,
}

/// Interactive state over one activity archive.
#[derive(Debug, Clone)]
pub struct MapSession {
    activities: Vec<ActivityRecord>,
    config: MapConfig,
    this_year: String,
    year: String,
    title: String,
    filter: ActivityFilter,
    /// Current filter result, newest first
    runs: Vec<ActivityRecord>,
    /// What is on the map right now
    geometry: GeometryCollection,
    viewport: Viewport,
    heatmap: Vec<HeatmapPoint>,
    sequencer: AnimationSequencer,
    single_run_id: Option<i64>,
}

impl MapSession {
    /// Create a session showing the newest year in the archive (or every run
    /// when no record has a usable date). No animation is started; call
    /// [`select_year`](Self::select_year) or [`frame`](Self::frame) to draw.
    ///
    /// Fails if the configuration does not pass [`MapConfig::validate`].
    pub fn new(activities: Vec<ActivityRecord>, config: MapConfig) -> Result<Self> {
        config.validate()?;
        let this_year = available_years(&activities)
            .first()
            .map(|y| y.to_string())
            .unwrap_or_else(|| TOTAL_YEAR.to_string());
        info!(
            "[ActivityMap] Session created: {} activities, current year {}",
            activities.len(),
            this_year
        );

        let sequencer = AnimationSequencer::new(config.animation.clone());
        let viewport = compute_viewport(&GeometryCollection::default(), &config.viewport);
        let mut session = Self {
            activities,
            config,
            year: this_year.clone(),
            filter: ActivityFilter::Year(this_year.clone()),
            this_year,
            title: String::new(),
            runs: vec![],
            geometry: GeometryCollection::default(),
            viewport,
            heatmap: vec![],
            sequencer,
            single_run_id: None,
        };
        session.refresh_selection();
        session.geometry = build_geometry(&session.runs);
        Ok(session)
    }

    /// Parse an archive and create a session over it.
    pub fn from_json(json: &str, config: MapConfig) -> Result<Self> {
        Self::new(ActivityRecord::parse_archive(json)?, config)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn activities(&self) -> &[ActivityRecord] {
        &self.activities
    }

    /// Runs matching the current filter, newest first.
    pub fn runs(&self) -> &[ActivityRecord] {
        &self.runs
    }

    pub fn filter(&self) -> &ActivityFilter {
        &self.filter
    }

    pub fn this_year(&self) -> &str {
        &self.this_year
    }

    pub fn year(&self) -> &str {
        &self.year
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn single_run_id(&self) -> Option<i64> {
        self.single_run_id
    }

    pub fn phase(&self) -> AnimationPhase {
        self.sequencer.phase()
    }

    /// Years present in the archive, newest first.
    pub fn available_years(&self) -> Vec<i32> {
        available_years(&self.activities)
    }

    /// Current frame without changing any state. While animating it carries
    /// the token for the next tick, so a host can pick the animation back up.
    pub fn frame(&self) -> RenderFrame {
        RenderFrame {
            title: self.title.clone(),
            year: self.year.clone(),
            geometry: self.geometry.clone(),
            viewport: self.viewport,
            heatmap: self.heatmap.clone(),
            phase: self.sequencer.phase(),
            next_tick: self.sequencer.pending_tick(),
            single_run_id: self.single_run_id,
        }
    }

    // ========================================================================
    // Filter changes
    // ========================================================================

    /// Show one year (or `"Total"`). The title is left as it was.
    pub fn select_year(&mut self, year: &str) -> RenderFrame {
        info!("[ActivityMap] Year selected: {}", year);
        self.year = year.to_string();
        self.apply_filter(ActivityFilter::Year(year.to_string()))
    }

    /// Show runs whose location contains `city`.
    pub fn select_city(&mut self, city: &str) -> RenderFrame {
        info!("[ActivityMap] City selected: {}", city);
        self.select_by_item(ActivityFilter::City(city.to_string()), "City")
    }

    /// Show runs whose name contains `title`.
    pub fn select_title(&mut self, title: &str) -> RenderFrame {
        info!("[ActivityMap] Title selected: {}", title);
        self.select_by_item(ActivityFilter::Title(title.to_string()), "Title")
    }

    fn select_by_item(&mut self, filter: ActivityFilter, label: &str) -> RenderFrame {
        self.year = self.this_year.clone();
        self.title = format!("{} {} Running Heatmap", filter.key(), label);
        self.apply_filter(filter)
    }

    fn apply_filter(&mut self, filter: ActivityFilter) -> RenderFrame {
        self.filter = filter;
        self.single_run_id = None;
        self.refresh_selection();

        let snapshot = self.sequencer.start(self.runs.clone());
        self.frame_from_snapshot(snapshot)
    }

    /// Recompute runs, viewport and heatmap for the current filter and year.
    fn refresh_selection(&mut self) {
        self.runs = self.filter.apply(&self.activities);
        // The camera fits the whole selection up front, not the revealed prefix
        self.viewport = compute_viewport(&build_geometry(&self.runs), &self.config.viewport);
        self.heatmap = match YearFilter::from_key(&self.year) {
            Some(year_filter) => derive_heatmap(&self.activities, year_filter, &self.config.heatmap),
            None => vec![],
        };
        debug!(
            "[ActivityMap] Filter {:?}: {} runs, zoom {}, {} heatmap points",
            self.filter,
            self.runs.len(),
            self.viewport.zoom,
            self.heatmap.len()
        );
    }

    fn frame_from_snapshot(&mut self, snapshot: Snapshot) -> RenderFrame {
        self.geometry = snapshot.geometry;
        self.frame()
    }

    // ========================================================================
    // Locate & animation
    // ========================================================================

    /// Focus on specific runs of the current selection.
    ///
    /// An empty `ids` means every current run. Returns `None` (and changes
    /// nothing) when no current run matches.
    pub fn locate(&mut self, ids: &[i64]) -> Option<RenderFrame> {
        let mut selected: Vec<ActivityRecord> = if ids.is_empty() {
            self.runs.clone()
        } else {
            self.runs.iter().filter(|r| ids.contains(&r.id)).cloned().collect()
        };
        if selected.is_empty() {
            debug!("[ActivityMap] Locate {:?} matched no runs", ids);
            return None;
        }
        selected.sort_by(sort_by_date_desc);

        self.single_run_id = match ids {
            [id] => Some(*id),
            _ => None,
        };
        self.title = title_for_show(&selected[0]);
        self.geometry = self.sequencer.locate(&selected);
        self.viewport = compute_viewport(&self.geometry, &self.config.viewport);

        info!(
            "[ActivityMap] Located {} runs ({} paths), zoom {}",
            selected.len(),
            self.geometry.len(),
            self.viewport.zoom
        );
        Some(self.frame())
    }

    /// Deliver a tick token. Stale tokens return `None` and change nothing.
    pub fn tick(&mut self, token: TickToken) -> Option<RenderFrame> {
        let snapshot = self.sequencer.tick(token)?;
        Some(self.frame_from_snapshot(snapshot))
    }
}
