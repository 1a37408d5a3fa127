//! Activity records and the filter/sort stage of the pipeline.
//!
//! Records arrive from an external loader in the archive's JSON shape (one
//! object per run, as written by the sync scripts). They are treated as
//! read-only: filtering and sorting always produce a new `Vec`.
//!
//! A record is *renderable* only when its start date parses and its distance
//! is positive. Records that fail [`ActivityRecord::validate`] still pass
//! through filters but are dropped by the geometry and heatmap stages.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ActivityMapError, Result};
use crate::GpsPoint;

/// Year key that matches every record.
pub const TOTAL_YEAR: &str = "Total";

/// One run from the archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Unique activity id
    #[serde(alias = "run_id")]
    pub id: i64,
    /// Display name, matched by the title filter
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Sport type ("Run", "Hike", ...)
    #[serde(default, rename = "type")]
    pub sport_type: Option<String>,
    /// Distance in meters; missing distances deserialize as 0 and are excluded
    #[serde(default, deserialize_with = "null_as_default")]
    pub distance: f64,
    /// Start time (ISO-8601, UTC or offset)
    #[serde(default, deserialize_with = "null_as_default")]
    pub start_date: String,
    /// Start time in the athlete's local timezone, used for year grouping
    #[serde(default)]
    pub start_date_local: Option<String>,
    /// Free-text location, matched by the city filter
    #[serde(default)]
    pub location_country: Option<String>,
    /// Explicit start coordinate as `[lat, lng]` in the source datum.
    /// Anything but a pair (treadmill runs export `[]`) reads as absent.
    #[serde(default, deserialize_with = "lat_lng_pair")]
    pub start_latlng: Option<[f64; 2]>,
    /// Google encoded polyline of the route (precision 5, source datum)
    #[serde(default, alias = "polyline")]
    pub summary_polyline: Option<String>,
}

impl ActivityRecord {
    /// Parse an archive (a JSON array of records).
    ///
    /// Only a document that is not a JSON array is an error. Elements that do
    /// not deserialize as a record (no id, wrong field types) are skipped.
    pub fn parse_archive(json: &str) -> Result<Vec<ActivityRecord>> {
        let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let total = values.len();
        let records: Vec<ActivityRecord> = values
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("[ActivityMap] Skipping archive entry {}: {}", index, e);
                    None
                }
            })
            .collect();
        if records.len() < total {
            debug!(
                "[ActivityMap] Parsed {}/{} archive entries",
                records.len(),
                total
            );
        }
        Ok(records)
    }

    /// Parsed start time, if the start date is well-formed.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        parse_date_time(&self.start_date)
    }

    /// Parsed local start time, falling back to the UTC start time.
    pub fn local_start_time(&self) -> Option<NaiveDateTime> {
        self.start_date_local
            .as_deref()
            .and_then(parse_date_time)
            .or_else(|| self.start_time())
    }

    /// Calendar year of the run in local time.
    pub fn year(&self) -> Option<i32> {
        self.local_start_time().map(|t| t.year())
    }

    /// Explicit start coordinate in the source datum.
    pub fn start_point(&self) -> Option<GpsPoint> {
        self.start_latlng.map(|[lat, lng]| GpsPoint::new(lat, lng))
    }

    /// Encoded path, treating an empty string as absent.
    pub fn encoded_path(&self) -> Option<&str> {
        self.summary_polyline.as_deref().filter(|s| !s.is_empty())
    }

    /// Check the record can contribute to geometry or heatmap output.
    pub fn validate(&self) -> Result<()> {
        if self.start_time().is_none() {
            return Err(ActivityMapError::InvalidStartDate {
                id: self.id,
                value: self.start_date.clone(),
            });
        }
        // `!(x > 0)` also rejects NaN
        if !(self.distance > 0.0) {
            return Err(ActivityMapError::NonPositiveDistance {
                id: self.id,
                distance: self.distance,
            });
        }
        Ok(())
    }

    /// [`validate`](Self::validate) as a bool, logging the reason on failure.
    pub fn is_renderable(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                debug!("[ActivityMap] Excluding record: {}", e);
                false
            }
        }
    }
}

/// `null` reads as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lat_lng_pair<'de, D>(deserializer: D) -> std::result::Result<Option<[f64; 2]>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<f64>> = Option::deserialize(deserializer)?;
    Ok(values.and_then(|v| <[f64; 2]>::try_from(v).ok()))
}

/// Parse the date formats found in activity archives.
///
/// Accepts RFC 3339 (`2024-03-02T07:10:00Z`), naive ISO-8601 with either a
/// `T` or a space separator and optional fractional seconds, and bare dates.
pub fn parse_date_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ============================================================================
// Predicates
// ============================================================================

/// Keep runs from the given local year. [`TOTAL_YEAR`] keeps everything.
pub fn filter_year_runs(run: &ActivityRecord, year: &str) -> bool {
    if year == TOTAL_YEAR {
        return true;
    }
    run.year().is_some_and(|y| y.to_string() == year)
}

/// Keep runs whose location text contains the city name.
pub fn filter_city_runs(run: &ActivityRecord, city: &str) -> bool {
    run.location_country
        .as_deref()
        .is_some_and(|location| location.contains(city))
}

/// Keep runs whose name contains the title text.
pub fn filter_title_runs(run: &ActivityRecord, title: &str) -> bool {
    run.name.contains(title)
}

/// Newest first by local start time; ties broken by id, descending.
///
/// Records without a parseable date sort after every dated record.
pub fn sort_by_date_desc(a: &ActivityRecord, b: &ActivityRecord) -> Ordering {
    // Option orders None < Some, so comparing b to a puts None last
    b.local_start_time()
        .cmp(&a.local_start_time())
        .then_with(|| b.id.cmp(&a.id))
}

/// Select and order the records matching `predicate(record, key)`.
///
/// The input is not modified. The sort is stable, and with
/// [`sort_by_date_desc`] the order is total, so repeated calls yield the same
/// sequence.
pub fn filter_and_sort<F, C>(
    activities: &[ActivityRecord],
    key: &str,
    predicate: F,
    comparator: C,
) -> Vec<ActivityRecord>
where
    F: Fn(&ActivityRecord, &str) -> bool,
    C: Fn(&ActivityRecord, &ActivityRecord) -> Ordering,
{
    let mut runs: Vec<ActivityRecord> = activities
        .iter()
        .filter(|run| predicate(run, key))
        .cloned()
        .collect();
    runs.sort_by(|a, b| comparator(a, b));
    runs
}

/// The active filter of a map session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum ActivityFilter {
    Year(String),
    City(String),
    Title(String),
}

impl ActivityFilter {
    /// The key the predicate is applied with.
    pub fn key(&self) -> &str {
        match self {
            ActivityFilter::Year(key) | ActivityFilter::City(key) | ActivityFilter::Title(key) => {
                key
            }
        }
    }

    /// Whether a record passes this filter.
    pub fn matches(&self, run: &ActivityRecord) -> bool {
        match self {
            ActivityFilter::Year(year) => filter_year_runs(run, year),
            ActivityFilter::City(city) => filter_city_runs(run, city),
            ActivityFilter::Title(title) => filter_title_runs(run, title),
        }
    }

    /// Apply this filter and the default newest-first ordering.
    pub fn apply(&self, activities: &[ActivityRecord]) -> Vec<ActivityRecord> {
        filter_and_sort(activities, self.key(), |run, _| self.matches(run), sort_by_date_desc)
    }
}

/// Distinct years present in the archive, newest first.
pub fn available_years(activities: &[ActivityRecord]) -> Vec<i32> {
    let years: BTreeSet<i32> = activities.iter().filter_map(|a| a.year()).collect();
    years.into_iter().rev().collect()
}

/// Human readable title for a located run, e.g. `"Morning Run 2024-03-02 5.20 KM"`.
pub fn title_for_show(run: &ActivityRecord) -> String {
    let name = if run.name.is_empty() { "Run" } else { run.name.as_str() };
    let date = run
        .local_start_time()
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let km = run.distance.max(0.0) / 1000.0;
    let mut title = if date.is_empty() {
        format!("{} {:.2} KM", name, km)
    } else {
        format!("{} {} {:.2} KM", name, date, km)
    };
    if run.encoded_path().is_none() {
        title.push_str(" (No map data for this run)");
    }
    title
}
