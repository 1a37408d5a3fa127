//! Error type for the activity-map pipeline.
//!
//! The pipeline itself degrades by exclusion: a malformed record is logged and
//! skipped rather than aborting a batch. These errors surface at the fallible
//! edges only (archive parsing, record validation, polyline decoding and
//! configuration checks) so callers that want the reason can have it.

use thiserror::Error;

/// Errors produced by activity-map operations.
#[derive(Debug, Error)]
pub enum ActivityMapError {
    /// The record's start date could not be parsed as an ISO-8601 date-time
    #[error("activity {id} has an unparseable start date '{value}'")]
    InvalidStartDate { id: i64, value: String },

    /// The record's distance is zero, negative or not a number
    #[error("activity {id} has a non-positive distance ({distance}m)")]
    NonPositiveDistance { id: i64, distance: f64 },

    /// The record's encoded path could not be decoded
    #[error("activity {id} has an invalid encoded polyline: {message}")]
    InvalidPolyline { id: i64, message: String },

    /// A configuration value is out of range (e.g. a non-monotonic zoom table)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The activity archive is not valid JSON in the expected shape
    #[error("failed to parse activity archive: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ActivityMapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ActivityMapError::InvalidStartDate {
            id: 7,
            value: "yesterday".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "activity 7 has an unparseable start date 'yesterday'"
        );

        let err = ActivityMapError::NonPositiveDistance { id: 3, distance: 0.0 };
        assert!(err.to_string().contains("non-positive distance"));
    }

    #[test]
    fn test_json_error_converts() {
        let parse: std::result::Result<Vec<i64>, _> = serde_json::from_str("[1, 2");
        let err: ActivityMapError = parse.unwrap_err().into();
        assert!(matches!(err, ActivityMapError::Json(_)));
    }
}
