//! Core types for the Pupil Flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: per-event samples, their derived fields, and named experiment phases.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Absolute event time, seconds since the Unix epoch
pub const TIMESTAMP_COLUMN: &str = "timestamp";
/// Event category tag
pub const TYPE_COLUMN: &str = "type";
/// Left pupil diameter
pub const LEFT_DIAMETER_COLUMN: &str = "eyeleft.pupildiameter";
/// Right pupil diameter
pub const RIGHT_DIAMETER_COLUMN: &str = "eyeright.pupildiameter";
/// Externally supplied validity flag
pub const IS_VALID_COLUMN: &str = "is_valid";

/// Which source columns the raw table actually carried.
///
/// Samples always have every field, so a column that never appeared in the
/// input shows up as `None` on every row. Passes that depend on a column
/// check this set and fail instead of quietly treating the column as empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Columns {
    pub timestamp: bool,
    pub event_type: bool,
    pub left_diameter: bool,
    pub right_diameter: bool,
}

impl Columns {
    /// Every recognised column present
    pub fn all() -> Self {
        Self {
            timestamp: true,
            event_type: true,
            left_diameter: true,
            right_diameter: true,
        }
    }

    /// Both eyes were recorded, so `avg_diameter` and everything derived
    /// from it can exist
    pub fn has_diameters(&self) -> bool {
        self.left_diameter && self.right_diameter
    }

    /// Fail with a data shape error unless `present` holds
    pub(crate) fn require(
        present: bool,
        operation: &'static str,
        column: &'static str,
    ) -> Result<(), ComputeError> {
        if present {
            Ok(())
        } else {
            Err(ComputeError::DataShape { operation, column })
        }
    }
}

/// Fields recomputed from the current validity partition.
///
/// These are owned by the recomputer in [`crate::features`]; callers can read
/// them but never set them directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedFields {
    /// Seconds since session start (valid rows only)
    pub relative_timestamp: Option<f64>,
    /// Mean of both eyes
    pub avg_diameter: Option<f64>,
    /// Windowed sample standard deviation of `avg_diameter` (valid rows only)
    pub std_diameter: Option<f64>,
    /// Windowed mean of `avg_diameter` (valid rows only)
    pub smoothed_avg_diameter: Option<f64>,
}

/// One eye-tracker event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Absolute time (seconds since epoch)
    pub timestamp: Option<f64>,
    /// Event category (e.g. "gaze")
    pub event_type: Option<String>,
    /// Left pupil diameter (mm)
    pub left_diameter: Option<f64>,
    /// Right pupil diameter (mm)
    pub right_diameter: Option<f64>,
    /// Whether the sample participates in downstream statistics
    pub is_valid: bool,
    #[serde(default)]
    pub(crate) derived: DerivedFields,
}

impl Sample {
    /// Create a valid sample with empty derived fields
    pub fn new(
        timestamp: Option<f64>,
        event_type: Option<String>,
        left_diameter: Option<f64>,
        right_diameter: Option<f64>,
    ) -> Self {
        Self {
            timestamp,
            event_type,
            left_diameter,
            right_diameter,
            is_valid: true,
            derived: DerivedFields::default(),
        }
    }

    /// Shorthand for a fully populated gaze event
    pub fn gaze(timestamp: f64, left: f64, right: f64) -> Self {
        Self::new(
            Some(timestamp),
            Some("gaze".to_string()),
            Some(left),
            Some(right),
        )
    }

    pub fn derived(&self) -> &DerivedFields {
        &self.derived
    }

    pub fn relative_timestamp(&self) -> Option<f64> {
        self.derived.relative_timestamp
    }

    pub fn avg_diameter(&self) -> Option<f64> {
        self.derived.avg_diameter
    }

    pub fn std_diameter(&self) -> Option<f64> {
        self.derived.std_diameter
    }

    pub fn smoothed_avg_diameter(&self) -> Option<f64> {
        self.derived.smoothed_avg_diameter
    }

    /// Absolute timestamp rendered as `YYYY-MM-DD HH:MM:SS` (UTC)
    pub fn timestamp_readable(&self) -> Option<String> {
        let ts = self.timestamp?;
        if !ts.is_finite() {
            return None;
        }
        let secs = ts.floor();
        let nanos = ((ts - secs) * 1e9) as u32;
        DateTime::from_timestamp(secs as i64, nanos)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

/// A named time window in session-relative seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub start: f64,
    pub end: f64,
}

impl Phase {
    pub fn new(name: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    /// Closed-interval membership
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Ordered phase list for one subject, looked up by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseMap {
    phases: Vec<Phase>,
}

impl PhaseMap {
    pub fn new(phases: Vec<Phase>) -> Self {
        Self { phases }
    }

    /// Find a phase by exact, case-sensitive name.
    ///
    /// When a name repeats, the last entry wins.
    pub fn get(&self, name: &str) -> Result<&Phase, ComputeError> {
        self.phases
            .iter()
            .rev()
            .find(|p| p.name == name)
            .ok_or_else(|| ComputeError::Configuration(format!("Phase '{}' is not defined", name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Phase> {
        self.phases.iter()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}
