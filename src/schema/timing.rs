//! Phase timing file
//!
//! Experiment timings are kept in one JSON document keyed by subject id:
//!
//! ```json
//! {
//!   "704": [
//!     { "shelf": "Baseline",  "time_range": [0.0, 30.0] },
//!     { "shelf": "Positive",  "time_range": [30.0, 60.0] },
//!     { "shelf": "Neutral_2", "time_range": [60.0, 90.0] },
//!     { "shelf": "Negative",  "time_range": [90.0, 120.0] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ComputeError;
use crate::types::{Phase, PhaseMap};

/// One phase entry as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingEntry {
    pub shelf: String,
    pub time_range: [f64; 2],
}

/// Phase timings for every subject in an experiment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseTimings {
    subjects: BTreeMap<String, Vec<TimingEntry>>,
}

impl PhaseTimings {
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Ordered phases for one subject
    pub fn phases_for(&self, subject_id: &str) -> Result<PhaseMap, ComputeError> {
        let entries = self.subjects.get(subject_id).ok_or_else(|| {
            ComputeError::Configuration(format!("No timings for subject {}", subject_id))
        })?;

        Ok(PhaseMap::new(
            entries
                .iter()
                .map(|e| Phase::new(e.shelf.clone(), e.time_range[0], e.time_range[1]))
                .collect(),
        ))
    }

    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.subjects.keys().map(|k| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMINGS: &str = r#"{
        "704": [
            { "shelf": "Baseline",  "time_range": [0.0, 30.0] },
            { "shelf": "Positive",  "time_range": [30.0, 60.0] },
            { "shelf": "Neutral_2", "time_range": [60.0, 90.0] },
            { "shelf": "Negative",  "time_range": [90.0, 120.0] }
        ],
        "705": []
    }"#;

    #[test]
    fn test_phases_for_subject() {
        let timings = PhaseTimings::from_json(TIMINGS).unwrap();
        let phases = timings.phases_for("704").unwrap();

        assert_eq!(phases.len(), 4);
        let names: Vec<&str> = phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Baseline", "Positive", "Neutral_2", "Negative"]);

        let neutral = phases.get("Neutral_2").unwrap();
        assert_eq!((neutral.start, neutral.end), (60.0, 90.0));
    }

    #[test]
    fn test_missing_subject_is_configuration_error() {
        let timings = PhaseTimings::from_json(TIMINGS).unwrap();
        let err = timings.phases_for("999").unwrap_err();
        assert!(matches!(err, ComputeError::Configuration(_)));
        assert!(err.to_string().contains("999"));
    }

    #[test]
    fn test_subject_list() {
        let timings = PhaseTimings::from_json(TIMINGS).unwrap();
        let subjects: Vec<&str> = timings.subjects().collect();
        assert_eq!(subjects, vec!["704", "705"]);
        assert!(timings.phases_for("705").unwrap().is_empty());
    }
}
